//! 能力注册表
//!
//! 会话建立时由 tools/list 发现一次，之后只读；保留服务端返回的顺序，按名查找。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::protocol::ToolInfo;

/// 能力描述：名称（唯一键）、描述、参数 JSON Schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

impl From<ToolInfo> for CapabilityDescriptor {
    fn from(info: ToolInfo) -> Self {
        Self {
            name: info.name,
            description: info.description.unwrap_or_default(),
            input_schema: info.input_schema,
        }
    }
}

/// 能力注册表：发现顺序的只读快照
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    descriptors: Vec<CapabilityDescriptor>,
}

impl CapabilityRegistry {
    /// 同名能力只保留第一次出现的那个
    pub fn new(descriptors: impl IntoIterator<Item = CapabilityDescriptor>) -> Self {
        let mut kept: Vec<CapabilityDescriptor> = Vec::new();
        for d in descriptors {
            if kept.iter().any(|k| k.name == d.name) {
                tracing::warn!(tool = %d.name, "duplicate capability name ignored");
                continue;
            }
            kept.push(d);
        }
        Self { descriptors: kept }
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

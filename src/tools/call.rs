//! 工具调用请求与结果
//!
//! ToolCallRequest 由 LLM 在数据查询应答器中产生；ToolCallResult 由 ToolInvoker 归一化产出，
//! 失败也是数据（success = false），不走异常控制流。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 一次工具调用请求：调用 ID、能力名、参数（键唯一）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// LLM 未给出调用 ID 时生成一个
    pub fn with_generated_id(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::new(format!("call_{}", uuid::Uuid::new_v4().simple()), name, arguments)
    }
}

/// 工具调用结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub success: bool,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: payload.into(),
            error: None,
        }
    }

    /// 失败结果：payload 与 error 同为错误文本
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            payload: error.clone(),
            error: Some(error),
        }
    }

    /// 作为 tool 角色消息内容：成功取 payload，失败取统一格式的错误文本
    pub fn message_content(&self) -> String {
        if self.success {
            self.payload.clone()
        } else {
            format!(
                "Error calling tool: {}",
                self.error.as_deref().unwrap_or(&self.payload)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_content_on_failure() {
        let r = ToolCallResult::failed("Tool not found: get_refunds");
        assert!(!r.success);
        assert_eq!(r.message_content(), "Error calling tool: Tool not found: get_refunds");
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = ToolCallRequest::with_generated_id("get_orders", Map::new());
        let b = ToolCallRequest::with_generated_id("get_orders", Map::new());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("call_"));
    }
}

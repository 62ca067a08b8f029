//! 意图分类
//!
//! 通过 Oracle 的结构化输出把用户消息归入三种意图之一。LLM 返回枚举外的标签时重试，
//! 重试耗尽返回 Classification 错误（不静默兜底；兜底到 logical 由分派图显式决定并记录）。

use std::sync::Arc;

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::{OracleReply, OracleRequest, ReasoningOracle, StructuredOutput};
use crate::memory::{Message, Role};

/// 识别出的意图类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    // 变体不加文档注释：否则 schemars 生成 oneOf 而非平铺的 enum
    Emotional,
    Logical,
    DataQuery,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::Emotional, Intent::Logical, Intent::DataQuery];

    pub fn label(self) -> &'static str {
        match self {
            Intent::Emotional => "emotional",
            Intent::Logical => "logical",
            Intent::DataQuery => "data_query",
        }
    }

    /// 解析标签；容忍大小写、首尾引号与 data-query 写法，其余一律 None
    pub fn from_label(label: &str) -> Option<Intent> {
        let normalized = label
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .to_lowercase()
            .replace('-', "_");
        Intent::ALL.into_iter().find(|i| i.label() == normalized)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 分类结果格式（仅用于生成结构化输出 Schema）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct MessageClassifier {
    /// Classify if the message requires an emotional (therapist), logical, or seller data response.
    message_type: Intent,
}

/// 分类用的结构化输出约束（子 schema 内联，不产生 definitions 引用）
pub fn classification_output() -> StructuredOutput {
    let root = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<MessageClassifier>();
    let schema = serde_json::to_value(root).unwrap_or_default();
    StructuredOutput {
        name: "MessageClassifier".to_string(),
        schema,
        field: "message_type".to_string(),
        labels: Intent::ALL.iter().map(|i| i.label().to_string()).collect(),
    }
}

/// 意图分类器
pub struct Classifier {
    oracle: Arc<dyn ReasoningOracle>,
    prompt: String,
    max_retries: u32,
}

impl Classifier {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, prompt: impl Into<String>, max_retries: u32) -> Self {
        Self {
            oracle,
            prompt: prompt.into(),
            max_retries,
        }
    }

    /// 分类一条消息；history 中的 user / assistant 消息作为上下文一并发送
    pub async fn classify(&self, message: &str, history: &[Message]) -> Result<Intent, AgentError> {
        let mut messages: Vec<Message> = history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant) && m.tool_calls.is_empty())
            .cloned()
            .collect();
        messages.push(Message::user(message));
        let request = OracleRequest {
            system_prompt: self.prompt.clone(),
            messages,
            output: Some(classification_output()),
            actions: Vec::new(),
        };

        let attempts = self.max_retries + 1;
        let mut last_answer = String::new();
        for attempt in 1..=attempts {
            // Oracle 本身失败不重试，直接向上传播
            let answer = match self.oracle.decide(&request).await? {
                OracleReply::Label(label) | OracleReply::Text(label) => label,
                OracleReply::ToolCalls { calls, .. } => {
                    format!("<{} tool call(s)>", calls.len())
                }
            };
            if let Some(intent) = Intent::from_label(&answer) {
                tracing::debug!(%intent, attempt, "message classified");
                return Ok(intent);
            }
            tracing::warn!(answer = %answer, attempt, "classifier returned a label outside the enumerated set");
            last_answer = answer;
        }

        Err(AgentError::Classification(format!(
            "oracle answered {last_answer:?} after {attempts} attempt(s)"
        )))
    }
}

//! 推理 Oracle 抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 ReasoningOracle::decide：
//! 输入 system prompt + 消息，可选结构化输出约束（分类标签）与可选候选动作（工具绑定），
//! 输出为带标签的 OracleReply，调用方穷举匹配，不做「有没有 tool_calls」的动态判断。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::mcp::CapabilityDescriptor;
use crate::memory::Message;
use crate::tools::ToolCallRequest;

/// 结构化输出约束：把回答限制为某个 JSON Schema 中的一个枚举标签
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredOutput {
    /// schema 名称（OpenAI response_format 要求）
    pub name: String,
    /// 回答对象的 JSON Schema
    pub schema: Value,
    /// 标签所在字段
    pub field: String,
    /// 允许的标签
    pub labels: Vec<String>,
}

/// 一次 Oracle 请求
#[derive(Debug, Clone, Default)]
pub struct OracleRequest {
    pub system_prompt: String,
    /// 不含 system；Finalizing 时包含 assistant 工具决策与 tool 结果
    pub messages: Vec<Message>,
    pub output: Option<StructuredOutput>,
    /// 绑定为候选动作的能力；为空表示不允许调用工具
    pub actions: Vec<CapabilityDescriptor>,
}

impl OracleRequest {
    pub fn new(system_prompt: impl Into<String>, user_content: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![Message::user(user_content)],
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: StructuredOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_actions(mut self, actions: Vec<CapabilityDescriptor>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// 最后一条 user 消息的内容
    pub fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::memory::Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Oracle 回答
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// 自由文本
    Text(String),
    /// 结构化输出中的标签（未校验是否在枚举内，由调用方判断）
    Label(String),
    /// 工具调用决策（calls 可以为空，content 为模型附带的文本）
    ToolCalls {
        content: String,
        calls: Vec<ToolCallRequest>,
    },
}

impl OracleReply {
    /// 取文本内容；工具决策取附带文本，标签取标签本身
    pub fn into_text(self) -> String {
        match self {
            OracleReply::Text(text) | OracleReply::Label(text) => text,
            OracleReply::ToolCalls { content, .. } => content,
        }
    }
}

/// 推理 Oracle trait
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn decide(&self, request: &OracleRequest) -> Result<OracleReply, AgentError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "oracle"
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

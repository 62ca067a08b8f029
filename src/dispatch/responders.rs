//! 应答器
//!
//! - RoleResponder：therapist / logical，单次 Oracle 调用
//! - DataQueryResponder：AwaitingOracleDecision → ExecutingTools → Finalizing → Done，
//!   工具调用深度固定为一轮；会话按轮次打开，所有出口路径上都会关闭

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::dispatch::ResponderId;
use crate::llm::{OracleReply, OracleRequest, ReasoningOracle};
use crate::mcp::{SessionFactory, ToolSession};
use crate::memory::Message;
use crate::tools::{ToolCallRequest, ToolInvoker};

/// 应答器输出：最终 assistant 消息 + 过程中产生的 tool 消息（仅供上报）
#[derive(Debug, Clone)]
pub struct ResponderOutput {
    pub reply: Message,
    pub tool_messages: Vec<Message>,
}

impl ResponderOutput {
    fn text(content: impl Into<String>) -> Self {
        Self {
            reply: Message::assistant(content),
            tool_messages: Vec::new(),
        }
    }
}

/// 应答器 trait
#[async_trait]
pub trait Responder: Send + Sync {
    fn id(&self) -> ResponderId;

    /// 处理最新一条用户消息；Oracle 失败向上传播
    async fn respond(&self, user_message: &str) -> Result<ResponderOutput, AgentError>;
}

/// 只依赖角色 prompt 的应答器（therapist / logical）
pub struct RoleResponder {
    id: ResponderId,
    oracle: Arc<dyn ReasoningOracle>,
    prompt: String,
}

impl RoleResponder {
    pub fn new(id: ResponderId, oracle: Arc<dyn ReasoningOracle>, prompt: impl Into<String>) -> Self {
        Self {
            id,
            oracle,
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl Responder for RoleResponder {
    fn id(&self) -> ResponderId {
        self.id
    }

    async fn respond(&self, user_message: &str) -> Result<ResponderOutput, AgentError> {
        let request = OracleRequest::new(&self.prompt, user_message);
        let reply = self.oracle.decide(&request).await?;
        Ok(ResponderOutput::text(reply.into_text()))
    }
}

/// 数据查询状态机的阶段
#[derive(Debug)]
enum Phase {
    AwaitingOracleDecision,
    ExecutingTools {
        content: String,
        calls: Vec<ToolCallRequest>,
    },
    Finalizing {
        decision: Message,
        tool_messages: Vec<Message>,
    },
    Done(ResponderOutput),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingOracleDecision => "awaiting_oracle_decision",
            Phase::ExecutingTools { .. } => "executing_tools",
            Phase::Finalizing { .. } => "finalizing",
            Phase::Done(_) => "done",
        }
    }
}

/// 卖家数据查询应答器
pub struct DataQueryResponder {
    oracle: Arc<dyn ReasoningOracle>,
    sessions: Arc<dyn SessionFactory>,
    invoker: ToolInvoker,
    prompt: String,
}

impl DataQueryResponder {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        sessions: Arc<dyn SessionFactory>,
        invoker: ToolInvoker,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            oracle,
            sessions,
            invoker,
            prompt: prompt.into(),
        }
    }

    /// 数据服务不可用时的回复
    pub fn unavailable_reply(err: &AgentError) -> String {
        format!(
            "Sorry, the seller data service is currently unavailable, so I can't look that up right now ({err})."
        )
    }

    /// 在已打开的会话上跑完状态机
    async fn run(
        &self,
        session: &dyn ToolSession,
        user_message: &str,
    ) -> Result<ResponderOutput, AgentError> {
        let mut phase = Phase::AwaitingOracleDecision;
        loop {
            tracing::debug!(phase = phase.name(), "data query step");
            phase = match phase {
                Phase::AwaitingOracleDecision => {
                    let request = OracleRequest::new(&self.prompt, user_message)
                        .with_actions(session.capabilities().to_vec());
                    match self.oracle.decide(&request).await? {
                        OracleReply::ToolCalls { content, calls } if !calls.is_empty() => {
                            Phase::ExecutingTools { content, calls }
                        }
                        other => Phase::Done(ResponderOutput::text(other.into_text())),
                    }
                }
                Phase::ExecutingTools { content, calls } => {
                    let mut tool_messages = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let result = self.invoker.invoke(session, call).await;
                        tool_messages.push(Message::tool(&call.id, result.message_content()));
                    }
                    Phase::Finalizing {
                        decision: Message::assistant_tool_calls(content, calls),
                        tool_messages,
                    }
                }
                Phase::Finalizing {
                    decision,
                    tool_messages,
                } => {
                    let mut follow_up = Vec::with_capacity(tool_messages.len() + 1);
                    follow_up.push(decision);
                    follow_up.extend(tool_messages.iter().cloned());
                    // 不再绑定动作：工具调用只有一轮
                    let request =
                        OracleRequest::new(&self.prompt, user_message).with_messages(follow_up);
                    let reply = self.oracle.decide(&request).await?.into_text();
                    Phase::Done(ResponderOutput {
                        reply: Message::assistant(reply),
                        tool_messages,
                    })
                }
                Phase::Done(output) => return Ok(output),
            };
        }
    }
}

#[async_trait]
impl Responder for DataQueryResponder {
    fn id(&self) -> ResponderId {
        ResponderId::DataQuery
    }

    async fn respond(&self, user_message: &str) -> Result<ResponderOutput, AgentError> {
        let mut session = match self.sessions.open().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "data service session could not be opened");
                return Ok(ResponderOutput::text(Self::unavailable_reply(&e)));
            }
        };
        tracing::info!(tools = session.capabilities().len(), "data service session opened");

        let outcome = self.run(session.as_ref(), user_message).await;
        session.close().await;
        tracing::debug!("data service session released");
        outcome
    }
}

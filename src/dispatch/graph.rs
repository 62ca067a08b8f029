//! 分派图：Classifier → Router → Responder → 追加到会话状态
//!
//! 每轮严格线性，唯一的分支点是 Router，所有应答器都在本轮终止，不回到分类。
//! 轮次失败（Oracle 错误）时会话状态保持不变。

use std::sync::Arc;

use serde::Serialize;

use crate::core::{AgentError, ConversationState};
use crate::dispatch::{
    route, Classifier, DataQueryResponder, Intent, Prompts, Responder, ResponderId, RoleResponder,
};
use crate::llm::ReasoningOracle;
use crate::mcp::SessionFactory;
use crate::memory::Message;
use crate::tools::ToolInvoker;

/// 一轮处理的结果
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub intent: Intent,
    pub responder: ResponderId,
    pub reply: Message,
    /// data-query 过程中产生的 tool 消息（不进入会话状态）
    pub tool_messages: Vec<Message>,
    /// 分类失败、按 logical 处理时为 true
    pub classification_fallback: bool,
}

/// 分派图
pub struct DispatchGraph {
    classifier: Classifier,
    therapist: RoleResponder,
    logical: RoleResponder,
    data_query: DataQueryResponder,
}

impl DispatchGraph {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        sessions: Arc<dyn SessionFactory>,
        prompts: Prompts,
        max_retries: u32,
    ) -> Self {
        Self {
            classifier: Classifier::new(oracle.clone(), prompts.classifier, max_retries),
            therapist: RoleResponder::new(ResponderId::Therapist, oracle.clone(), prompts.therapist),
            logical: RoleResponder::new(ResponderId::Logical, oracle.clone(), prompts.logical),
            data_query: DataQueryResponder::new(
                oracle,
                sessions,
                ToolInvoker::new(),
                prompts.data_query,
            ),
        }
    }

    fn responder(&self, id: ResponderId) -> &dyn Responder {
        match id {
            ResponderId::Therapist => &self.therapist,
            ResponderId::Logical => &self.logical,
            ResponderId::DataQuery => &self.data_query,
        }
    }

    /// 处理一轮输入；成功时追加 user 与 assistant 两条消息并记录意图
    pub async fn process_turn(
        &self,
        state: &mut ConversationState,
        input: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let (intent, classification_fallback) =
            match self.classifier.classify(input, state.messages()).await {
                Ok(intent) => (intent, false),
                Err(AgentError::Classification(reason)) => {
                    tracing::warn!(%reason, "classification failed, falling back to logical");
                    (Intent::Logical, true)
                }
                Err(e) => return Err(e),
            };

        let responder_id = route(Some(intent));
        tracing::info!(%intent, responder = %responder_id, "turn routed");

        let output = self.responder(responder_id).respond(input).await?;

        state.push(Message::user(input));
        state.push(output.reply.clone());
        state.set_intent(intent);

        Ok(TurnOutcome {
            intent,
            responder: responder_id,
            reply: output.reply,
            tool_messages: output.tool_messages,
            classification_fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockOracle;
    use crate::mcp::{CapabilityDescriptor, ToolSession};
    use crate::memory::Role;
    use crate::tools::ToolCallResult;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct OrdersSession(Vec<CapabilityDescriptor>);

    #[async_trait]
    impl ToolSession for OrdersSession {
        fn capabilities(&self) -> &[CapabilityDescriptor] {
            &self.0
        }

        async fn invoke(
            &self,
            _name: &str,
            _arguments: &Map<String, Value>,
        ) -> Result<ToolCallResult, AgentError> {
            Ok(ToolCallResult::ok(r#"{"orders":3}"#))
        }

        async fn close(&mut self) {}
    }

    struct OrdersFactory;

    #[async_trait]
    impl SessionFactory for OrdersFactory {
        async fn open(&self) -> Result<Box<dyn ToolSession>, AgentError> {
            Ok(Box::new(OrdersSession(vec![CapabilityDescriptor::new(
                "get_orders",
                "Get seller orders",
                json!({"type": "object"}),
            )])))
        }
    }

    fn graph() -> DispatchGraph {
        DispatchGraph::new(Arc::new(MockOracle), Arc::new(OrdersFactory), Prompts::default(), 1)
    }

    #[tokio::test]
    async fn test_emotional_turn_goes_to_therapist() {
        let mut state = ConversationState::new();
        let outcome = graph()
            .process_turn(&mut state, "I feel overwhelmed today")
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::Emotional);
        assert_eq!(outcome.responder, ResponderId::Therapist);
        assert!(!outcome.classification_fallback);
        assert_eq!(state.len(), 2);
        assert_eq!(state.intent(), Some(Intent::Emotional));
        assert_eq!(state.messages()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_data_query_turn_keeps_tool_messages_out_of_state() {
        let mut state = ConversationState::new();
        let outcome = graph()
            .process_turn(&mut state, "How many orders came in today?")
            .await
            .unwrap();
        assert_eq!(outcome.responder, ResponderId::DataQuery);
        assert_eq!(outcome.tool_messages.len(), 1);
        assert!(outcome.reply.content.contains("orders"));
        assert_eq!(state.len(), 2);
        assert!(state.messages().iter().all(|m| m.role != Role::Tool));
    }
}

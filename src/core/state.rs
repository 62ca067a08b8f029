//! 会话状态：有序消息 + 当前意图
//!
//! 只能追加消息与设置意图，从不截断；由单个轮次处理循环独占，不跨并发轮次共享。

use crate::dispatch::Intent;
use crate::memory::{Message, Role};

#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    intent: Option<Intent>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 最后一条 assistant 消息（CLI 打印用）
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub(crate) fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub(crate) fn set_intent(&mut self, intent: Intent) {
        self.intent = Some(intent);
    }
}

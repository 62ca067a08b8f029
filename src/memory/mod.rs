//! 记忆层：进程内对话消息（不跨重启持久化）

pub mod conversation;

pub use conversation::{Message, Role};

//! 工具层：调用请求 / 结果类型与调用器

pub mod call;
pub mod invoker;

pub use call::{ToolCallRequest, ToolCallResult};
pub use invoker::ToolInvoker;

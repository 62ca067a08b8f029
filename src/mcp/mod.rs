//! MCP 客户端：子进程服务的会话管理、能力发现与调用

pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use registry::{CapabilityDescriptor, CapabilityRegistry};
pub use session::{ServiceSession, SessionFactory, SessionOptions, StdioSessionFactory, ToolSession};
pub use transport::StdioTransport;

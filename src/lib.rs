//! Bee Dispatch - 意图分派智能体
//!
//! 模块划分：
//! - **agent**: 从配置组装 Oracle、会话工厂与分派图；连通性探测
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与会话状态
//! - **dispatch**: 意图分类、路由、应答器、分派图
//! - **llm**: 推理 Oracle 抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **mcp**: 子进程数据服务的 stdio JSON-RPC 客户端（会话、能力发现、调用）
//! - **memory**: 对话消息
//! - **observability**: tracing 日志初始化
//! - **tools**: 工具调用请求 / 结果与调用器

pub mod agent;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod llm;
pub mod mcp;
pub mod memory;
pub mod observability;
pub mod tools;

pub use dispatch::{DispatchGraph, Intent, TurnOutcome};

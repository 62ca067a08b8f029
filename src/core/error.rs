//! 分派错误类型
//!
//! 工具执行失败不在此列：远端工具错误以 ToolCallResult { success: false } 的数据形式返回，
//! 只有连接、协议、分类、LLM 调用等故障才以 AgentError 形式向上传播。

use thiserror::Error;

/// 分派过程中可能出现的错误（子进程连接、协议、工具查找、分类、LLM）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// 子进程无法启动、握手超时或连接中途断开
    #[error("Connection error: {0}")]
    Connection(String),

    /// 握手或响应格式不合法
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 会话已关闭后仍被调用
    #[error("Not connected to service")]
    NotConnected,

    /// 请求的工具不在本次会话发现的能力集中
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 重试后 LLM 仍返回枚举之外的标签
    #[error("Classification error: {0}")]
    Classification(String),

    /// 底层 LLM 调用失败（网络 / 供应商故障）
    #[error("LLM error: {0}")]
    Oracle(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 会话建立阶段的错误：数据查询应答器需将其转为「服务不可用」回复
    pub fn is_session_setup_failure(&self) -> bool {
        matches!(self, AgentError::Connection(_) | AgentError::Protocol(_))
    }
}

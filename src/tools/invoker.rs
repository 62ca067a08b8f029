//! 工具调用器
//!
//! 把 ToolCallRequest 交给会话执行，并把一切结局归一化为 ToolCallResult：
//! 未知工具、超时、连接断开、协议错误都转成 success = false，绝不向上抛出传输层错误；
//! 每次调用输出结构化审计日志（JSON）。

use std::time::Instant;

use crate::core::AgentError;
use crate::mcp::ToolSession;
use crate::tools::{ToolCallRequest, ToolCallResult};

/// 工具调用器：无状态，会话由调用方按轮次提供
#[derive(Debug, Clone, Default)]
pub struct ToolInvoker;

impl ToolInvoker {
    pub fn new() -> Self {
        Self
    }

    /// 执行一次调用；本地（未知工具）与远端（服务报错）失败都以结果数据返回
    pub async fn invoke(&self, session: &dyn ToolSession, request: &ToolCallRequest) -> ToolCallResult {
        let start = Instant::now();
        let args_preview = args_preview(&request.arguments);

        let outcome: Result<ToolCallResult, AgentError> =
            if session.capabilities().iter().any(|d| d.name == request.name) {
                session.invoke(&request.name, &request.arguments).await
            } else {
                Err(AgentError::ToolNotFound(request.name.clone()))
            };

        let (ok, label) = match &outcome {
            Ok(r) if r.success => (true, "ok"),
            Ok(_) => (false, "error"),
            Err(AgentError::ToolNotFound(_)) => (false, "not_found"),
            Err(AgentError::ToolTimeout(_)) => (false, "timeout"),
            Err(_) => (false, "transport_error"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": request.name,
            "call_id": request.id,
            "ok": ok,
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        outcome.unwrap_or_else(|e| ToolCallResult::failed(e.to_string()))
    }
}

fn args_preview(args: &serde_json::Map<String, serde_json::Value>) -> String {
    let s = serde_json::Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

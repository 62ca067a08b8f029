//! 子进程 stdio 传输
//!
//! 按行收发 JSON-RPC：写端串行写入一行请求；后台读任务把响应按 id 分发给等待者（oneshot），
//! 通知与未知 id 仅记录日志。读端 EOF 后传输标记为关闭，所有挂起请求立即以 Connection 错误返回。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::core::AgentError;
use crate::mcp::protocol::{
    parse_incoming, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

/// 单行上限，防止失控的子进程输出撑爆内存
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// stdio 传输：请求 id 自增，响应按 id 配对
pub struct StdioTransport {
    writer: Mutex<BoxedWriter>,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
}

impl StdioTransport {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader_task = tokio::spawn(Self::read_loop(reader, pending.clone(), closed.clone()));
        Self {
            writer: Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader_task,
        }
    }

    async fn read_loop<R>(reader: R, pending: PendingMap, closed: Arc<AtomicBool>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        while let Some(frame) = lines.next().await {
            let line = match frame {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("MCP stdout read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_incoming(&line) {
                Ok(IncomingMessage::Response(response)) => {
                    let Some(id) = response.id.as_u64() else {
                        tracing::warn!("Received response with non-numeric id: {}", response.id);
                        continue;
                    };
                    match pending.lock().await.remove(&id) {
                        Some(waiter) => {
                            let _ = waiter.send(response);
                        }
                        None => tracing::warn!("Received response for unknown request ID: {}", id),
                    }
                }
                Ok(IncomingMessage::Notification(notification)) => {
                    tracing::debug!(method = %notification.method, "MCP notification");
                }
                Ok(IncomingMessage::Request { method, .. }) => {
                    tracing::warn!(method = %method, "Ignoring request from MCP server");
                }
                Err(e) => tracing::warn!("Skipping unparseable MCP frame: {}", e),
            }
        }

        closed.store(true, Ordering::SeqCst);
        // 丢弃发送端，等待中的请求随即收到 RecvError
        pending.lock().await.clear();
        tracing::debug!("MCP reader finished");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn write_line(&self, payload: &impl serde::Serialize) -> Result<(), AgentError> {
        let mut line = serde_json::to_string(payload)
            .map_err(|e| AgentError::Protocol(format!("failed to encode frame: {e}")))?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Connection(format!("write to service failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| AgentError::Connection(format!("flush to service failed: {e}")))
    }

    /// 发送请求并在超时内等待响应；超时返回 ToolTimeout，连接断开返回 Connection
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<JsonRpcResponse, AgentError> {
        if self.is_closed() {
            return Err(AgentError::Connection("service connection is closed".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        if self.is_closed() {
            self.pending.lock().await.remove(&id);
            return Err(AgentError::Connection("service connection is closed".into()));
        }

        let request = JsonRpcRequest::new(id, method, params);
        tracing::debug!(id, method, "MCP request");
        if let Err(e) = self.write_line(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(AgentError::Connection(format!(
                "service closed the connection while waiting for {method}"
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(AgentError::ToolTimeout(format!(
                    "{method} timed out after {}s",
                    timeout.as_secs_f32()
                )))
            }
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), AgentError> {
        if self.is_closed() {
            return Err(AgentError::Connection("service connection is closed".into()));
        }
        self.write_line(&JsonRpcNotification::new(method, params)).await
    }

    /// 关闭写端（子进程 stdin 收到 EOF）并停止读任务
    pub async fn shutdown(&self) {
        if let Err(e) = self.writer.lock().await.shutdown().await {
            tracing::debug!("MCP writer shutdown: {}", e);
        }
        self.reader_task.abort();
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_request_matches_response_by_id() {
        let (client, server) = tokio::io::duplex(4096);
        let (cr, cw) = tokio::io::split(client);
        let transport = StdioTransport::new(cr, cw);

        let (sr, mut sw) = tokio::io::split(server);
        tokio::spawn(async move {
            let mut lines = BufReader::new(sr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: Value = serde_json::from_str(&line).unwrap();
                // 先发一条通知和一个未知 id，确认读任务能跳过
                let noise = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\"}\n{\"jsonrpc\":\"2.0\",\"id\":999,\"result\":{}}\n";
                sw.write_all(noise.as_bytes()).await.unwrap();
                let resp = json!({"jsonrpc": "2.0", "id": req["id"], "result": {"echo": req["method"]}});
                sw.write_all(format!("{resp}\n").as_bytes()).await.unwrap();
            }
        });

        let response = transport
            .request("tools/list", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["echo"], "tools/list");
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (client, _server) = tokio::io::duplex(4096);
        let (cr, cw) = tokio::io::split(client);
        let transport = StdioTransport::new(cr, cw);

        let err = transport
            .request("tools/call", None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(_)));
    }

    #[tokio::test]
    async fn test_peer_exit_fails_pending_request() {
        let (client, server) = tokio::io::duplex(4096);
        let (cr, cw) = tokio::io::split(client);
        let transport = StdioTransport::new(cr, cw);

        let (sr, sw) = tokio::io::split(server);
        tokio::spawn(async move {
            // 读到第一行后直接退出，模拟子进程崩溃
            let _sw = sw;
            let mut lines = BufReader::new(sr).lines();
            let _ = lines.next_line().await;
        });

        let err = transport
            .request("tools/call", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Connection(_)));
    }
}

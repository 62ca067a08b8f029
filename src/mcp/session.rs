//! 服务会话管理
//!
//! ServiceSession 持有一个子进程连接：open 启动子进程 → initialize 握手 → notifications/initialized
//! → tools/list（按 nextCursor 翻页）缓存能力注册表。会话不池化，每个需要工具的轮次独占一个，
//! 用完 close；close 之后的任何调用返回 NotConnected。未 close 即被 drop 时子进程同样会被杀掉。

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::config::ServiceSection;
use crate::core::AgentError;
use crate::mcp::protocol::{
    decode_result, initialize_params, tools_call_params, tools_list_params, CallToolResult,
    InitializeResult, ServerInfo, ToolsListResult, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::mcp::registry::{CapabilityDescriptor, CapabilityRegistry};
use crate::mcp::transport::StdioTransport;
use crate::tools::ToolCallResult;

/// tools/list 翻页上限，防止服务端返回循环游标
const MAX_LIST_PAGES: usize = 32;

/// 子进程退出的宽限时间，超时后强杀
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// 一个已建立的工具会话：能力快照 + 调用 + 关闭
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// 发现阶段缓存的能力（无 I/O，顺序稳定）
    fn capabilities(&self) -> &[CapabilityDescriptor];

    /// 调用指定能力；远端工具错误以 success = false 的结果返回
    async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolCallResult, AgentError>;

    /// 拆除连接；之后的调用返回 NotConnected
    async fn close(&mut self);
}

/// 会话工厂：每次 open 得到一个独占的新会话
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ToolSession>, AgentError>;
}

/// 握手与调用参数
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub client_name: String,
    pub client_version: String,
    pub handshake_timeout: Duration,
    pub call_timeout: Duration,
}

impl From<&ServiceSection> for SessionOptions {
    fn from(cfg: &ServiceSection) -> Self {
        Self {
            client_name: cfg.client_name.clone(),
            client_version: cfg.client_version.clone(),
            handshake_timeout: Duration::from_secs(cfg.handshake_timeout_secs),
            call_timeout: Duration::from_secs(cfg.tool_timeout_secs),
        }
    }
}

/// 基于 stdio 的 MCP 会话
pub struct ServiceSession {
    transport: Option<StdioTransport>,
    child: Option<Child>,
    registry: CapabilityRegistry,
    server_info: Option<ServerInfo>,
    call_timeout: Duration,
}

impl ServiceSession {
    /// 启动子进程并完成握手与能力发现
    pub async fn open(cfg: &ServiceSection) -> Result<Self, AgentError> {
        let mut cmd = Command::new(&cfg.command);
        cmd.args(&cfg.args)
            .envs(cfg.env.iter().map(|v| (&v.name, &v.value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if cfg.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(dir) = &cfg.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            AgentError::Connection(format!("failed to spawn `{}`: {}", cfg.command, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Connection("service stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Connection("service stdout unavailable".into()))?;

        // 握手失败时 child 在此处被 drop，kill_on_drop 负责清理
        let mut session = Self::connect(stdout, stdin, &SessionOptions::from(cfg)).await?;
        tracing::info!(
            command = %cfg.command,
            pid = ?child.id(),
            tools = session.registry.len(),
            "Connected to data service"
        );
        session.child = Some(child);
        Ok(session)
    }

    /// 在任意字节流上完成握手与能力发现（open 与测试共用）
    pub async fn connect<R, W>(reader: R, writer: W, opts: &SessionOptions) -> Result<Self, AgentError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let transport = StdioTransport::new(reader, writer);

        let response = transport
            .request(
                METHOD_INITIALIZE,
                Some(initialize_params(&opts.client_name, &opts.client_version)),
                opts.handshake_timeout,
            )
            .await
            .map_err(handshake_error)?;
        let init: InitializeResult = decode_result(METHOD_INITIALIZE, response)?;
        tracing::debug!(protocol = %init.protocol_version, "MCP initialized");

        transport
            .notify(METHOD_INITIALIZED, None)
            .await
            .map_err(handshake_error)?;

        let mut descriptors: Vec<CapabilityDescriptor> = Vec::new();
        let mut cursor: Option<String> = None;
        for page in 0.. {
            if page >= MAX_LIST_PAGES {
                return Err(AgentError::Protocol(format!(
                    "tools/list exceeded {MAX_LIST_PAGES} pages"
                )));
            }
            let response = transport
                .request(
                    METHOD_TOOLS_LIST,
                    tools_list_params(cursor.as_deref()),
                    opts.handshake_timeout,
                )
                .await
                .map_err(handshake_error)?;
            let listed: ToolsListResult = decode_result(METHOD_TOOLS_LIST, response)?;
            descriptors.extend(listed.tools.into_iter().map(CapabilityDescriptor::from));
            match listed.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(Self {
            transport: Some(transport),
            child: None,
            registry: CapabilityRegistry::new(descriptors),
            server_info: init.server_info,
            call_timeout: opts.call_timeout,
        })
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }
}

/// 握手阶段的超时视为连接失败
fn handshake_error(e: AgentError) -> AgentError {
    match e {
        AgentError::ToolTimeout(msg) => AgentError::Connection(format!("handshake failed: {msg}")),
        other => other,
    }
}

#[async_trait]
impl ToolSession for ServiceSession {
    fn capabilities(&self) -> &[CapabilityDescriptor] {
        self.registry.descriptors()
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolCallResult, AgentError> {
        let transport = self.transport.as_ref().ok_or(AgentError::NotConnected)?;
        if !self.registry.contains(name) {
            return Err(AgentError::ToolNotFound(name.to_string()));
        }

        let response = transport
            .request(
                METHOD_TOOLS_CALL,
                Some(tools_call_params(name, arguments)),
                self.call_timeout,
            )
            .await?;

        if let Some(err) = response.error {
            return Ok(ToolCallResult::failed(err.message));
        }
        let result: CallToolResult = match response.result {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                AgentError::Protocol(format!("malformed tools/call result: {e}"))
            })?,
            None => CallToolResult::default(),
        };

        let text = result.text();
        if result.is_error() {
            let message = if text.is_empty() {
                format!("{name} reported an error")
            } else {
                text
            };
            Ok(ToolCallResult::failed(message))
        } else {
            Ok(ToolCallResult::ok(text))
        }
    }

    async fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(?status, "Data service exited"),
                Ok(Err(e)) => tracing::warn!("Waiting for data service failed: {}", e),
                Err(_) => {
                    tracing::warn!("Data service did not exit in time, killing");
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Killing data service failed: {}", e);
                    }
                }
            }
        }
        tracing::info!("Data service session closed");
    }
}

/// 按 [service] 配置启动子进程的会话工厂
pub struct StdioSessionFactory {
    config: ServiceSection,
}

impl StdioSessionFactory {
    pub fn new(config: ServiceSection) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for StdioSessionFactory {
    async fn open(&self) -> Result<Box<dyn ToolSession>, AgentError> {
        let session = ServiceSession::open(&self.config).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn opts() -> SessionOptions {
        SessionOptions {
            client_name: "test".into(),
            client_version: "0.0.0".into(),
            handshake_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_millis(300),
        }
    }

    /// 进程内假服务：两页 tools/list；tools/call 计数，按工具名返回不同形态
    fn spawn_fake_server(
        server: tokio::io::DuplexStream,
        init_result: Value,
        calls: Arc<AtomicUsize>,
    ) {
        tokio::spawn(async move {
            let (sr, mut sw) = tokio::io::split(server);
            let mut lines = BufReader::new(sr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: Value = serde_json::from_str(&line).unwrap();
                let Some(id) = req.get("id").cloned() else {
                    continue;
                };
                let result = match req["method"].as_str().unwrap() {
                    "initialize" => init_result.clone(),
                    "tools/list" if req["params"]["cursor"].is_null() => json!({
                        "tools": [{"name": "get_orders", "description": "Orders", "inputSchema": {"type": "object"}}],
                        "nextCursor": "page-2"
                    }),
                    "tools/list" => json!({
                        "tools": [{"name": "get_inventory", "description": "Inventory"}, {"name": "slow"}, {"name": "broken"}]
                    }),
                    "tools/call" => {
                        calls.fetch_add(1, Ordering::SeqCst);
                        match req["params"]["name"].as_str().unwrap() {
                            "get_orders" => json!({"content": [{"type": "text", "text": "{\"count\": 3}"}]}),
                            "get_inventory" => json!({"content": []}),
                            "slow" => continue,
                            _ => json!({"isError": true, "content": [{"type": "text", "text": "Error: credentials rejected"}]}),
                        }
                    }
                    _ => json!({}),
                };
                let resp = json!({"jsonrpc": "2.0", "id": id, "result": result});
                sw.write_all(format!("{resp}\n").as_bytes()).await.unwrap();
            }
        });
    }

    async fn fake_session(calls: Arc<AtomicUsize>) -> ServiceSession {
        let (client, server) = tokio::io::duplex(16 * 1024);
        spawn_fake_server(
            server,
            json!({"protocolVersion": "2024-11-05", "capabilities": {"tools": {}}, "serverInfo": {"name": "fake"}}),
            calls,
        );
        let (cr, cw) = tokio::io::split(client);
        ServiceSession::connect(cr, cw, &opts()).await.unwrap()
    }

    #[tokio::test]
    async fn test_discovery_follows_cursor_and_is_stable() {
        let session = fake_session(Arc::new(AtomicUsize::new(0))).await;
        let names: Vec<&str> = session.capabilities().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["get_orders", "get_inventory", "slow", "broken"]);
        assert_eq!(session.capabilities(), session.capabilities());
        assert_eq!(session.server_info().map(|s| s.name.as_str()), Some("fake"));
    }

    #[tokio::test]
    async fn test_invoke_outcomes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = fake_session(calls.clone()).await;

        let ok = session.invoke("get_orders", &Map::new()).await.unwrap();
        assert_eq!(ok, ToolCallResult::ok("{\"count\": 3}"));

        let empty = session.invoke("get_inventory", &Map::new()).await.unwrap();
        assert!(empty.success);
        assert_eq!(empty.payload, "");

        let remote_err = session.invoke("broken", &Map::new()).await.unwrap();
        assert!(!remote_err.success);
        assert_eq!(remote_err.error.as_deref(), Some("Error: credentials rejected"));

        let timeout = session.invoke("slow", &Map::new()).await.unwrap_err();
        assert!(matches!(timeout, AgentError::ToolTimeout(_)));

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_reaches_transport() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = fake_session(calls.clone()).await;

        let err = session.invoke("get_refunds", &Map::new()).await.unwrap_err();
        assert_eq!(err, AgentError::ToolNotFound("get_refunds".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invoke_after_close_is_not_connected() {
        let mut session = fake_session(Arc::new(AtomicUsize::new(0))).await;
        session.close().await;
        assert!(!session.is_open());
        let err = session.invoke("get_orders", &Map::new()).await.unwrap_err();
        assert_eq!(err, AgentError::NotConnected);
    }

    #[tokio::test]
    async fn test_malformed_handshake_is_protocol_error() {
        let (client, server) = tokio::io::duplex(4096);
        spawn_fake_server(server, json!({"serverInfo": {"name": "fake"}}), Arc::new(AtomicUsize::new(0)));
        let (cr, cw) = tokio::io::split(client);
        let err = ServiceSession::connect(cr, cw, &opts()).await.err().unwrap();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_silent_server_is_connection_error() {
        let (client, _server) = tokio::io::duplex(4096);
        let (cr, cw) = tokio::io::split(client);
        let mut o = opts();
        o.handshake_timeout = Duration::from_millis(100);
        let err = ServiceSession::connect(cr, cw, &o).await.err().unwrap();
        assert!(matches!(err, AgentError::Connection(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_connection_error() {
        let cfg = ServiceSection {
            command: "bee-definitely-missing-binary".into(),
            args: vec![],
            working_dir: None,
            ..ServiceSection::default()
        };
        let err = StdioSessionFactory::new(cfg).open().await.err().unwrap();
        assert!(matches!(err, AgentError::Connection(_)));
    }
}

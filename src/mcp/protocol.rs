//! MCP 协议类型（JSON-RPC 2.0，按行分帧）
//!
//! 客户端只用到 initialize / notifications/initialized / tools/list / tools/call 四个方法。

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::AgentError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// 客户端发出的请求
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// 无需响应的通知
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// 从服务端读到的一行消息
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
    /// 服务端发起的请求（如 ping）；客户端不处理
    Request { id: Value, method: String },
}

/// 解析一行 JSON-RPC 消息；有 method 且有 id 为请求，有 method 无 id 为通知，否则按响应解析
pub fn parse_incoming(line: &str) -> Result<IncomingMessage, AgentError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| AgentError::Protocol(format!("invalid JSON-RPC frame: {e}")))?;
    let has_id = value.get("id").is_some_and(|id| !id.is_null());
    match value.get("method").and_then(Value::as_str) {
        Some(method) if has_id => Ok(IncomingMessage::Request {
            id: value["id"].clone(),
            method: method.to_string(),
        }),
        Some(_) => serde_json::from_value(value)
            .map(IncomingMessage::Notification)
            .map_err(|e| AgentError::Protocol(format!("invalid notification: {e}"))),
        None => serde_json::from_value(value)
            .map(IncomingMessage::Response)
            .map_err(|e| AgentError::Protocol(format!("invalid response: {e}"))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

/// tools/list 中的单个工具
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsListResult {
    pub tools: Vec<ToolInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// tools/call 结果中的内容块；只关心 text，其余类型忽略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Option<Vec<ContentItem>>,
    #[serde(default)]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// 拼接全部 text 块；content 缺失或为空时返回空串
    pub fn text(&self) -> String {
        self.content
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                ContentItem::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": client_version,
        }
    })
}

pub fn tools_list_params(cursor: Option<&str>) -> Option<Value> {
    cursor.map(|c| json!({ "cursor": c }))
}

pub fn tools_call_params(name: &str, arguments: &Map<String, Value>) -> Value {
    json!({
        "name": name,
        "arguments": arguments,
    })
}

/// 把响应中的 result 反序列化为目标类型；缺 result 或结构不符为协议错误
pub fn decode_result<T: serde::de::DeserializeOwned>(
    method: &str,
    response: JsonRpcResponse,
) -> Result<T, AgentError> {
    if let Some(err) = response.error {
        return Err(AgentError::Protocol(format!(
            "{method} failed ({}): {}",
            err.code, err.message
        )));
    }
    let result = response
        .result
        .ok_or_else(|| AgentError::Protocol(format!("{method} response has no result")))?;
    serde_json::from_value(result)
        .map_err(|e| AgentError::Protocol(format!("malformed {method} result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_incoming_kinds() {
        let resp = parse_incoming(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#).unwrap();
        assert!(matches!(resp, IncomingMessage::Response(r) if r.id == json!(3)));

        let note = parse_incoming(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#).unwrap();
        assert!(matches!(note, IncomingMessage::Notification(n) if n.method == "notifications/progress"));

        let req = parse_incoming(r#"{"jsonrpc":"2.0","id":"s1","method":"ping"}"#).unwrap();
        assert!(matches!(req, IncomingMessage::Request { method, .. } if method == "ping"));

        assert!(matches!(parse_incoming("not json"), Err(AgentError::Protocol(_))));
    }

    #[test]
    fn test_call_tool_result_text() {
        let r: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "line 1"},
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "line 2"}
            ]
        }))
        .unwrap();
        assert_eq!(r.text(), "line 1\nline 2");
        assert!(!r.is_error());

        let empty: CallToolResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.text(), "");
        let empty_list: CallToolResult = serde_json::from_value(json!({"content": []})).unwrap();
        assert_eq!(empty_list.text(), "");
    }

    #[test]
    fn test_decode_result_rejects_malformed_handshake() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: json!(1),
            result: Some(json!({"capabilities": {}})),
            error: None,
        };
        let err = decode_result::<InitializeResult>(METHOD_INITIALIZE, response).unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[test]
    fn test_tool_info_defaults_schema() {
        let info: ToolInfo = serde_json::from_value(json!({"name": "get_inventory"})).unwrap();
        assert_eq!(info.input_schema["type"], "object");
        assert!(info.description.is_none());
    }
}

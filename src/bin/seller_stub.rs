//! Bee 卖家数据桩服务
//!
//! stdio 上的 MCP 服务端：逐行读取 JSON-RPC 请求，暴露 get_orders / get_inventory /
//! get_listings / get_sales_metrics 四个工具，返回固定的样例数据。
//! 供本地联调与集成测试使用；日志只写 stderr，stdout 专用于协议帧。
//!
//! 启动: cargo run --bin bee-seller-stub

use anyhow::Context;
use bee_dispatch::mcp::protocol::{
    CallToolResult, ContentItem, InitializeResult, JsonRpcError, JsonRpcResponse, ServerInfo,
    ToolInfo, ToolsListResult, JSONRPC_VERSION, METHOD_INITIALIZE, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST, PROTOCOL_VERSION,
};
use bee_dispatch::observability;
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, LinesCodec};

const SERVER_NAME: &str = "amazon-seller-mcp-server";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    tracing::info!("Seller stub MCP server running on stdio");

    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next().await {
        let line = line.context("Failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let Some(response) = handle_line(&line) else {
            continue;
        };
        let mut frame = serde_json::to_string(&response).context("Failed to encode response")?;
        frame.push('\n');
        stdout.write_all(frame.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, seller stub exiting");
    Ok(())
}

/// 处理一行输入；通知不回包
fn handle_line(line: &str) -> Option<JsonRpcResponse> {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Some(error_response(Value::Null, PARSE_ERROR, format!("Parse error: {e}"))),
    };
    let method = request.get("method").and_then(Value::as_str);
    let id = request.get("id").cloned().filter(|id| !id.is_null());

    match (method, id) {
        (Some(method), None) => {
            tracing::debug!(method, "notification received");
            None
        }
        (None, id) => Some(error_response(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid request: missing method".to_string(),
        )),
        (Some(method), Some(id)) => {
            let params = request.get("params").cloned().unwrap_or(Value::Null);
            tracing::debug!(method, "request received");
            Some(match dispatch(method, &params) {
                Ok(result) => JsonRpcResponse {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    result: Some(result),
                    error: None,
                },
                Err((code, message)) => error_response(id, code, message),
            })
        }
    }
}

fn error_response(id: Value, code: i64, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message,
            data: None,
        }),
    }
}

fn dispatch(method: &str, params: &Value) -> Result<Value, (i64, String)> {
    match method {
        METHOD_INITIALIZE => to_value(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({ "tools": {} }),
            server_info: Some(ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        }),
        METHOD_TOOLS_LIST => to_value(ToolsListResult {
            tools: tool_catalog(),
            next_cursor: None,
        }),
        METHOD_TOOLS_CALL => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or((INVALID_PARAMS, "tools/call requires a tool name".to_string()))?;
            let empty = Map::new();
            let args = params
                .get("arguments")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            to_value(call_tool(name, args))
        }
        "ping" => Ok(json!({})),
        other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, (i64, String)> {
    serde_json::to_value(value).map_err(|e| (-32603, format!("Internal error: {e}")))
}

/// 工具清单（描述与参数结构与真实服务一致）
fn tool_catalog() -> Vec<ToolInfo> {
    vec![
        ToolInfo {
            name: "get_orders".to_string(),
            description: Some(
                "Get orders from Amazon Seller account. Can filter by creation date.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "createdAfter": {
                        "type": "string",
                        "description": "ISO 8601 date (e.g., 2024-01-01T00:00:00Z). Get orders created after this date."
                    }
                }
            }),
        },
        ToolInfo {
            name: "get_inventory".to_string(),
            description: Some(
                "Get current inventory summary including available quantity, inbound quantity, and fulfillment channel."
                    .to_string(),
            ),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolInfo {
            name: "get_listings".to_string(),
            description: Some(
                "Get product listings. Can get specific SKU or all listings.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sku": {
                        "type": "string",
                        "description": "Specific SKU to retrieve. If omitted, returns all listings."
                    }
                }
            }),
        },
        ToolInfo {
            name: "get_sales_metrics".to_string(),
            description: Some(
                "Get sales metrics including order count, total sales, and units ordered."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "interval": {
                        "type": "string",
                        "description": "Time interval: DAY, WEEK, or MONTH",
                        "enum": ["DAY", "WEEK", "MONTH"]
                    }
                }
            }),
        },
    ]
}

/// 执行工具；失败以 isError 结果返回（与真实服务行为一致）
fn call_tool(name: &str, args: &Map<String, Value>) -> CallToolResult {
    let outcome = match name {
        "get_orders" => get_orders(args),
        "get_inventory" => Ok(Some(inventory())),
        "get_listings" => get_listings(args),
        "get_sales_metrics" => get_sales_metrics(args),
        other => Err(format!("Unknown tool: {other}")),
    };

    match outcome {
        Ok(Some(data)) => CallToolResult {
            content: Some(vec![ContentItem::Text {
                text: serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string()),
            }]),
            is_error: None,
        },
        // 无匹配数据：空 content
        Ok(None) => CallToolResult {
            content: Some(Vec::new()),
            is_error: None,
        },
        Err(message) => {
            tracing::warn!(tool = name, %message, "tool call failed");
            CallToolResult {
                content: Some(vec![ContentItem::Text {
                    text: format!("Error: {message}"),
                }]),
                is_error: Some(true),
            }
        }
    }
}

fn string_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(format!("{key} must be a string, got {other}")),
    }
}

fn orders() -> Vec<Value> {
    vec![
        json!({
            "AmazonOrderId": "113-4820937-1029384",
            "PurchaseDate": "2024-06-01T09:15:00Z",
            "OrderStatus": "Shipped",
            "OrderTotal": { "CurrencyCode": "USD", "Amount": "42.98" },
            "NumberOfItemsShipped": 2
        }),
        json!({
            "AmazonOrderId": "113-5930211-4478120",
            "PurchaseDate": "2024-06-02T14:40:00Z",
            "OrderStatus": "Unshipped",
            "OrderTotal": { "CurrencyCode": "USD", "Amount": "19.99" },
            "NumberOfItemsShipped": 0
        }),
        json!({
            "AmazonOrderId": "113-7719420-8834512",
            "PurchaseDate": "2024-06-03T18:05:00Z",
            "OrderStatus": "Pending",
            "OrderTotal": { "CurrencyCode": "USD", "Amount": "64.50" },
            "NumberOfItemsShipped": 0
        }),
    ]
}

fn get_orders(args: &Map<String, Value>) -> Result<Option<Value>, String> {
    let created_after = string_arg(args, "createdAfter")?;
    // ISO 8601 UTC 时间按字典序比较即可
    let orders: Vec<Value> = orders()
        .into_iter()
        .filter(|o| match created_after {
            Some(after) => o["PurchaseDate"].as_str().is_some_and(|d| d > after),
            None => true,
        })
        .collect();
    Ok(Some(json!({ "Orders": orders, "count": orders.len() })))
}

fn inventory() -> Value {
    json!({
        "inventorySummaries": [
            { "sellerSku": "BEE-MUG-01", "fulfillmentChannel": "AFN", "availableQuantity": 120, "inboundQuantity": 40 },
            { "sellerSku": "BEE-TEE-M", "fulfillmentChannel": "AFN", "availableQuantity": 8, "inboundQuantity": 0 },
            { "sellerSku": "BEE-CAP-OS", "fulfillmentChannel": "MFN", "availableQuantity": 0, "inboundQuantity": 25 }
        ]
    })
}

fn listings() -> Vec<Value> {
    vec![
        json!({ "sku": "BEE-MUG-01", "title": "Bee Ceramic Mug 12oz", "price": "14.99", "status": "ACTIVE" }),
        json!({ "sku": "BEE-TEE-M", "title": "Bee Logo T-Shirt (M)", "price": "19.99", "status": "ACTIVE" }),
        json!({ "sku": "BEE-CAP-OS", "title": "Bee Baseball Cap", "price": "12.50", "status": "INACTIVE" }),
    ]
}

fn get_listings(args: &Map<String, Value>) -> Result<Option<Value>, String> {
    match string_arg(args, "sku")? {
        Some(sku) => Ok(listings().into_iter().find(|l| l["sku"] == sku)),
        None => Ok(Some(json!({ "listings": listings() }))),
    }
}

fn get_sales_metrics(args: &Map<String, Value>) -> Result<Option<Value>, String> {
    let interval = string_arg(args, "interval")?.unwrap_or("DAY");
    let (order_count, units, total) = match interval {
        "DAY" => (3, 4, "127.47"),
        "WEEK" => (21, 30, "811.20"),
        "MONTH" => (87, 121, "3402.65"),
        other => return Err(format!("interval must be one of DAY, WEEK, MONTH, got {other}")),
    };
    Ok(Some(json!({
        "interval": interval,
        "orderCount": order_count,
        "unitCount": units,
        "totalSales": { "currencyCode": "USD", "amount": total }
    })))
}

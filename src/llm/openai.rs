//! OpenAI 兼容 API Oracle
//!
//! 直接以 JSON 调用 /chat/completions：候选动作映射为 function tools，结构化输出映射为 response_format。
//! 支持 OpenAI、DeepSeek、自建代理等任意兼容端点（可配置 base_url）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::llm::{OracleReply, OracleRequest, ReasoningOracle, StructuredOutput};
use crate::memory::{Message, Role};
use crate::tools::ToolCallRequest;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// 结构化输出的请求方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// response_format = json_schema（OpenAI）
    JsonSchema,
    /// response_format = json_object，schema 写进 system prompt（DeepSeek 等）
    JsonObject,
}

/// OpenAI 兼容 Oracle
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    schema_mode: SchemaMode,
    provider_name: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiOracle {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.unwrap_or(OPENAI_BASE_URL).trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            schema_mode: SchemaMode::JsonSchema,
            provider_name: "openai".to_string(),
            usage: TokenUsage::new(),
        }
    }

    pub fn with_schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    /// 组装请求体（不发送，便于测试）
    pub fn build_body(&self, request: &OracleRequest) -> Value {
        let mut system = request.system_prompt.clone();
        if let (Some(output), SchemaMode::JsonObject) = (&request.output, self.schema_mode) {
            system.push_str(&format!(
                "\n\nRespond with a JSON object matching this schema:\n{}",
                serde_json::to_string_pretty(&output.schema).unwrap_or_default()
            ));
        }

        let mut messages = vec![json!({ "role": "system", "content": system })];
        messages.extend(request.messages.iter().map(to_openai_message));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if !request.actions.is_empty() {
            let tools: Vec<Value> = request
                .actions
                .iter()
                .map(|d| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": d.name,
                            "description": d.description,
                            "parameters": d.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        if let Some(output) = &request.output {
            body["response_format"] = match self.schema_mode {
                SchemaMode::JsonSchema => json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": output.name,
                        "schema": output.schema,
                    }
                }),
                SchemaMode::JsonObject => json!({ "type": "json_object" }),
            };
        }

        body
    }

    /// 解析 choices[0].message 为 OracleReply
    pub fn parse_reply(
        &self,
        data: &Value,
        output: Option<&StructuredOutput>,
    ) -> Result<OracleReply, AgentError> {
        let message = &data["choices"][0]["message"];
        if message.is_null() {
            return Err(AgentError::Oracle(format!(
                "{} response has no choices",
                self.provider_name
            )));
        }
        let content = message["content"].as_str().unwrap_or("").to_string();

        if let Some(raw_calls) = message["tool_calls"].as_array().filter(|c| !c.is_empty()) {
            let calls = raw_calls
                .iter()
                .map(parse_tool_call)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(OracleReply::ToolCalls { content, calls });
        }

        if let Some(output) = output {
            let label = serde_json::from_str::<Value>(&content)
                .ok()
                .and_then(|v| v.get(&output.field).and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| content.trim().to_string());
            return Ok(OracleReply::Label(label));
        }

        Ok(OracleReply::Text(content))
    }
}

fn to_openai_message(m: &Message) -> Value {
    match m.role {
        Role::System => json!({ "role": "system", "content": m.content }),
        Role::User => json!({ "role": "user", "content": m.content }),
        Role::Assistant if m.tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": m.content })
        }
        Role::Assistant => {
            let calls: Vec<Value> = m
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": Value::Object(tc.arguments.clone()).to_string(),
                        }
                    })
                })
                .collect();
            let content = if m.content.is_empty() {
                Value::Null
            } else {
                json!(m.content)
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
            "content": m.content,
        }),
    }
}

/// 解析单个 tool_call；arguments 是 JSON 字符串，空串视为无参数
fn parse_tool_call(raw: &Value) -> Result<ToolCallRequest, AgentError> {
    let function = &raw["function"];
    let name = function["name"]
        .as_str()
        .ok_or_else(|| AgentError::Oracle("tool call without function name".into()))?;
    let arguments = match function["arguments"].as_str().map(str::trim) {
        None | Some("") => Map::new(),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return Err(AgentError::Oracle(format!(
                    "tool call {name} arguments are not an object: {other}"
                )))
            }
            Err(e) => {
                return Err(AgentError::Oracle(format!(
                    "tool call {name} has invalid JSON arguments: {e}"
                )))
            }
        },
    };
    Ok(match raw["id"].as_str().filter(|id| !id.is_empty()) {
        Some(id) => ToolCallRequest::new(id, name, arguments),
        None => ToolCallRequest::with_generated_id(name, arguments),
    })
}

#[async_trait]
impl ReasoningOracle for OpenAiOracle {
    async fn decide(&self, request: &OracleRequest) -> Result<OracleReply, AgentError> {
        let body = self.build_body(request);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Oracle(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::Oracle(format!("HTTP {status}: {text}")));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| AgentError::Oracle(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = data.get("usage") {
            self.usage.add(
                usage["prompt_tokens"].as_u64().unwrap_or(0),
                usage["completion_tokens"].as_u64().unwrap_or(0),
            );
        }

        self.parse_reply(&data, request.output.as_ref())
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}

//! DeepSeek API Oracle（OpenAI 兼容格式）
//!
//! DeepSeek 提供与 OpenAI 兼容的 API 接口，支持 function tools，但结构化输出只支持 json_object。
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat (常规对话), deepseek-reasoner (思考模式)

use std::time::Duration;

use crate::llm::openai::{OpenAiOracle, SchemaMode};

/// DeepSeek API 常量
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 创建 DeepSeek Oracle
///
/// - 模型可通过 `model` 参数或 `DEEPSEEK_MODEL` 环境变量指定，默认 `deepseek-chat`
pub fn create_deepseek_oracle(model: Option<&str>, api_key: &str, timeout: Duration) -> OpenAiOracle {
    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiOracle::new(Some(DEEPSEEK_BASE_URL), &model, api_key, timeout)
        .with_schema_mode(SchemaMode::JsonObject)
        .with_provider_name("deepseek")
}

//! LLM 层：推理 Oracle 抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use deepseek::{create_deepseek_oracle, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::MockOracle;
pub use openai::{OpenAiOracle, SchemaMode, TokenUsage};
pub use traits::{OracleReply, OracleRequest, ReasoningOracle, StructuredOutput};

use crate::config::LlmSection;

/// 根据配置与环境变量选择 Oracle 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_oracle_from_config(cfg: &LlmSection) -> Arc<dyn ReasoningOracle> {
    let provider = cfg.provider.to_lowercase();
    let timeout = Duration::from_secs(cfg.timeouts.request);
    let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    match (provider.as_str(), deepseek_key, openai_key) {
        ("mock", _, _) => {
            tracing::info!("Using Mock oracle");
            Arc::new(MockOracle)
        }
        ("deepseek", Some(key), _) => {
            tracing::info!("Using DeepSeek oracle");
            Arc::new(create_deepseek_oracle(cfg.deepseek.model.as_deref(), &key, timeout))
        }
        (_, _, Some(key)) if provider != "deepseek" => {
            tracing::info!("Using OpenAI oracle ({})", cfg.model);
            Arc::new(OpenAiOracle::new(cfg.base_url.as_deref(), &cfg.model, &key, timeout))
        }
        _ => {
            tracing::warn!("No API key set or provider unknown, using Mock oracle");
            Arc::new(MockOracle)
        }
    }
}

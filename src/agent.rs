//! 运行时组装
//!
//! 从 AppConfig 显式构建 Oracle、会话工厂与分派图，不使用全局单例；
//! CLI 与测试都经由这里拿到同一套组件。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::dispatch::{DispatchGraph, Prompts};
use crate::llm::{create_oracle_from_config, ReasoningOracle};
use crate::mcp::{SessionFactory, StdioSessionFactory, ToolSession};
use crate::tools::{ToolCallRequest, ToolCallResult, ToolInvoker};

/// 组装好的运行时组件
pub struct Runtime {
    pub oracle: Arc<dyn ReasoningOracle>,
    pub sessions: Arc<dyn SessionFactory>,
    pub graph: DispatchGraph,
}

/// 按配置构建 Oracle + 会话工厂 + 分派图
pub fn build_runtime(cfg: &AppConfig) -> Runtime {
    let oracle = create_oracle_from_config(&cfg.llm);
    let sessions: Arc<dyn SessionFactory> = Arc::new(StdioSessionFactory::new(cfg.service.clone()));
    let graph = build_dispatch_graph_with(oracle.clone(), sessions.clone(), cfg);
    Runtime {
        oracle,
        sessions,
        graph,
    }
}

/// 仅构建分派图
pub fn build_dispatch_graph(cfg: &AppConfig) -> DispatchGraph {
    build_runtime(cfg).graph
}

/// 用给定的 Oracle 与会话工厂构建分派图（测试替身从这里注入）
pub fn build_dispatch_graph_with(
    oracle: Arc<dyn ReasoningOracle>,
    sessions: Arc<dyn SessionFactory>,
    cfg: &AppConfig,
) -> DispatchGraph {
    DispatchGraph::new(
        oracle,
        sessions,
        Prompts::from(&cfg.prompts),
        cfg.classifier.max_retries,
    )
}

/// 连通性探测报告
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub tools: Vec<String>,
    pub called: String,
    pub result: ToolCallResult,
}

/// 打开一个会话、列出能力、调用一个工具（空参数），然后关闭
pub async fn probe(sessions: &dyn SessionFactory, tool: &str) -> Result<ProbeReport, AgentError> {
    let mut session = sessions.open().await?;
    let tools: Vec<String> = session
        .capabilities()
        .iter()
        .map(|d| d.name.clone())
        .collect();
    let request = ToolCallRequest::with_generated_id(tool, serde_json::Map::new());
    let result = ToolInvoker::new().invoke(session.as_ref(), &request).await;
    session.close().await;
    Ok(ProbeReport {
        tools,
        called: tool.to_string(),
        result,
    })
}

/// 启动时的能力数量（仅用于提示，失败返回错误而非中止）
pub async fn discover_capability_count(sessions: &dyn SessionFactory) -> Result<usize, AgentError> {
    let mut session: Box<dyn ToolSession> = sessions.open().await?;
    let count = session.capabilities().len();
    session.close().await;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmSection;
    use crate::core::ConversationState;

    #[tokio::test]
    async fn test_build_from_config_with_mock_and_missing_service() {
        let cfg = AppConfig {
            llm: LlmSection {
                provider: "mock".to_string(),
                ..LlmSection::default()
            },
            service: crate::config::ServiceSection {
                command: "bee-definitely-not-installed".to_string(),
                args: vec![],
                working_dir: None,
                ..Default::default()
            },
            ..AppConfig::default()
        };
        let runtime = build_runtime(&cfg);
        assert_eq!(runtime.oracle.name(), "mock");

        let err = probe(runtime.sessions.as_ref(), "get_orders").await.unwrap_err();
        assert!(err.is_session_setup_failure());

        let mut state = ConversationState::new();
        let outcome = runtime
            .graph
            .process_turn(&mut state, "Show my inventory please")
            .await
            .unwrap();
        assert!(outcome.reply.content.contains("unavailable"));
        assert_eq!(state.len(), 2);
    }
}

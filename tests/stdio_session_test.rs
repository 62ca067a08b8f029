//! stdio 会话集成测试：以 bee-seller-stub 作为真实子进程

#[cfg(test)]
mod tests {
    use bee_dispatch::agent::{build_dispatch_graph_with, probe};
    use bee_dispatch::config::{AppConfig, ServiceSection};
    use bee_dispatch::core::{AgentError, ConversationState};
    use bee_dispatch::dispatch::{Intent, ResponderId};
    use bee_dispatch::llm::MockOracle;
    use bee_dispatch::mcp::{ServiceSession, SessionFactory, StdioSessionFactory, ToolSession};
    use serde_json::{json, Map, Value};
    use std::sync::Arc;

    fn stub_config() -> ServiceSection {
        ServiceSection {
            command: env!("CARGO_BIN_EXE_bee-seller-stub").to_string(),
            args: vec![],
            working_dir: None,
            handshake_timeout_secs: 10,
            tool_timeout_secs: 10,
            ..ServiceSection::default()
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_handshake_and_discovery() {
        let mut session = ServiceSession::open(&stub_config()).await.unwrap();
        let names: Vec<&str> = session.capabilities().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["get_orders", "get_inventory", "get_listings", "get_sales_metrics"]
        );
        assert_eq!(
            session.server_info().map(|s| s.name.as_str()),
            Some("amazon-seller-mcp-server")
        );

        // 重复读取能力列表结果一致
        let again: Vec<&str> = session.capabilities().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, again);
        let interval = &session.registry().get("get_sales_metrics").unwrap().input_schema;
        assert_eq!(interval["properties"]["interval"]["enum"], json!(["DAY", "WEEK", "MONTH"]));

        session.close().await;
    }

    #[tokio::test]
    async fn test_invoke_outcomes() {
        let mut session = ServiceSession::open(&stub_config()).await.unwrap();

        let orders = session.invoke("get_orders", &Map::new()).await.unwrap();
        assert!(orders.success);
        assert!(orders.payload.contains("113-4820937-1029384"));

        let filtered = session
            .invoke("get_orders", &args(json!({"createdAfter": "2024-06-02T00:00:00Z"})))
            .await
            .unwrap();
        assert!(filtered.success);
        assert!(!filtered.payload.contains("113-4820937-1029384"));

        let bad = session
            .invoke("get_sales_metrics", &args(json!({"interval": "YEAR"})))
            .await
            .unwrap();
        assert!(!bad.success);
        assert!(bad.error.as_deref().unwrap_or("").contains("interval"));

        let empty = session
            .invoke("get_listings", &args(json!({"sku": "NO-SUCH-SKU"})))
            .await
            .unwrap();
        assert!(empty.success);
        assert_eq!(empty.payload, "");

        let unknown = session.invoke("get_refunds", &Map::new()).await.unwrap_err();
        assert_eq!(unknown, AgentError::ToolNotFound("get_refunds".into()));

        session.close().await;
        assert!(!session.is_open());
        let closed = session.invoke("get_orders", &Map::new()).await.unwrap_err();
        assert_eq!(closed, AgentError::NotConnected);
    }

    #[tokio::test]
    async fn test_probe_against_stub() {
        let factory = StdioSessionFactory::new(stub_config());
        let report = probe(&factory, "get_inventory").await.unwrap();
        assert_eq!(report.tools.len(), 4);
        assert!(report.result.success);
        assert!(report.result.payload.contains("BEE-MUG-01"));

        let report = probe(&factory, "get_refunds").await.unwrap();
        assert!(!report.result.success);
        assert_eq!(
            report.result.message_content(),
            "Error calling tool: Tool not found: get_refunds"
        );
    }

    #[tokio::test]
    async fn test_sessions_are_not_shared() {
        let factory = StdioSessionFactory::new(stub_config());
        let mut first = factory.open().await.unwrap();
        let mut second = factory.open().await.unwrap();
        first.close().await;
        let still_open = second.invoke("get_inventory", &Map::new()).await.unwrap();
        assert!(still_open.success);
        second.close().await;
    }

    #[tokio::test]
    async fn test_data_query_turn_end_to_end() {
        let sessions: Arc<dyn SessionFactory> = Arc::new(StdioSessionFactory::new(stub_config()));
        let graph = build_dispatch_graph_with(Arc::new(MockOracle), sessions, &AppConfig::default());
        let mut state = ConversationState::new();

        let outcome = graph
            .process_turn(&mut state, "How many orders came in today?")
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::DataQuery);
        assert_eq!(outcome.responder, ResponderId::DataQuery);
        assert_eq!(outcome.tool_messages.len(), 1);
        assert!(outcome.reply.content.contains("113-4820937-1029384"));
        assert_eq!(state.len(), 2);
    }
}

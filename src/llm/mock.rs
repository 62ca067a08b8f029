//! Mock Oracle（无 API Key 时使用，也便于本地跑通整条分派链路）
//!
//! 分类：关键词匹配；工具绑定：按关键词挑选可用工具；有工具结果时把结果逐条列出作为总结。

use async_trait::async_trait;
use serde_json::Map;

use crate::core::AgentError;
use crate::llm::{OracleReply, OracleRequest, ReasoningOracle};
use crate::memory::Role;
use crate::tools::ToolCallRequest;

const EMOTIONAL_KEYWORDS: &[&str] = &[
    "feel", "feeling", "sad", "anxious", "overwhelmed", "stressed", "lonely", "upset",
    "angry", "worried", "depressed", "afraid", "难过", "焦虑", "压力",
];

const DATA_KEYWORDS: &[&str] = &[
    "order", "inventory", "stock", "listing", "sku", "sales", "revenue", "seller", "订单",
    "库存",
];

/// 关键词 → 工具名
const TOOL_KEYWORDS: &[(&str, &str)] = &[
    ("order", "get_orders"),
    ("inventory", "get_inventory"),
    ("stock", "get_inventory"),
    ("listing", "get_listings"),
    ("sku", "get_listings"),
    ("sales", "get_sales_metrics"),
    ("revenue", "get_sales_metrics"),
];

/// Mock Oracle：不联网，结果确定
#[derive(Debug, Default)]
pub struct MockOracle;

impl MockOracle {
    fn classify(text: &str) -> &'static str {
        let lower = text.to_lowercase();
        if EMOTIONAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            "emotional"
        } else if DATA_KEYWORDS.iter().any(|k| lower.contains(k)) {
            "data_query"
        } else {
            "logical"
        }
    }

    fn pick_tools(request: &OracleRequest) -> Vec<ToolCallRequest> {
        let lower = request.last_user_content().to_lowercase();
        let mut picked: Vec<&str> = Vec::new();
        for (keyword, tool) in TOOL_KEYWORDS {
            let available = request.actions.iter().any(|d| d.name == *tool);
            if available && lower.contains(keyword) && !picked.contains(tool) {
                picked.push(tool);
            }
        }
        picked
            .into_iter()
            .enumerate()
            .map(|(i, tool)| ToolCallRequest::new(format!("mock_call_{}", i + 1), tool, Map::new()))
            .collect()
    }
}

#[async_trait]
impl ReasoningOracle for MockOracle {
    async fn decide(&self, request: &OracleRequest) -> Result<OracleReply, AgentError> {
        if request.output.is_some() {
            return Ok(OracleReply::Label(
                Self::classify(request.last_user_content()).to_string(),
            ));
        }

        let tool_results: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str())
            .collect();
        if !tool_results.is_empty() {
            let mut summary = String::from("Here is what the data service returned:");
            for result in tool_results {
                summary.push_str("\n- ");
                summary.push_str(result);
            }
            return Ok(OracleReply::Text(summary));
        }

        if !request.actions.is_empty() {
            let calls = Self::pick_tools(request);
            if calls.is_empty() {
                return Ok(OracleReply::Text(
                    "None of the available data tools match that question.".to_string(),
                ));
            }
            return Ok(OracleReply::ToolCalls {
                content: String::new(),
                calls,
            });
        }

        Ok(OracleReply::Text(format!(
            "Mock reply to: {}",
            request.last_user_content()
        )))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StructuredOutput;
    use crate::mcp::CapabilityDescriptor;
    use serde_json::json;

    fn label_request(text: &str) -> OracleRequest {
        OracleRequest::new("classify", text).with_output(StructuredOutput {
            name: "MessageClassifier".into(),
            schema: json!({}),
            field: "message_type".into(),
            labels: vec![],
        })
    }

    #[tokio::test]
    async fn test_mock_classification() {
        let o = MockOracle;
        assert_eq!(
            o.decide(&label_request("I feel overwhelmed today")).await.unwrap(),
            OracleReply::Label("emotional".into())
        );
        assert_eq!(
            o.decide(&label_request("How many orders came in today?")).await.unwrap(),
            OracleReply::Label("data_query".into())
        );
        assert_eq!(
            o.decide(&label_request("What is the boiling point of water in Celsius?")).await.unwrap(),
            OracleReply::Label("logical".into())
        );
    }

    #[tokio::test]
    async fn test_mock_picks_only_available_tools() {
        let request = OracleRequest::new("seller", "Show orders and inventory")
            .with_actions(vec![CapabilityDescriptor::new("get_orders", "", json!({}))]);
        let OracleReply::ToolCalls { calls, .. } = MockOracle.decide(&request).await.unwrap() else {
            panic!("expected tool calls");
        };
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_orders");
    }
}

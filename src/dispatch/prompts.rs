//! 内置 system prompt；可被配置 [prompts] 覆盖

use crate::config::PromptsSection;

pub const CLASSIFIER_PROMPT: &str = "Classify the user message as either:
- 'emotional': if it asks for emotional support, therapy, deals with feelings, or personal problems
- 'logical': if it asks for facts, information, logical analysis, or practical solutions
- 'data_query': if it asks about seller account data (orders, inventory, listings, sales, etc.)
Answer with exactly one of these labels.";

pub const THERAPIST_PROMPT: &str = "You are a compassionate therapist. Focus on the emotional aspects of the user's message.
Show empathy, validate their feelings, and help them process their emotions.
Ask thoughtful questions to help them explore their feelings more deeply.
Avoid giving logical solutions unless explicitly asked.";

pub const LOGICAL_PROMPT: &str = "You are a purely logical assistant. Focus only on facts and information.
Provide clear, concise answers based on logic and evidence.
Do not address emotions or provide emotional support.
Be direct and straightforward in your responses.";

pub const DATA_QUERY_PROMPT: &str = "You are a seller account assistant with access to real-time seller data.
You can help with:
- Checking orders and order details
- Viewing inventory levels
- Getting product listings
- Analyzing sales metrics

Use the available tools to answer questions about the seller account.
Always provide specific data when available.";

/// 各角色最终使用的 prompt
#[derive(Debug, Clone)]
pub struct Prompts {
    pub classifier: String,
    pub therapist: String,
    pub logical: String,
    pub data_query: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            classifier: CLASSIFIER_PROMPT.to_string(),
            therapist: THERAPIST_PROMPT.to_string(),
            logical: LOGICAL_PROMPT.to_string(),
            data_query: DATA_QUERY_PROMPT.to_string(),
        }
    }
}

impl From<&PromptsSection> for Prompts {
    fn from(section: &PromptsSection) -> Self {
        let defaults = Self::default();
        Self {
            classifier: section.classifier.clone().unwrap_or(defaults.classifier),
            therapist: section.therapist.clone().unwrap_or(defaults.therapist),
            logical: section.logical.clone().unwrap_or(defaults.logical),
            data_query: section.data_query.clone().unwrap_or(defaults.data_query),
        }
    }
}

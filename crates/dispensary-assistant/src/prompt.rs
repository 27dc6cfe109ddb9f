use crate::types::PromptMessage;

pub const RECOMMENDATION_SYSTEM_PROMPT: &str = "You are a helpful cannabis dispensary assistant. \
     Provide brief, friendly product recommendations based on customer needs. \
     Keep responses under 100 words.";

/// System prompt followed by the customer's message verbatim.
#[must_use]
pub fn recommendation_messages(customer_message: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(RECOMMENDATION_SYSTEM_PROMPT),
        PromptMessage::user(customer_message),
    ]
}

//! Wire types for the `chat/completions` endpoint.
//!
//! Only the fields this crate reads are modelled; unknown response fields are
//! ignored.

use serde::{Deserialize, Serialize};

/// One role-tagged message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [PromptMessage],
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    /// `null` when the model returned a tool call or refused.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed text of the first choice, if it has any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

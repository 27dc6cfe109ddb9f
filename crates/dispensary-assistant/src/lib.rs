//! Text-generation client for chat auto-replies.
//!
//! Talks to an OpenAI-compatible `chat/completions` endpoint. The server only
//! builds a client when `DISPENSARY_LLM_API_URL` is configured.

pub mod client;
pub mod error;
pub mod prompt;
pub mod types;

pub use client::AssistantClient;
pub use error::AssistantError;
pub use prompt::{recommendation_messages, RECOMMENDATION_SYSTEM_PROMPT};
pub use types::{ChatCompletionRequest, ChatCompletionResponse, PromptMessage};

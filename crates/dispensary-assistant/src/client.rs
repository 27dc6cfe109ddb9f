//! HTTP client for an OpenAI-compatible text-generation API.
//!
//! Wraps `reqwest` with a request timeout, optional bearer key, and typed
//! response decoding. Callers treat every error as non-fatal.

use std::time::Duration;

use dispensary_core::LlmConfig;
use reqwest::{Client, Url};

use crate::error::AssistantError;
use crate::prompt::recommendation_messages;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, PromptMessage};

const COMPLETIONS_PATH: &str = "v1/chat/completions";

/// Client for the `chat/completions` endpoint.
///
/// Use [`AssistantClient::from_config`] in the server or
/// [`AssistantClient::with_base_url`] to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: Url,
    timeout: Duration,
}

impl AssistantClient {
    /// Builds a client from the loaded LLM configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`AssistantError::InvalidBaseUrl`] if the URL is bad.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AssistantError> {
        Self::with_base_url(
            config.api_key.as_deref(),
            &config.model,
            config.timeout_secs,
            &config.api_url,
        )
    }

    /// Creates a client with an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`AssistantError::InvalidBaseUrl`] if `base_url` is
    /// not a valid URL.
    pub fn with_base_url(
        api_key: Option<&str>,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AssistantError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent("dispensary/0.1 (chat-assistant)")
            .build()?;

        // Trailing slash so `join` appends to any path prefix instead of
        // replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&normalised)
            .and_then(|base| base.join(COMPLETIONS_PATH))
            .map_err(|e| AssistantError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key: api_key.map(str::to_owned),
            model: model.to_owned(),
            endpoint,
            timeout,
        })
    }

    /// Upper bound a caller should wait for one completion.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Asks for a short product recommendation in reply to a customer message.
    ///
    /// # Errors
    ///
    /// Same as [`AssistantClient::complete`].
    pub async fn recommend(&self, customer_message: &str) -> Result<String, AssistantError> {
        self.complete(&recommendation_messages(customer_message))
            .await
    }

    /// Sends a completion request and returns the first choice's text.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::Http`] on network failure, timeout, or non-2xx status.
    /// - [`AssistantError::Deserialize`] if the body is not a completion.
    /// - [`AssistantError::EmptyReply`] if the first choice has no text.
    pub async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AssistantError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?.error_for_status()?;
        let body = response.text().await?;
        let completion: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| AssistantError::Deserialize {
                context: format!("chat completion from {}", self.endpoint),
                source: e,
            })?;

        let text = completion.first_text().ok_or(AssistantError::EmptyReply)?;
        tracing::debug!(model = %self.model, reply_len = text.len(), "completion received");
        Ok(text.to_string())
    }
}

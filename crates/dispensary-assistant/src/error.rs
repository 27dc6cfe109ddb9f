use thiserror::Error;

/// Errors returned by the text-generation client.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Network or TLS failure, timeout, or non-2xx status from the endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL could not be parsed.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The endpoint answered but produced no usable text.
    #[error("completion contained no reply text")]
    EmptyReply,
}

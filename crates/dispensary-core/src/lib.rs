pub mod app_config;
pub mod appointments;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod orders;
pub mod session;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, LlmConfig};
pub use appointments::{available_slots, generate_appointment_number, ConsultationType};
pub use catalog::ProductCategory;
pub use chat::{wants_recommendation, AgentStatus, ConversationStatus, SenderType, SYSTEM_SENDER_ID};
pub use config::{load_app_config, load_app_config_from_env};
pub use orders::{
    estimated_ready_time, generate_order_number, price_cart, validate_checkout, CartError,
    CartLine, FulfillmentType, OrderStatus, PricedCart, PricedLine, ProductSnapshot, StockPolicy,
};
pub use session::hash_session_token;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// User role attached to every authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(CoreError::InvalidValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

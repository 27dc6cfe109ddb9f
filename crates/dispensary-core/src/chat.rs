//! Conversation state and auto-reply trigger rules for the live chat.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Sender id stamped on automated replies.
pub const SYSTEM_SENDER_ID: i64 = 0;

/// Words that route a customer message to the recommendation assistant.
pub const RECOMMENDATION_KEYWORDS: &[&str] = &["recommend", "suggest", "help", "product"];

/// `waiting` (unassigned) → `active` (agent assigned) → `closed` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Waiting,
    Active,
    Closed,
}

impl ConversationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Waiting => "waiting",
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }

    /// Waiting and active conversations count against the one-open-per-user limit.
    #[must_use]
    pub fn is_open(self) -> bool {
        !matches!(self, ConversationStatus::Closed)
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ConversationStatus::Waiting),
            "active" => Ok(ConversationStatus::Active),
            "closed" => Ok(ConversationStatus::Closed),
            other => Err(CoreError::InvalidValue {
                field: "conversation status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Customer,
    Agent,
}

impl SenderType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SenderType::Customer => "customer",
            SenderType::Agent => "agent",
        }
    }
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence status of a chat agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
    Away,
}

impl AgentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Away => "away",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` when a customer message should get an assistant reply.
///
/// Case-insensitive substring match against [`RECOMMENDATION_KEYWORDS`], so
/// "Helpful" and "products" both trigger.
#[must_use]
pub fn wants_recommendation(text: &str) -> bool {
    let lower = text.to_lowercase();
    RECOMMENDATION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `chat_conversations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationRow {
    pub id: i64,
    pub user_id: i64,
    pub agent_id: Option<i64>,
    pub status: String,
    pub subject: Option<String>,
    pub started_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CONVERSATION_COLUMNS: &str =
    "id, user_id, agent_id, status, subject, started_at, closed_at, created_at, updated_at";

async fn find_open_conversation(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<ConversationRow>, DbError> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations \
         WHERE user_id = $1 AND status IN ('waiting', 'active')"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the user's open (waiting or active) conversation, creating a
/// `waiting` one if none exists.
///
/// Concurrent callers converge on a single row: the insert is a no-op when
/// the partial unique index already holds an open conversation for the user,
/// and the winner is re-read.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the conflicting row disappeared before it
/// could be re-read, or [`DbError::Sqlx`] if a query fails.
pub async fn get_or_create_conversation(
    pool: &PgPool,
    user_id: i64,
    subject: Option<&str>,
) -> Result<ConversationRow, DbError> {
    if let Some(existing) = find_open_conversation(pool, user_id).await? {
        return Ok(existing);
    }

    let inserted = sqlx::query_as::<_, ConversationRow>(&format!(
        "INSERT INTO chat_conversations (user_id, status, subject) \
         VALUES ($1, 'waiting', $2) \
         ON CONFLICT (user_id) WHERE status IN ('waiting', 'active') DO NOTHING \
         RETURNING {CONVERSATION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(subject)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(row) => {
            tracing::info!(conversation_id = row.id, user_id, "conversation started");
            Ok(row)
        }
        None => find_open_conversation(pool, user_id)
            .await?
            .ok_or(DbError::NotFound),
    }
}

/// Returns a conversation by id regardless of owner; callers enforce access.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_conversation(
    pool: &PgPool,
    conversation_id: i64,
) -> Result<Option<ConversationRow>, DbError> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations WHERE id = $1"
    ))
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists every conversation the user has started, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_conversations(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<ConversationRow>, DbError> {
    let rows = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations \
         WHERE user_id = $1 \
         ORDER BY started_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists all waiting and active conversations, oldest first, for the agent
/// console.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_open_conversations(pool: &PgPool) -> Result<Vec<ConversationRow>, DbError> {
    let rows = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations \
         WHERE status IN ('waiting', 'active') \
         ORDER BY started_at, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Assigns an agent and moves the conversation to `active`.
///
/// # Errors
///
/// Returns [`DbError::InvalidConversationTransition`] if the conversation is
/// closed or missing, or [`DbError::Sqlx`] if the update fails.
pub async fn assign_conversation(
    pool: &PgPool,
    conversation_id: i64,
    agent_id: i64,
) -> Result<ConversationRow, DbError> {
    let row = sqlx::query_as::<_, ConversationRow>(&format!(
        "UPDATE chat_conversations \
         SET agent_id = $1, status = 'active', updated_at = NOW() \
         WHERE id = $2 AND status IN ('waiting', 'active') \
         RETURNING {CONVERSATION_COLUMNS}"
    ))
    .bind(agent_id)
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::InvalidConversationTransition {
        id: conversation_id,
        expected_status: "waiting or active",
    })
}

/// Closes an open conversation and stamps `closed_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidConversationTransition`] if the conversation is
/// already closed or missing, or [`DbError::Sqlx`] if the update fails.
pub async fn close_conversation(pool: &PgPool, conversation_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE chat_conversations \
         SET status = 'closed', closed_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status IN ('waiting', 'active')",
    )
    .bind(conversation_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidConversationTransition {
            id: conversation_id,
            expected_status: "waiting or active",
        });
    }

    tracing::info!(conversation_id, "conversation closed");
    Ok(())
}

use chrono::{DateTime, Utc};
use dispensary_core::SenderType;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `chat_messages` table. Sender id `0` marks an automated
/// reply.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatMessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_type: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Appends a message to a conversation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_chat_message(
    pool: &PgPool,
    conversation_id: i64,
    sender_id: i64,
    sender_type: SenderType,
    message: &str,
) -> Result<ChatMessageRow, DbError> {
    let row = sqlx::query_as::<_, ChatMessageRow>(
        "INSERT INTO chat_messages (conversation_id, sender_id, sender_type, message) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, conversation_id, sender_id, sender_type, message, is_read, created_at",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(sender_type.as_str())
    .bind(message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Lists a conversation's messages in creation order. With `after_id`, only
/// messages with a greater id are returned, for incremental polling.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_conversation_messages(
    pool: &PgPool,
    conversation_id: i64,
    after_id: Option<i64>,
) -> Result<Vec<ChatMessageRow>, DbError> {
    let rows = sqlx::query_as::<_, ChatMessageRow>(
        "SELECT id, conversation_id, sender_id, sender_type, message, is_read, created_at \
         FROM chat_messages \
         WHERE conversation_id = $1 \
           AND ($2::bigint IS NULL OR id > $2) \
         ORDER BY created_at, id",
    )
    .bind(conversation_id)
    .bind(after_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Marks every unread message in the conversation not sent by `reader_id`
/// as read. Returns the number of messages updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_messages_read(
    pool: &PgPool,
    conversation_id: i64,
    reader_id: i64,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE chat_messages \
         SET is_read = true \
         WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = false",
    )
    .bind(conversation_id)
    .bind(reader_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

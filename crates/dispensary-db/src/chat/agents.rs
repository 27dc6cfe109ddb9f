use chrono::{DateTime, Utc};
use dispensary_core::AgentStatus;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `chat_agents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatAgentRow {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sets the presence status on the caller's agent record.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no agent record, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_agent_status(
    pool: &PgPool,
    user_id: i64,
    status: AgentStatus,
) -> Result<ChatAgentRow, DbError> {
    let row = sqlx::query_as::<_, ChatAgentRow>(
        "UPDATE chat_agents \
         SET status = $1, updated_at = NOW() \
         WHERE user_id = $2 \
         RETURNING id, user_id, display_name, status, is_active, created_at, updated_at",
    )
    .bind(status.as_str())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Lists active agents currently `online`, by display name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_online_agents(pool: &PgPool) -> Result<Vec<ChatAgentRow>, DbError> {
    let rows = sqlx::query_as::<_, ChatAgentRow>(
        "SELECT id, user_id, display_name, status, is_active, created_at, updated_at \
         FROM chat_agents \
         WHERE is_active = true AND status = 'online' \
         ORDER BY display_name, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

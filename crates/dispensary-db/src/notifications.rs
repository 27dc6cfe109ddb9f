use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `notifications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub related_order_id: Option<i64>,
    pub related_appointment_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Lists a user's notifications, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_notifications(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<NotificationRow>, DbError> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT id, user_id, notification_type, title, message, related_order_id, \
                related_appointment_id, is_read, created_at \
         FROM notifications \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

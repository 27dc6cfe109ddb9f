use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `user_preferences` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserPreferenceRow {
    pub id: i64,
    pub user_id: i64,
    pub favorite_products: Vec<i64>,
    pub preferred_fulfillment_type: Option<String>,
    pub notification_preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns the user's saved preferences, or `None` if they never saved any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_preferences(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<UserPreferenceRow>, DbError> {
    let row = sqlx::query_as::<_, UserPreferenceRow>(
        "SELECT id, user_id, favorite_products, preferred_fulfillment_type, \
                notification_preferences, created_at, updated_at \
         FROM user_preferences \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

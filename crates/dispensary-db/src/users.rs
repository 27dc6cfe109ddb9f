use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub age_verified: bool,
    pub age_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Resolves a hashed session token to its user. Expired sessions resolve to
/// `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_session_user(pool: &PgPool, token_hash: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT u.id, u.open_id, u.name, u.email, u.phone, u.role, u.age_verified, \
                u.age_verified_at, u.created_at, u.updated_at, u.last_signed_in \
         FROM user_sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token_hash = $1 AND s.expires_at > NOW()",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Deletes a session row. Returns `true` when a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_session(pool: &PgPool, token_hash: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Sets the user's age-verified flag. The first verification timestamp is
/// kept on repeat calls.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has `user_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_user_age_verified(pool: &PgPool, user_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE users \
         SET age_verified = true, \
             age_verified_at = COALESCE(age_verified_at, NOW()), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

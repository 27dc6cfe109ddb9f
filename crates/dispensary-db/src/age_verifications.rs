use sqlx::PgPool;

use crate::DbError;

/// Records one self-attested age check and returns the new row id.
///
/// `ip_address` must come from the connection, not from the request body.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_age_verification(
    pool: &PgPool,
    user_id: Option<i64>,
    ip_address: &str,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO age_verifications (user_id, ip_address, method) \
         VALUES ($1, $2, 'self_attestation') \
         RETURNING id",
    )
    .bind(user_id)
    .bind(ip_address)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

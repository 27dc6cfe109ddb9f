use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

// Path relative to crates/dispensary-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &dispensary_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("conversation {id} cannot transition: expected status {expected_status}")]
    InvalidConversationTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Run a health check: `SELECT 1` against the pool.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Returns `true` when the error is a Postgres unique-constraint violation.
#[must_use]
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}


pub mod age_verifications;
pub mod appointments;
pub mod blog;
pub mod chat;
pub mod notifications;
pub mod orders;
pub mod preferences;
pub mod products;
pub mod users;

pub use age_verifications::record_age_verification;
pub use appointments::{create_appointment, list_user_appointments, AppointmentRow, NewAppointment};
pub use blog::{get_published_blog_post_by_slug, list_published_blog_posts, BlogPostRow};
pub use chat::{
    assign_conversation, close_conversation, get_conversation, get_or_create_conversation,
    insert_chat_message, list_conversation_messages, list_online_agents, list_open_conversations,
    list_user_conversations, mark_messages_read, update_agent_status, ChatAgentRow,
    ChatMessageRow, ConversationRow,
};
pub use notifications::{list_user_notifications, NotificationRow};
pub use orders::{
    create_order, get_order_by_id, list_order_items, list_user_orders, CreatedOrder, NewOrder,
    OrderError, OrderItemRow, OrderRow,
};
pub use preferences::{get_user_preferences, UserPreferenceRow};
pub use products::{get_product_by_id, get_products_by_ids, list_products, ProductRow};
pub use users::{delete_session, get_session_user, mark_user_age_verified, UserRow};

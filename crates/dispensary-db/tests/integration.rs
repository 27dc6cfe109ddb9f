//! Offline unit tests for dispensary-db pool configuration and row types.
//! These tests do not require a live database connection.

use dispensary_core::{AppConfig, CartError, Environment, StockPolicy};
use dispensary_db::{DbError, OrderError, PoolConfig, ProductRow};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        session_salt: "salt".to_string(),
        session_cookie_name: "app_session_id".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        rate_limit_per_minute: 120,
        stock_policy: StockPolicy::CheckOnly,
        llm: None,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn product_row_snapshot_keeps_checkout_fields() {
    let now = chrono::Utc::now();
    let row = ProductRow {
        id: 7,
        name: "Blue Dream".to_string(),
        description: None,
        category: "flower".to_string(),
        price: Decimal::new(1250, 2),
        quantity: 3,
        thc_level: Some(Decimal::new(2150, 2)),
        cbd_level: None,
        strain: Some("hybrid".to_string()),
        effects: None,
        image: None,
        active: true,
        created_at: now,
        updated_at: now,
    };

    let snapshot = row.snapshot();
    assert_eq!(snapshot.id, 7);
    assert_eq!(snapshot.name, "Blue Dream");
    assert_eq!(snapshot.price.to_string(), "12.50");
    assert_eq!(snapshot.quantity, 3);
}

#[test]
fn order_error_wraps_cart_and_db_failures() {
    let cart: OrderError = CartError::ProductNotFound(99).into();
    assert_eq!(cart.to_string(), "Product 99 not found");

    let db: OrderError = sqlx::Error::RowNotFound.into();
    assert!(matches!(db, OrderError::Db(DbError::Sqlx(_))));
}

#[test]
fn invalid_transition_message_names_expected_status() {
    let err = DbError::InvalidConversationTransition {
        id: 4,
        expected_status: "waiting or active",
    };
    assert_eq!(
        err.to_string(),
        "conversation 4 cannot transition: expected status waiting or active"
    );
}

//! Read-only catalog queries against the `products` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: Decimal,
    /// Units in stock, never negative.
    pub quantity: i32,
    /// THC percentage, `NUMERIC(5,2)`.
    pub thc_level: Option<Decimal>,
    pub cbd_level: Option<Decimal>,
    pub strain: Option<String>,
    pub effects: Option<String>,
    pub image: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    #[must_use]
    pub fn snapshot(&self) -> dispensary_core::ProductSnapshot {
        dispensary_core::ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, quantity, thc_level, \
     cbd_level, strain, effects, image, active, created_at, updated_at";

/// Lists active products, optionally restricted to one category, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    category: Option<&str>,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products \
         WHERE active = true \
           AND ($1::text IS NULL OR category = $1) \
         ORDER BY name, id"
    ))
    .bind(category)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single product by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_id(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches every active product in `ids` with a single `= ANY($1)` query.
///
/// Missing or inactive ids are simply absent from the result; callers decide
/// whether that is an error. Duplicate ids are harmless.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_products_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<ProductRow>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products \
         WHERE id = ANY($1) AND active = true \
         ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

//! The order-creation transaction and order read queries.
//!
//! [`create_order`] runs in three phases: shape validation, a single batched
//! product fetch plus in-memory stock/price checks, and one transaction that
//! writes the order row and every item row. Nothing is written unless all
//! checks pass, and a failure inside the transaction rolls back every row.

use chrono::{DateTime, Utc};
use dispensary_core::{
    estimated_ready_time, generate_order_number, price_cart, validate_checkout, CartError,
    CartLine, FulfillmentType, ProductSnapshot, StockPolicy,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::{products::get_products_by_ids, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub user_id: i64,
    pub order_number: String,
    pub status: String,
    pub fulfillment_type: String,
    pub total_price: Decimal,
    pub estimated_ready_time: Option<DateTime<Utc>>,
    pub actual_ready_time: Option<DateTime<Utc>>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `order_items` table. `price_at_purchase` never changes
/// after insert.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: i64,
    pub items: &'a [CartLine],
    pub fulfillment_type: FulfillmentType,
    pub delivery_address: Option<&'a str>,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: i64,
    pub order_number: String,
    pub total_price: Decimal,
    pub estimated_ready_time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart failed validation; nothing was written.
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        OrderError::Db(DbError::Sqlx(e))
    }
}

/// Locks the cart's product rows in id order, re-checks stock against the
/// locked quantities, then decrements it.
///
/// Locking in a fixed order keeps overlapping checkouts from deadlocking.
async fn reserve_stock(
    tx: &mut Transaction<'_, Postgres>,
    requested: &[(i64, i32)],
    snapshots: &[ProductSnapshot],
) -> Result<(), OrderError> {
    let mut ids: Vec<i64> = requested.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();

    let locked: Vec<(i64, i32)> = sqlx::query_as::<_, (i64, i32)>(
        "SELECT id, quantity FROM products \
         WHERE id = ANY($1) \
         ORDER BY id \
         FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await?;

    for &(product_id, qty) in requested {
        let available = locked
            .iter()
            .find(|(id, _)| *id == product_id)
            .map_or(0, |(_, quantity)| *quantity);
        if available < qty {
            tracing::warn!(
                product_id,
                requested = qty,
                available,
                "stock changed during checkout"
            );
            let name = snapshots
                .iter()
                .find(|s| s.id == product_id)
                .map_or_else(|| product_id.to_string(), |s| s.name.clone());
            return Err(CartError::InsufficientStock {
                product_id,
                name,
                requested: qty,
                available,
            }
            .into());
        }
    }

    let (update_ids, quantities): (Vec<i64>, Vec<i32>) = requested.iter().copied().unzip();
    sqlx::query(
        "UPDATE products AS p \
         SET quantity = p.quantity - r.qty, updated_at = NOW() \
         FROM UNNEST($1::bigint[], $2::int[]) AS r(id, qty) \
         WHERE p.id = r.id",
    )
    .bind(&update_ids)
    .bind(&quantities)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Order creation
// ---------------------------------------------------------------------------

/// Validates a cart against current stock and prices, then commits the order
/// and its items atomically.
///
/// With [`StockPolicy::Reserve`] the same transaction locks the product rows,
/// re-checks stock against the locked quantities and decrements it; a product
/// whose stock dropped since the first check aborts the whole transaction with
/// [`CartError::InsufficientStock`] carrying the current quantity.
///
/// # Errors
///
/// - [`OrderError::Cart`] for validation, missing-product, or stock failures.
/// - [`OrderError::Db`] if any query or the commit fails; the transaction is
///   rolled back.
pub async fn create_order(
    pool: &PgPool,
    order: NewOrder<'_>,
    stock_policy: StockPolicy,
) -> Result<CreatedOrder, OrderError> {
    validate_checkout(order.items, order.fulfillment_type, order.delivery_address)?;

    let mut product_ids: Vec<i64> = order.items.iter().map(|i| i.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let snapshots: Vec<ProductSnapshot> = get_products_by_ids(pool, &product_ids)
        .await?
        .iter()
        .map(crate::products::ProductRow::snapshot)
        .collect();
    let cart = price_cart(order.items, &snapshots)?;

    let now = Utc::now();
    let order_number = generate_order_number(now);
    let ready_at = estimated_ready_time(now);
    let delivery_address = match order.fulfillment_type {
        FulfillmentType::Delivery => order.delivery_address.map(str::trim),
        FulfillmentType::Pickup => None,
    };

    let mut tx = pool.begin().await?;

    if stock_policy == StockPolicy::Reserve {
        if let Err(e) = reserve_stock(&mut tx, &cart.quantities_by_product(), &snapshots).await {
            tx.rollback().await?;
            return Err(e);
        }
    }

    let order_id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders \
             (user_id, order_number, status, fulfillment_type, total_price, \
              estimated_ready_time, delivery_address, notes) \
         VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(order.user_id)
    .bind(&order_number)
    .bind(order.fulfillment_type.as_str())
    .bind(cart.total_price)
    .bind(ready_at)
    .bind(delivery_address)
    .bind(order.notes)
    .fetch_one(&mut *tx)
    .await?;

    let item_product_ids: Vec<i64> = cart.lines.iter().map(|l| l.product_id).collect();
    let item_quantities: Vec<i32> = cart.lines.iter().map(|l| l.quantity).collect();
    let item_prices: Vec<Decimal> = cart.lines.iter().map(|l| l.price_at_purchase).collect();

    // One bulk insert for all items, preserving request order.
    sqlx::query(
        "INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase) \
         SELECT $1, item.product_id, item.quantity, item.price \
         FROM UNNEST($2::bigint[], $3::int[], $4::numeric[]) \
              WITH ORDINALITY AS item(product_id, quantity, price, position) \
         ORDER BY item.position",
    )
    .bind(order_id)
    .bind(&item_product_ids)
    .bind(&item_quantities)
    .bind(&item_prices)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        order_id,
        order_number = %order_number,
        item_count = cart.lines.len(),
        total_price = %cart.total_price,
        "order created"
    );

    Ok(CreatedOrder {
        order_id,
        order_number,
        total_price: cart.total_price,
        estimated_ready_time: ready_at,
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

const ORDER_COLUMNS: &str = "id, user_id, order_number, status, fulfillment_type, total_price, \
     estimated_ready_time, actual_ready_time, delivery_address, notes, created_at, updated_at";

/// Returns all orders for a user, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_orders(pool: &PgPool, user_id: i64) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single order by id regardless of owner; callers enforce ownership.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_id(pool: &PgPool, order_id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the line items of an order in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_items(pool: &PgPool, order_id: i64) -> Result<Vec<OrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, product_id, quantity, price_at_purchase, created_at \
         FROM order_items \
         WHERE order_id = $1 \
         ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

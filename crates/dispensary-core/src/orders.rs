//! Checkout rules shared by the order transaction and the API layer.
//!
//! Everything here is pure: cart validation, price snapshotting, and order
//! number generation run without touching the database so that every failure
//! is detected before a transaction is opened.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CoreError;

/// Fixed preparation window added to the creation time of every order.
pub const PREPARATION_WINDOW_HOURS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentType {
    Pickup,
    Delivery,
}

impl FulfillmentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentType::Pickup => "pickup",
            FulfillmentType::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle. Transitions past `Pending` are driven by staff tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether checkout only checks stock or also decrements it.
///
/// `CheckOnly` leaves `products.quantity` untouched, so two checkouts racing
/// for the last unit can both succeed. `Reserve` decrements stock inside the
/// order transaction with a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
    #[default]
    CheckOnly,
    Reserve,
}

impl std::str::FromStr for StockPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check_only" => Ok(StockPolicy::CheckOnly),
            "reserve" => Ok(StockPolicy::Reserve),
            other => Err(CoreError::InvalidValue {
                field: "stock policy",
                value: other.to_string(),
            }),
        }
    }
}

/// One requested cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// The subset of a product row checkout needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// A cart line with its unit price frozen at checkout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total_price: Decimal,
}

impl PricedCart {
    /// Requested quantity per product, summed across repeated lines.
    #[must_use]
    pub fn quantities_by_product(&self) -> Vec<(i64, i32)> {
        let mut totals: Vec<(i64, i32)> = Vec::new();
        for line in &self.lines {
            match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => *qty += line.quantity,
                None => totals.push((line.product_id, line.quantity)),
            }
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("order must contain at least one item")]
    Empty,
    #[error("quantity for product {product_id} must be at least 1, got {quantity}")]
    InvalidQuantity { product_id: i64, quantity: i32 },
    #[error("delivery orders require a delivery address")]
    MissingDeliveryAddress,
    #[error("Product {0} not found")]
    ProductNotFound(i64),
    #[error("Insufficient stock for {name}")]
    InsufficientStock {
        product_id: i64,
        name: String,
        requested: i32,
        available: i32,
    },
}

/// Validate the shape of a checkout request before any product is fetched.
///
/// # Errors
///
/// Returns [`CartError::Empty`], [`CartError::InvalidQuantity`], or
/// [`CartError::MissingDeliveryAddress`].
pub fn validate_checkout(
    items: &[CartLine],
    fulfillment_type: FulfillmentType,
    delivery_address: Option<&str>,
) -> Result<(), CartError> {
    if items.is_empty() {
        return Err(CartError::Empty);
    }
    if let Some(bad) = items.iter().find(|item| item.quantity < 1) {
        return Err(CartError::InvalidQuantity {
            product_id: bad.product_id,
            quantity: bad.quantity,
        });
    }
    if fulfillment_type == FulfillmentType::Delivery
        && delivery_address.is_none_or(|a| a.trim().is_empty())
    {
        return Err(CartError::MissingDeliveryAddress);
    }
    Ok(())
}

/// Check every line against the fetched products and snapshot unit prices.
///
/// Lines are checked in request order. Repeated lines for the same product
/// are checked against their running combined quantity, so the first line
/// that pushes a product past its stock is the one reported.
///
/// # Errors
///
/// Returns [`CartError::ProductNotFound`] or [`CartError::InsufficientStock`]
/// for the first offending line.
pub fn price_cart(items: &[CartLine], products: &[ProductSnapshot]) -> Result<PricedCart, CartError> {
    let by_id: HashMap<i64, &ProductSnapshot> = products.iter().map(|p| (p.id, p)).collect();
    let mut requested: HashMap<i64, i32> = HashMap::new();
    let mut lines = Vec::with_capacity(items.len());
    let mut total_price = Decimal::ZERO;

    for item in items {
        let product = by_id
            .get(&item.product_id)
            .ok_or(CartError::ProductNotFound(item.product_id))?;

        let running = requested.entry(product.id).or_insert(0);
        *running = running.saturating_add(item.quantity);
        if product.quantity < *running {
            return Err(CartError::InsufficientStock {
                product_id: product.id,
                name: product.name.clone(),
                requested: *running,
                available: product.quantity,
            });
        }

        total_price += product.price * Decimal::from(item.quantity);
        lines.push(PricedLine {
            product_id: product.id,
            quantity: item.quantity,
            price_at_purchase: product.price,
        });
    }

    Ok(PricedCart {
        lines,
        total_price: total_price.round_dp(2),
    })
}

/// `ORD-<unix millis>-<4 random digits>`. Uniqueness is best effort; the
/// `orders.order_number` unique constraint is the backstop.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::rng().random_range(0..10_000);
    format!("ORD-{}-{suffix:04}", now.timestamp_millis())
}

#[must_use]
pub fn estimated_ready_time(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(PREPARATION_WINDOW_HOURS)
}

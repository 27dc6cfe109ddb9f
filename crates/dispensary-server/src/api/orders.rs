//! Order handlers. Every route requires a session and only ever exposes the
//! caller's own orders.

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use dispensary_core::{CartError, CartLine, FulfillmentType};
use dispensary_db::{NewOrder, OrderError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{AuthUser, RequestId};

use super::extract::{ApiJson, ApiPath};
use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderRequest {
    pub items: Vec<CartLine>,
    pub fulfillment_type: FulfillmentType,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreatedOrderItem {
    order_id: i64,
    order_number: String,
    total_price: Decimal,
    estimated_ready_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderSummaryItem {
    id: i64,
    order_number: String,
    status: String,
    fulfillment_type: String,
    total_price: Decimal,
    estimated_ready_time: Option<DateTime<Utc>>,
    actual_ready_time: Option<DateTime<Utc>>,
    delivery_address: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<dispensary_db::OrderRow> for OrderSummaryItem {
    fn from(row: dispensary_db::OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            status: row.status,
            fulfillment_type: row.fulfillment_type,
            total_price: row.total_price,
            estimated_ready_time: row.estimated_ready_time,
            actual_ready_time: row.actual_ready_time,
            delivery_address: row.delivery_address,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OrderLineItem {
    id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i32,
    price_at_purchase: Decimal,
}

impl From<dispensary_db::OrderItemRow> for OrderLineItem {
    fn from(row: dispensary_db::OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price_at_purchase: row.price_at_purchase,
        }
    }
}

fn map_order_error(request_id: &str, error: &OrderError) -> ApiError {
    match error {
        OrderError::Cart(
            e @ (CartError::Empty
            | CartError::InvalidQuantity { .. }
            | CartError::MissingDeliveryAddress),
        ) => ApiError::new(request_id, "validation_error", e.to_string()),
        OrderError::Cart(e @ CartError::ProductNotFound(_)) => {
            ApiError::new(request_id, "not_found", e.to_string())
        }
        OrderError::Cart(e @ CartError::InsufficientStock { .. }) => {
            ApiError::new(request_id, "insufficient_stock", e.to_string())
        }
        OrderError::Db(e) => map_db_error(request_id.to_owned(), e),
    }
}

/// Loads an order the caller may see. Other users' orders are reported as
/// missing.
async fn load_own_order(
    state: &AppState,
    request_id: &str,
    order_id: i64,
    user_id: i64,
) -> Result<dispensary_db::OrderRow, ApiError> {
    dispensary_db::get_order_by_id(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .filter(|order| order.user_id == user_id)
        .ok_or_else(|| ApiError::new(request_id, "not_found", "Order not found"))
}

/// POST /api/v1/orders — validate the cart and commit the order atomically.
pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedOrderItem>>), ApiError> {
    let created = dispensary_db::create_order(
        &state.pool,
        NewOrder {
            user_id: user.id,
            items: &body.items,
            fulfillment_type: body.fulfillment_type,
            delivery_address: body.delivery_address.as_deref(),
            notes: body.notes.as_deref(),
        },
        state.stock_policy,
    )
    .await
    .map_err(|e| map_order_error(&req_id.0, &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            CreatedOrderItem {
                order_id: created.order_id,
                order_number: created.order_number,
                total_price: created.total_price,
                estimated_ready_time: created.estimated_ready_time,
            },
            req_id,
        )),
    ))
}

/// GET /api/v1/orders — the caller's orders, newest first.
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<OrderSummaryItem>>>, ApiError> {
    let rows = dispensary_db::list_user_orders(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(OrderSummaryItem::from).collect(),
        req_id,
    )))
}

/// GET /api/v1/orders/{id}
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiPath(order_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<OrderSummaryItem>>, ApiError> {
    let order = load_own_order(&state, &req_id.0, order_id, user.id).await?;
    Ok(Json(ApiResponse::new(OrderSummaryItem::from(order), req_id)))
}

/// GET /api/v1/orders/{id}/items — `403` when the order belongs to someone else.
pub(super) async fn list_order_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiPath(order_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<OrderLineItem>>>, ApiError> {
    let order = dispensary_db::get_order_by_id(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(&req_id.0, "not_found", "Order not found"))?;
    if order.user_id != user.id {
        return Err(ApiError::new(&req_id.0, "forbidden", "Access denied"));
    }

    let rows = dispensary_db::list_order_items(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(OrderLineItem::from).collect(),
        req_id,
    )))
}

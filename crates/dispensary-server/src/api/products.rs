use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use dispensary_core::ProductCategory;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::extract::{ApiPath, ApiQuery};
use super::{map_db_error, ApiError, ApiResponse, AppState};

const MAX_BATCH_IDS: usize = 100;

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    name: String,
    description: Option<String>,
    category: String,
    price: Decimal,
    quantity: i32,
    thc_level: Option<Decimal>,
    cbd_level: Option<Decimal>,
    strain: Option<String>,
    effects: Option<String>,
    image: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<dispensary_db::ProductRow> for ProductItem {
    fn from(row: dispensary_db::ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            quantity: row.quantity,
            thc_level: row.thc_level,
            cbd_level: row.cbd_level,
            strain: row.strain,
            effects: row.effects,
            image: row.image,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BatchQuery {
    pub ids: Option<String>,
}

/// Parses `"1,2,3"` into ids. Blank input yields an empty list.
fn parse_id_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| format!("invalid product id '{s}'")))
        .collect()
}

/// GET /api/v1/products — active products, optionally one category.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(str::parse::<ProductCategory>)
        .transpose()
        .map_err(|e| ApiError::new(&req_id.0, "validation_error", e.to_string()))?;

    let rows = dispensary_db::list_products(&state.pool, category.map(ProductCategory::as_str))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(ProductItem::from).collect(),
        req_id,
    )))
}

/// GET /api/v1/products/batch?ids=1,2 — one query for up to 100 ids.
pub(super) async fn get_products_by_ids(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<BatchQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let ids = parse_id_list(query.ids.as_deref().unwrap_or_default())
        .map_err(|msg| ApiError::new(&req_id.0, "validation_error", msg))?;
    if ids.len() > MAX_BATCH_IDS {
        return Err(ApiError::new(
            &req_id.0,
            "validation_error",
            format!("at most {MAX_BATCH_IDS} ids per request"),
        ));
    }

    let rows = dispensary_db::get_products_by_ids(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(ProductItem::from).collect(),
        req_id,
    )))
}

/// GET /api/v1/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let row = dispensary_db::get_product_by_id(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(&req_id.0, "not_found", format!("Product {id} not found")))?;

    Ok(Json(ApiResponse::new(ProductItem::from(row), req_id)))
}

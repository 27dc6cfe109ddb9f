use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::middleware::{AuthUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct PreferencesItem {
    favorite_products: Vec<i64>,
    preferred_fulfillment_type: Option<String>,
    notification_preferences: serde_json::Value,
}

impl From<dispensary_db::UserPreferenceRow> for PreferencesItem {
    fn from(row: dispensary_db::UserPreferenceRow) -> Self {
        Self {
            favorite_products: row.favorite_products,
            preferred_fulfillment_type: row.preferred_fulfillment_type,
            notification_preferences: row.notification_preferences,
        }
    }
}

/// GET /api/v1/preferences — `data` is `null` until the user saves some.
pub(super) async fn get_preferences(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Option<PreferencesItem>>>, ApiError> {
    let row = dispensary_db::get_user_preferences(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(row.map(PreferencesItem::from), req_id)))
}

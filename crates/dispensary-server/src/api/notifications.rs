use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::{AuthUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct NotificationItem {
    id: i64,
    notification_type: String,
    title: String,
    message: String,
    related_order_id: Option<i64>,
    related_appointment_id: Option<i64>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<dispensary_db::NotificationRow> for NotificationItem {
    fn from(row: dispensary_db::NotificationRow) -> Self {
        Self {
            id: row.id,
            notification_type: row.notification_type,
            title: row.title,
            message: row.message,
            related_order_id: row.related_order_id,
            related_appointment_id: row.related_appointment_id,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

/// GET /api/v1/notifications
pub(super) async fn list_notifications(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<NotificationItem>>>, ApiError> {
    let rows = dispensary_db::list_user_notifications(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(NotificationItem::from).collect(),
        req_id,
    )))
}

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    Extension, Json,
};
use serde::Serialize;

use crate::middleware::{MaybeUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct VerifiedItem {
    success: bool,
}

/// POST /api/v1/age-verification — record a self-attested age check.
///
/// The address stored is the connection's peer address; the request body is
/// not read, so a client-supplied `ip_address` has no effect.
pub(super) async fn verify_age(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<ApiResponse<VerifiedItem>>, ApiError> {
    let ip_address = peer.ip().to_string();
    let user_id = user.as_ref().map(|u| u.id);

    dispensary_db::record_age_verification(&state.pool, user_id, &ip_address)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if let Some(user_id) = user_id {
        dispensary_db::mark_user_age_verified(&state.pool, user_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    }

    tracing::info!(user_id, ip_address = %ip_address, "age verified");

    Ok(Json(ApiResponse::new(VerifiedItem { success: true }, req_id)))
}

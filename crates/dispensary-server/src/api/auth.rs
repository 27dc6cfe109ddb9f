use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;

use crate::middleware::{session_token, MaybeUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    id: i64,
    open_id: String,
    name: Option<String>,
    email: Option<String>,
    role: dispensary_core::UserRole,
    age_verified: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct SuccessItem {
    success: bool,
}

/// GET /api/v1/auth/me — `data` is `null` for anonymous callers.
pub(super) async fn me(
    Extension(req_id): Extension<RequestId>,
    MaybeUser(user): MaybeUser,
) -> Json<ApiResponse<Option<UserItem>>> {
    let data = user.map(|u| UserItem {
        id: u.id,
        open_id: u.open_id,
        name: u.name,
        email: u.email,
        role: u.role,
        age_verified: u.age_verified,
    });
    Json(ApiResponse::new(data, req_id))
}

fn expired_cookie(name: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Lax"
    ))
    .ok()
}

/// POST /api/v1/auth/logout — drops the session row (if any) and expires the
/// session cookie. Always succeeds for anonymous callers.
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = session_token(&headers, &state.sessions.cookie_name) {
        let token_hash = dispensary_core::hash_session_token(&state.sessions.salt, &token);
        let removed = dispensary_db::delete_session(&state.pool, &token_hash)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        tracing::info!(removed, "session logged out");
    }

    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = expired_cookie(&state.sessions.cookie_name) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    Ok((
        response_headers,
        Json(ApiResponse::new(SuccessItem { success: true }, req_id)),
    ))
}

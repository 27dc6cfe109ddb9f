use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use dispensary_core::UserRole;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{map_db_error, ApiError, AppState};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The user behind a valid session, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: UserRole,
    pub age_verified: bool,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<dispensary_db::UserRow> for CurrentUser {
    fn from(row: dispensary_db::UserRow) -> Self {
        let role = row.role.parse().unwrap_or_else(|_| {
            tracing::warn!(user_id = row.id, role = %row.role, "unknown role; treating as user");
            UserRole::User
        });
        Self {
            id: row.id,
            open_id: row.open_id,
            name: row.name,
            email: row.email,
            role,
            age_verified: row.age_verified,
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

pub(crate) fn request_id_of(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<RequestId>()
        .map_or_else(|| "unknown".to_string(), |r| r.0.clone())
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving the session token (bearer header or session cookie)
/// to a [`CurrentUser`] extension. Requests without a valid session pass
/// through anonymously; the route extractors decide whether that is allowed.
pub async fn resolve_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = session_token(req.headers(), &state.sessions.cookie_name) else {
        return next.run(req).await;
    };

    let token_hash = dispensary_core::hash_session_token(&state.sessions.salt, &token);
    match dispensary_db::get_session_user(&state.pool, &token_hash).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser::from(user));
        }
        Ok(None) => tracing::debug!("session token did not resolve to a user"),
        Err(e) => return map_db_error(request_id_of(req.extensions()), &e).into_response(),
    }

    next.run(req).await
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(
            request_id_of(req.extensions()),
            "rate_limited",
            "rate limit exceeded",
        )
        .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

/// Session token from `Authorization: Bearer` or, failing that, the named
/// cookie.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    extract_bearer_token(headers.get(AUTHORIZATION))
        .or_else(|| {
            headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(|v| extract_cookie(v, cookie_name))
        })
        .map(ToOwned::to_owned)
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

fn extract_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Authorization tiers
// ---------------------------------------------------------------------------

/// Any caller; `None` when no session resolved.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

/// A caller with a valid session, else `401 unauthorized`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

/// A caller with the admin role, else `401`/`403`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                ApiError::new(
                    request_id_of(&parts.extensions),
                    "unauthorized",
                    "missing or invalid session",
                )
            })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::new(
                request_id_of(&parts.extensions),
                "forbidden",
                "admin access required",
            ));
        }
        Ok(Self(user))
    }
}

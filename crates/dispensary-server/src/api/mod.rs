mod age_verification;
mod appointments;
mod auth;
mod blog;
mod chat;
mod extract;
mod notifications;
mod orders;
mod preferences;
mod products;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use dispensary_assistant::AssistantClient;
use dispensary_core::StockPolicy;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{enforce_rate_limit, request_id, resolve_session, RateLimitState, RequestId};

/// How session tokens are read and hashed.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub salt: Arc<str>,
    pub cookie_name: Arc<str>,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sessions: SessionSettings,
    pub stock_policy: StockPolicy,
    /// `None` disables chat auto-replies.
    pub assistant: Option<AssistantClient>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: &dispensary_core::AppConfig) -> Self {
        Self {
            pool,
            sessions: SessionSettings {
                salt: Arc::from(config.session_salt.as_str()),
                cookie_name: Arc::from(config.session_cookie_name.as_str()),
            },
            stock_policy: config.stock_policy,
            assistant: None,
        }
    }

    #[must_use]
    pub fn with_assistant(mut self, assistant: Option<AssistantClient>) -> Self {
        self.assistant = assistant;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: RequestId) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id.0),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" | "insufficient_stock" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(crate) fn map_db_error(request_id: String, error: &dispensary_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn api_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route(
            "/api/v1/age-verification",
            post(age_verification::verify_age),
        )
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/products/batch", get(products::get_products_by_ids))
        .route("/api/v1/products/{id}", get(products::get_product))
        .route(
            "/api/v1/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/api/v1/orders/{id}", get(orders::get_order))
        .route("/api/v1/orders/{id}/items", get(orders::list_order_items))
        .route(
            "/api/v1/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/api/v1/appointments/slots",
            get(appointments::list_available_slots),
        )
        .route("/api/v1/blog", get(blog::list_posts))
        .route("/api/v1/blog/{slug}", get(blog::get_post))
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route("/api/v1/preferences", get(preferences::get_preferences))
        .route(
            "/api/v1/chat/conversations",
            get(chat::list_conversations).post(chat::start_conversation),
        )
        .route(
            "/api/v1/chat/conversations/active",
            get(chat::list_active_conversations),
        )
        .route(
            "/api/v1/chat/conversations/{id}/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route(
            "/api/v1/chat/conversations/{id}/assign",
            post(chat::assign_conversation),
        )
        .route(
            "/api/v1/chat/conversations/{id}/close",
            post(chat::close_conversation),
        )
        .route(
            "/api/v1/chat/conversations/{id}/read",
            post(chat::mark_as_read),
        )
        .route("/api/v1/chat/agents/status", put(chat::update_agent_status))
        .route("/api/v1/chat/agents/online", get(chat::list_online_agents))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(api_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    resolve_session,
                )),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match dispensary_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[must_use]
pub fn rate_limit_state(max_requests_per_minute: usize) -> RateLimitState {
    RateLimitState::new(max_requests_per_minute, Duration::from_secs(60))
}

#[cfg(test)]
mod tests;

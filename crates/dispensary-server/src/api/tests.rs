use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request};
use dispensary_assistant::AssistantClient;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const TEST_SALT: &str = "test-salt";
const COOKIE_NAME: &str = "app_session_id";

fn test_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        sessions: SessionSettings {
            salt: Arc::from(TEST_SALT),
            cookie_name: Arc::from(COOKIE_NAME),
        },
        stock_policy: StockPolicy::CheckOnly,
        assistant: None,
    }
}

fn test_app(state: AppState) -> Router {
    build_app(state, rate_limit_state(1_000)).layer(MockConnectInfo(SocketAddr::from((
        [203, 0, 113, 7],
        40_000,
    ))))
}

/// Insert a user plus a live session and return `(user_id, token)`.
async fn seed_session(pool: &PgPool, open_id: &str, role: &str) -> (i64, String) {
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (open_id, name, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(open_id)
    .bind(format!("User {open_id}"))
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("insert user");

    let token = format!("token-{open_id}");
    sqlx::query(
        "INSERT INTO user_sessions (token_hash, user_id, expires_at) \
         VALUES ($1, $2, NOW() + INTERVAL '1 day')",
    )
    .bind(dispensary_core::hash_session_token(TEST_SALT, &token))
    .bind(user_id)
    .execute(pool)
    .await
    .expect("insert session");

    (user_id, token)
}

async fn seed_product(pool: &PgPool, name: &str, price: &str, quantity: i32) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO products (name, category, price, quantity) \
         VALUES ($1, 'flower', $2::numeric, $3) RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(quantity)
    .fetch_one(pool)
    .await
    .expect("insert product")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn send_json(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

// -------------------------------------------------------------------------
// Envelope and error mapping (no DB)
// -------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("insufficient_stock", StatusCode::BAD_REQUEST),
        ("bad_request", StatusCode::BAD_REQUEST),
        ("unauthorized", StatusCode::UNAUTHORIZED),
        ("forbidden", StatusCode::FORBIDDEN),
        ("not_found", StatusCode::NOT_FOUND),
        ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "msg").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[test]
fn map_db_error_hides_details() {
    let err = map_db_error("req-1".to_string(), &dispensary_db::DbError::NotFound);
    assert_eq!(err.error.code, "internal_error");
    assert_eq!(err.error.message, "database query failed");
}

// -------------------------------------------------------------------------
// Health, auth, rate limiting
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok(pool: sqlx::PgPool) {
    let (status, json) = call(test_app(test_state(pool)), get("/api/v1/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["database"], "ok");
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn auth_me_resolves_cookie_and_bearer_sessions(pool: sqlx::PgPool) {
    let (user_id, token) = seed_session(&pool, "me-user", "user").await;
    let app = test_app(test_state(pool));

    let (status, json) = call(app.clone(), get("/api/v1/auth/me", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].is_null());

    let (_, json) = call(app.clone(), get("/api/v1/auth/me", Some(&token))).await;
    assert_eq!(json["data"]["id"].as_i64(), Some(user_id));
    assert_eq!(json["data"]["role"], "user");

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, format!("{COOKIE_NAME}={token}"))
        .body(Body::empty())
        .expect("request");
    let (_, json) = call(app, request).await;
    assert_eq!(json["data"]["id"].as_i64(), Some(user_id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn logout_deletes_session_and_expires_cookie(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "leaver", "user").await;
    let app = test_app(test_state(pool.clone()));

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/auth/logout",
            Some(&token),
            &serde_json::json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header");
    assert!(cookie.starts_with("app_session_id=;"));

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let (status, _) = call(app, get("/api/v1/orders", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_a_session(pool: sqlx::PgPool) {
    let app = test_app(test_state(pool));

    for uri in [
        "/api/v1/orders",
        "/api/v1/appointments",
        "/api/v1/notifications",
        "/api/v1/preferences",
        "/api/v1/chat/conversations",
    ] {
        let (status, json) = call(app.clone(), get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(json["error"]["code"], "unauthorized");
    }

    let (status, _) = call(app, get("/api/v1/orders", Some("bogus-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rate_limit_rejects_requests_over_window(pool: sqlx::PgPool) {
    let app = build_app(test_state(pool), rate_limit_state(1));

    let (first, _) = call(app.clone(), get("/api/v1/blog", None)).await;
    assert_eq!(first, StatusCode::OK);

    let (second, json) = call(app, get("/api/v1/blog", None)).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

// -------------------------------------------------------------------------
// Catalog
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn products_list_validates_category(pool: sqlx::PgPool) {
    seed_product(&pool, "Blue Dream", "35.00", 4).await;
    let app = test_app(test_state(pool));

    let (status, json) = call(app.clone(), get("/api/v1/products?category=flower", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["price"], "35.00");

    let (status, json) = call(app, get("/api/v1/products?category=seeds", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn products_batch_and_detail(pool: sqlx::PgPool) {
    let a = seed_product(&pool, "A", "1.00", 1).await;
    let b = seed_product(&pool, "B", "2.00", 1).await;
    let app = test_app(test_state(pool));

    let (status, json) = call(
        app.clone(),
        get(&format!("/api/v1/products/batch?ids={a},{b}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(2));

    let too_many = (1..=101).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
    let (status, _) = call(
        app.clone(),
        get(&format!("/api/v1/products/batch?ids={too_many}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app, get("/api/v1/products/987654", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -------------------------------------------------------------------------
// Orders
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_order_returns_totals_and_snapshots(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "buyer", "user").await;
    let p1 = seed_product(&pool, "Pre-roll", "10.00", 5).await;
    let p2 = seed_product(&pool, "Tincture", "20.00", 5).await;
    let app = test_app(test_state(pool));

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/orders",
            Some(&token),
            &serde_json::json!({
                "items": [
                    { "product_id": p1, "quantity": 2 },
                    { "product_id": p2, "quantity": 1 }
                ],
                "fulfillment_type": "pickup"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["total_price"], "40.00");
    let order_id = json["data"]["order_id"].as_i64().expect("order id");
    assert!(json["data"]["order_number"]
        .as_str()
        .is_some_and(|n| n.starts_with("ORD-")));

    let (status, json) = call(
        app,
        get(&format!("/api/v1/orders/{order_id}/items"), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let prices: Vec<&str> = json["data"]
        .as_array()
        .expect("items array")
        .iter()
        .filter_map(|i| i["price_at_purchase"].as_str())
        .collect();
    assert_eq!(prices, vec!["10.00", "20.00"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_order_reports_stock_and_missing_products(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "buyer", "user").await;
    let p1 = seed_product(&pool, "Rosin", "60.00", 1).await;
    let app = test_app(test_state(pool.clone()));

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/orders",
            Some(&token),
            &serde_json::json!({
                "items": [{ "product_id": p1, "quantity": 2 }],
                "fulfillment_type": "pickup"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "insufficient_stock");
    assert_eq!(json["error"]["message"], "Insufficient stock for Rosin");

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/orders",
            Some(&token),
            &serde_json::json!({
                "items": [{ "product_id": 555_555, "quantity": 1 }],
                "fulfillment_type": "pickup"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Product 555555 not found");

    let (status, json) = call(
        app,
        send_json(
            "POST",
            "/api/v1/orders",
            Some(&token),
            &serde_json::json!({
                "items": [{ "product_id": p1, "quantity": 1 }],
                "fulfillment_type": "delivery"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_input_uses_error_envelope(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "sloppy", "user").await;
    let p1 = seed_product(&pool, "Shake", "5.00", 10).await;
    let app = test_app(test_state(pool.clone()));

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/orders",
            Some(&token),
            &serde_json::json!({
                "items": [{ "product_id": p1, "quantity": 1 }],
                "fulfillment_type": "drone"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(
        json["error"]["message"],
        "request body does not match the expected shape"
    );
    assert!(json["meta"]["request_id"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/orders")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"items\": ["))
        .expect("request");
    let (status, json) = call(app.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "request body is not valid JSON");

    let (status, json) = call(app.clone(), get("/api/v1/orders/abc", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(json["error"]["message"], "invalid path parameter");

    let (status, json) = call(app.clone(), get("/api/v1/products/not-a-number", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let convo = start_conversation(&app, &token).await;
    let (status, json) = call(
        app,
        get(
            &format!("/api/v1/chat/conversations/{convo}/messages?after_id=latest"),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "invalid query parameters");

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn orders_are_private_to_their_owner(pool: sqlx::PgPool) {
    let (_, owner_token) = seed_session(&pool, "owner", "user").await;
    let (_, other_token) = seed_session(&pool, "other", "user").await;
    let p1 = seed_product(&pool, "Balm", "15.00", 10).await;
    let app = test_app(test_state(pool));

    let (_, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/orders",
            Some(&owner_token),
            &serde_json::json!({
                "items": [{ "product_id": p1, "quantity": 1 }],
                "fulfillment_type": "pickup"
            }),
        ),
    )
    .await;
    let order_id = json["data"]["order_id"].as_i64().expect("order id");

    let (status, _) = call(
        app.clone(),
        get(&format!("/api/v1/orders/{order_id}"), Some(&other_token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = call(
        app.clone(),
        get(&format!("/api/v1/orders/{order_id}/items"), Some(&other_token)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");

    let (_, json) = call(app, get("/api/v1/orders", Some(&other_token))).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
}

// -------------------------------------------------------------------------
// Age gate and appointments
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn age_verification_uses_connection_ip(pool: sqlx::PgPool) {
    let (user_id, token) = seed_session(&pool, "adult", "user").await;
    let app = test_app(test_state(pool.clone()));

    let (status, json) = call(
        app,
        send_json(
            "POST",
            "/api/v1/age-verification",
            Some(&token),
            &serde_json::json!({ "ip_address": "6.6.6.6" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["success"], true);

    let ip: String = sqlx::query_scalar("SELECT ip_address FROM age_verifications")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(ip, "203.0.113.7");

    let verified: bool = sqlx::query_scalar("SELECT age_verified FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(verified);
}

#[sqlx::test(migrations = "../../migrations")]
async fn appointments_reject_past_times_and_list_slots(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "patient", "user").await;
    let app = test_app(test_state(pool));

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/appointments",
            Some(&token),
            &serde_json::json!({ "appointment_time": "2020-01-01T10:00:00Z" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let future = (Utc::now() + chrono::Duration::days(7)).to_rfc3339();
    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/appointments",
            Some(&token),
            &serde_json::json!({
                "appointment_time": future,
                "consultation_type": "product_recommendation"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "scheduled");
    assert_eq!(json["data"]["duration_minutes"], 30);

    let (status, json) = call(app.clone(), get("/api/v1/appointments/slots?date=2026-04-20", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["slots"].as_array().map(Vec::len), Some(8));

    let (status, _) = call(app, get("/api/v1/appointments/slots?date=tomorrow", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -------------------------------------------------------------------------
// Chat
// -------------------------------------------------------------------------

async fn start_conversation(app: &Router, token: &str) -> i64 {
    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            "/api/v1/chat/conversations",
            Some(token),
            &serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["data"]["id"].as_i64().expect("conversation id")
}

fn message_body(text: &str) -> serde_json::Value {
    serde_json::json!({ "message": text })
}

#[sqlx::test(migrations = "../../migrations")]
async fn start_conversation_is_idempotent(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "chatter", "user").await;
    let app = test_app(test_state(pool));

    let first = start_conversation(&app, &token).await;
    let second = start_conversation(&app, &token).await;
    assert_eq!(first, second);
}

#[sqlx::test(migrations = "../../migrations")]
async fn conversation_access_is_owner_or_admin(pool: sqlx::PgPool) {
    let (_, owner) = seed_session(&pool, "owner", "user").await;
    let (_, stranger) = seed_session(&pool, "stranger", "user").await;
    let (admin_id, admin) = seed_session(&pool, "admin", "admin").await;
    let app = test_app(test_state(pool));

    let convo = start_conversation(&app, &owner).await;
    let messages_uri = format!("/api/v1/chat/conversations/{convo}/messages");

    let (status, _) = call(app.clone(), get(&messages_uri, Some(&stranger))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        app.clone(),
        send_json("POST", &messages_uri, Some(&stranger), &message_body("hi")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = call(
        app.clone(),
        send_json("POST", &messages_uri, Some(&admin), &message_body("How can I help?")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["message"]["sender_type"], "agent");
    assert_eq!(json["data"]["message"]["sender_id"].as_i64(), Some(admin_id));
    // Agents never trigger the assistant.
    assert!(json["data"]["auto_reply"].is_null());

    let (status, json) = call(app.clone(), get(&messages_uri, Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));

    let (status, _) = call(
        app,
        get("/api/v1/chat/conversations/999999/messages", Some(&owner)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn messages_poll_with_after_id(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "poller", "user").await;
    let app = test_app(test_state(pool));
    let convo = start_conversation(&app, &token).await;
    let uri = format!("/api/v1/chat/conversations/{convo}/messages");

    let (_, first) = call(
        app.clone(),
        send_json("POST", &uri, Some(&token), &message_body("first")),
    )
    .await;
    call(
        app.clone(),
        send_json("POST", &uri, Some(&token), &message_body("second")),
    )
    .await;
    let first_id = first["data"]["message_id"].as_i64().expect("message id");

    let (_, json) = call(
        app.clone(),
        get(&format!("{uri}?after_id={first_id}"), Some(&token)),
    )
    .await;
    let texts: Vec<&str> = json["data"]
        .as_array()
        .expect("messages")
        .iter()
        .filter_map(|m| m["message"].as_str())
        .collect();
    assert_eq!(texts, vec!["second"]);

    let (status, json) = call(
        app,
        send_json("POST", &uri, Some(&token), &message_body("   ")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn messages_are_stored_as_sent(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "spacer", "user").await;
    let app = test_app(test_state(pool));
    let convo = start_conversation(&app, &token).await;
    let uri = format!("/api/v1/chat/conversations/{convo}/messages");

    let (status, json) = call(
        app,
        send_json("POST", &uri, Some(&token), &message_body("  hello there\n")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["message"]["message"], "  hello there\n");
}

#[sqlx::test(migrations = "../../migrations")]
async fn recommendation_request_gets_assistant_reply(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Try Granddaddy Purple." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, token) = seed_session(&pool, "shopper", "user").await;
    let assistant =
        AssistantClient::with_base_url(None, "test-model", 5, &server.uri()).expect("client");
    let app = test_app(test_state(pool).with_assistant(Some(assistant)));
    let convo = start_conversation(&app, &token).await;
    let uri = format!("/api/v1/chat/conversations/{convo}/messages");

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            &uri,
            Some(&token),
            &message_body("Can you RECOMMEND something for sleep?"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["message"]["sender_type"], "customer");
    assert_eq!(json["data"]["auto_reply"]["sender_id"].as_i64(), Some(0));
    assert_eq!(
        json["data"]["auto_reply"]["message"],
        "Try Granddaddy Purple."
    );

    let (_, json) = call(app, get(&uri, Some(&token))).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn assistant_failure_keeps_customer_message(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_, token) = seed_session(&pool, "shopper", "user").await;
    let assistant =
        AssistantClient::with_base_url(None, "test-model", 5, &server.uri()).expect("client");
    let app = test_app(test_state(pool).with_assistant(Some(assistant)));
    let convo = start_conversation(&app, &token).await;
    let uri = format!("/api/v1/chat/conversations/{convo}/messages");

    let (status, json) = call(
        app.clone(),
        send_json("POST", &uri, Some(&token), &message_body("any product suggestions?")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["data"]["auto_reply"].is_null());

    let (_, json) = call(app, get(&uri, Some(&token))).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn closed_conversations_reject_messages_and_reclose(pool: sqlx::PgPool) {
    let (_, token) = seed_session(&pool, "closer", "user").await;
    let app = test_app(test_state(pool));
    let convo = start_conversation(&app, &token).await;
    let close_uri = format!("/api/v1/chat/conversations/{convo}/close");

    let (status, _) = call(
        app.clone(),
        send_json("POST", &close_uri, Some(&token), &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(
        app.clone(),
        send_json(
            "POST",
            &format!("/api/v1/chat/conversations/{convo}/messages"),
            Some(&token),
            &message_body("hello?"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");

    let (status, _) = call(
        app.clone(),
        send_json("POST", &close_uri, Some(&token), &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A fresh conversation can start once the old one is closed.
    let next = start_conversation(&app, &token).await;
    assert_ne!(next, convo);
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_console_lists_and_assigns(pool: sqlx::PgPool) {
    let (_, customer) = seed_session(&pool, "customer", "user").await;
    let (admin_id, admin) = seed_session(&pool, "agent", "admin").await;
    let app = test_app(test_state(pool));
    let convo = start_conversation(&app, &customer).await;

    let (status, _) = call(
        app.clone(),
        get("/api/v1/chat/conversations/active", Some(&customer)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = call(
        app.clone(),
        get("/api/v1/chat/conversations/active", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["id"].as_i64(), Some(convo));

    let (status, json) = call(
        app,
        send_json(
            "POST",
            &format!("/api/v1/chat/conversations/{convo}/assign"),
            Some(&admin),
            &serde_json::json!({ "agent_id": admin_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "active");
    assert_eq!(json["data"]["agent_id"].as_i64(), Some(admin_id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn agent_presence_round_trip(pool: sqlx::PgPool) {
    let (agent_user, agent) = seed_session(&pool, "agent", "admin").await;
    let (_, plain) = seed_session(&pool, "plain", "user").await;
    sqlx::query("INSERT INTO chat_agents (user_id, display_name) VALUES ($1, 'Sam')")
        .bind(agent_user)
        .execute(&pool)
        .await
        .unwrap();
    let app = test_app(test_state(pool));

    let (status, json) = call(
        app.clone(),
        send_json(
            "PUT",
            "/api/v1/chat/agents/status",
            Some(&agent),
            &serde_json::json!({ "status": "online" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "online");

    let (_, json) = call(app.clone(), get("/api/v1/chat/agents/online", None)).await;
    assert_eq!(json["data"][0]["display_name"], "Sam");

    let (status, _) = call(
        app,
        send_json(
            "PUT",
            "/api/v1/chat/agents/status",
            Some(&plain),
            &serde_json::json!({ "status": "away" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

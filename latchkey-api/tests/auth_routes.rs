/// HTTP tests for the authentication routes
///
/// The router is driven in-process over the in-memory store.
/// Run with: cargo test --test auth_routes

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use latchkey_api::{
    app::{build_router, AppState},
    config::{ApiConfig, Config, DatabaseConfig, JwtConfig},
};
use latchkey_shared::store::MemoryStore;
use serde_json::{json, Value};
use tower::Service;

const SECRET: &str = "route-test-secret-that-is-long-enough";

fn config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            enable_hsts: false,
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
            statement_timeout_seconds: 5,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
    }
}

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let router = build_router(AppState::new(store.clone(), config()));
    (router, store)
}

async fn send(app: &mut Router, request: Request<Body>) -> (StatusCode, Response) {
    let response = app.call(request).await.unwrap();
    (response.status(), response)
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn register_ada(app: &mut Router) -> Value {
    let (status, response) = send(
        app,
        post(
            "/v1/auth/register",
            json!({"email": "ada@example.com", "password": "Secret123!", "name": "Ada"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_health_reports_connected_store() {
    let (mut app, _) = app();

    let (status, response) = send(
        &mut app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_register_returns_session() {
    let (mut app, store) = app();

    let (status, response) = send(
        &mut app,
        post(
            "/v1/auth/register",
            json!({"email": "Ada@Example.com", "password": "Secret123!", "name": "Ada"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["account"]["slug"], "ada-s-account");
    assert_eq!(body["account"]["plan"], "free");
    assert_eq!(body["role"], "owner");
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 1800);
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(store.count_users(), 1);
}

#[tokio::test]
async fn test_register_duplicate_email_is_unprocessable() {
    let (mut app, store) = app();
    register_ada(&mut app).await;

    let (status, response) = send(
        &mut app,
        post(
            "/v1/auth/register",
            json!({"email": "ada@example.com", "password": "Secret123!", "name": "Ada"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"], json!(["Email has already been taken"]));
    assert_eq!(store.count_users(), 1);
    assert_eq!(store.count_accounts(), 1);
}

#[tokio::test]
async fn test_register_missing_fields_is_unprocessable() {
    let (mut app, store) = app();

    let (status, response) = send(&mut app, post("/v1/auth/register", json!({}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    let details = body["details"].as_array().unwrap();
    assert!(details.iter().any(|m| m == "Email can't be blank"));
    assert_eq!(store.count_users(), 0);
}

#[tokio::test]
async fn test_register_overlong_name_is_unprocessable() {
    let (mut app, store) = app();

    let (status, response) = send(
        &mut app,
        post(
            "/v1/auth/register",
            json!({
                "email": "ada@example.com",
                "password": "Secret123!",
                "name": "Ada",
                "account_name": "x".repeat(300),
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["details"],
        json!(["Name is too long (maximum is 255 characters)"])
    );
    assert_eq!(store.count_users(), 0);
}

#[tokio::test]
async fn test_login_records_device() {
    let (app, store) = app();
    let mut app = app.layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 9], 52100))));
    register_ada(&mut app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "Mozilla/5.0 (X11; Linux x86_64)")
        .body(Body::from(
            json!({"email": "ada@example.com", "password": "Secret123!"}).to_string(),
        ))
        .unwrap();
    let (status, response) = send(&mut app, request).await;

    assert_eq!(status, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["account"]["name"], "Ada's Account");
    assert_eq!(body["role"], "owner");

    let devices: Vec<_> = store
        .refresh_tokens_for(1)
        .into_iter()
        .map(|token| token.device_info.0)
        .collect();
    assert!(devices.iter().any(|device| {
        device.ip_address.as_deref() == Some("203.0.113.9")
            && device.user_agent.as_deref() == Some("Mozilla/5.0 (X11; Linux x86_64)")
    }));
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let (mut app, store) = app();
    register_ada(&mut app).await;

    let (status, response) = send(
        &mut app,
        post(
            "/v1/auth/login",
            json!({"email": "ada@example.com", "password": "Wrong123!"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid email or password");
    assert_eq!(store.count_refresh_tokens(), 1);
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let (mut app, _) = app();
    let session = register_ada(&mut app).await;
    let original = session["refresh_token"].clone();

    let (status, response) = send(
        &mut app,
        post("/v1/auth/refresh", json!({ "refresh_token": original })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_ne!(body["refresh_token"], original);

    let (status, response) = send(
        &mut app,
        post("/v1/auth/refresh", json!({ "refresh_token": original })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Token revoked");
}

#[tokio::test]
async fn test_refresh_unknown_token_is_unauthorized() {
    let (mut app, _) = app();

    let (status, response) = send(
        &mut app,
        post("/v1/auth/refresh", json!({"refresh_token": "nope"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid refresh token");
}

#[tokio::test]
async fn test_logout() {
    let (mut app, _) = app();
    let session = register_ada(&mut app).await;
    let token = session["refresh_token"].clone();

    for _ in 0..2 {
        let (status, _) = send(
            &mut app,
            post("/v1/auth/logout", json!({ "refresh_token": token })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, response) = send(
        &mut app,
        post("/v1/auth/refresh", json!({ "refresh_token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Token revoked");
}

#[tokio::test]
async fn test_logout_unknown_token_is_bad_request() {
    let (mut app, _) = app();

    let (status, response) = send(
        &mut app,
        post("/v1/auth/logout", json!({"refresh_token": "nope"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Invalid refresh token");
}

#[tokio::test]
async fn test_me_requires_access_token() {
    let (mut app, _) = app();
    let session = register_ada(&mut app).await;
    let access_token = session["access_token"].as_str().unwrap().to_string();

    let (status, response) = send(
        &mut app,
        Request::builder()
            .uri("/v1/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let claims = body_json(response).await;
    assert_eq!(claims["email"], "ada@example.com");
    assert_eq!(claims["role"], "owner");
    assert_eq!(claims["sub"], session["user"]["id"]);

    let (status, _) = send(
        &mut app,
        Request::builder().uri("/v1/auth/me").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, response) = send(
        &mut app,
        Request::builder()
            .uri("/v1/auth/me")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid token");
}

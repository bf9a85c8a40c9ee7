//! Password-change flow against a stand-in session service.

use std::sync::{Arc, Mutex};

use accountd::config::Config;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::post,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

type SeenCalls = Arc<Mutex<Vec<serde_json::Value>>>;

/// Spawn a fake session-invalidation service on an ephemeral port. Records
/// every request body and answers with the given status/message.
async fn spawn_session_service(status: StatusCode, message: &'static str) -> (String, SeenCalls) {
    let seen: SeenCalls = Arc::new(Mutex::new(Vec::new()));

    async fn invalidate(
        State((seen, status, message)): State<(SeenCalls, StatusCode, &'static str)>,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        seen.lock().unwrap().push(body);
        (status, Json(serde_json::json!({"content": message})))
    }

    let app = Router::new()
        .route("/internal/delete_sessions", post(invalidate))
        .with_state((seen.clone(), status, message));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/internal/delete_sessions"), seen)
}

async fn spawn_app(invalidate_url: String) -> Router {
    let db_path = std::env::temp_dir().join(format!("accountd-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_url = format!("sqlite:{}", db_path.display());
    config.sessions.invalidate_url = invalidate_url;
    config.security.argon2_memory_cost_kib = 64;
    config.security.argon2_time_cost = 1;

    let state = accountd::api::create_app_state_from_config(config)
        .await
        .expect("Failed to create app state");
    accountd::api::router(state)
}

async fn post_json(
    app: &Router,
    uri: &str,
    headers: &[(&str, String)],
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Register an account and return (id, identity headers) for it.
async fn register_ivan(app: &Router) -> (i64, Vec<(&'static str, String)>) {
    let (status, _) = post_json(
        app,
        "/register",
        &[],
        serde_json::json!({"login": "ivan", "password": "old-password", "name": "Ivan"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = post_json(
        app,
        "/verify_account",
        &[],
        serde_json::json!({"login": "ivan", "password": "old-password"}),
    )
    .await;
    let id = body["account_id"].as_i64().unwrap();

    let headers = vec![
        ("x-auth-account-id", id.to_string()),
        ("x-auth-session-id", "sess-777".to_string()),
        ("x-auth-account-role", "user".to_string()),
        ("x-auth-login-time", "2026-08-30T10:00:00Z".to_string()),
        ("x-auth-client", "web".to_string()),
    ];

    (id, headers)
}

async fn verify_password_status(app: &Router, password: &str) -> StatusCode {
    let (status, _) = post_json(
        app,
        "/verify_account",
        &[],
        serde_json::json!({"login": "ivan", "password": password}),
    )
    .await;
    status
}

#[tokio::test]
async fn wrong_old_password_leaves_hash_unchanged() {
    let (url, seen) = spawn_session_service(StatusCode::OK, "ok").await;
    let app = spawn_app(url).await;
    let (_, headers) = register_ivan(&app).await;

    let (status, body) = post_json(
        &app,
        "/change_password",
        &headers,
        serde_json::json!({"old_password": "wrong", "new_password": "brand-new"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["content"], "Incorrect password");

    // No invalidation happened and the old password still verifies
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(verify_password_status(&app, "old-password").await, StatusCode::OK);
    assert_eq!(
        verify_password_status(&app, "brand-new").await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn equal_old_and_new_passwords_conflict() {
    let (url, seen) = spawn_session_service(StatusCode::OK, "ok").await;
    let app = spawn_app(url).await;
    let (_, headers) = register_ivan(&app).await;

    // Old password is correct here; the conflict is about reuse
    let (status, body) = post_json(
        &app,
        "/change_password",
        &headers,
        serde_json::json!({"old_password": "old-password", "new_password": "old-password"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["content"], "Old and new passwords are equal");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn successful_change_invalidates_sessions_then_updates_hash() {
    let (url, seen) = spawn_session_service(StatusCode::OK, "sessions deleted").await;
    let app = spawn_app(url).await;
    let (id, headers) = register_ivan(&app).await;

    let (status, body) = post_json(
        &app,
        "/change_password",
        &headers,
        serde_json::json!({"old_password": "old-password", "new_password": "brand-new"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Successfully changed password");

    // The auth service was told which sessions to revoke
    let calls = seen.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["account_id"].as_i64().unwrap(), id);
    assert_eq!(calls[0]["session_id"], "sess-777");

    assert_eq!(verify_password_status(&app, "brand-new").await, StatusCode::OK);
    assert_eq!(
        verify_password_status(&app, "old-password").await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn session_service_refusal_is_forwarded_verbatim() {
    let (url, seen) = spawn_session_service(StatusCode::SERVICE_UNAVAILABLE, "sessions offline").await;
    let app = spawn_app(url).await;
    let (_, headers) = register_ivan(&app).await;

    let (status, body) = post_json(
        &app,
        "/change_password",
        &headers,
        serde_json::json!({"old_password": "old-password", "new_password": "brand-new"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["content"], "sessions offline");

    // Hash was not touched
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(verify_password_status(&app, "old-password").await, StatusCode::OK);
}

#[tokio::test]
async fn change_password_requires_identity_headers() {
    let (url, _) = spawn_session_service(StatusCode::OK, "ok").await;
    let app = spawn_app(url).await;

    let (status, _) = post_json(
        &app,
        "/change_password",
        &[],
        serde_json::json!({"old_password": "a", "new_password": "b"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

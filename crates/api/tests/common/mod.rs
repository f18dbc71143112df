#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use revwiki_core::memory::MemoryRepository;
use revwiki_core::revision_store::{RevisionStore, RevisionStoreConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

use jsonwebtoken::{encode, EncodingKey, Header};
use revwiki_api::auth::jwt::{Claims, JwtConfig};
use revwiki_api::config::{ServerConfig, DEFAULT_DIFF_CONTEXT};
use revwiki_api::router::build_app_router;
use revwiki_api::state::AppState;

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        db_max_connections: 1,
        store: RevisionStoreConfig {
            snapshot_threshold: 3,
            ..RevisionStoreConfig::default()
        },
        default_diff_context: DEFAULT_DIFF_CONTEXT,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        },
    }
}

/// Full application router over a fresh in-memory repository with two
/// known authors. The router is `Clone`; clones share the same storage.
pub async fn build_test_app() -> Router {
    let config = test_config();
    let repo = Arc::new(MemoryRepository::new());
    repo.insert_user(ALICE, "alice").await;
    repo.insert_user(BOB, "bob").await;

    let store = RevisionStore::new(repo, config.store).unwrap();
    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Sign a token the way the identity service does.
pub fn sign_token(user_id: i64, expires_in_secs: i64) -> String {
    let claims = Claims {
        sub: user_id,
        exp: chrono::Utc::now().timestamp() + expires_in_secs,
    };
    let secret = test_config().jwt.secret;
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// `Authorization` header value for `user_id`.
pub fn auth_header(user_id: i64) -> String {
    format!("Bearer {}", sign_token(user_id, 900))
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body, optionally with an `Authorization` header value.
pub async fn post_json(app: Router, uri: &str, body: Value, auth: Option<&str>) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(AUTHORIZATION, auth);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A document with one paragraph per entry.
pub fn doc(paragraphs: &[&str]) -> Value {
    let content: Vec<Value> = paragraphs
        .iter()
        .map(|p| json!({"type": "paragraph", "content": [{"type": "text", "text": p}]}))
        .collect();
    json!({"type": "doc", "content": content})
}

/// Save `paragraphs` as `title` on behalf of `user_id`; returns the `data` payload.
pub async fn save(app: &Router, title: &str, paragraphs: &[&str], user_id: i64) -> Value {
    let auth = auth_header(user_id);
    let response = post_json(
        app.clone(),
        "/api/v1/pages",
        json!({"title": title, "content": doc(paragraphs), "summary": "edit"}),
        Some(&auth),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use chrono::Utc;
use nutrilog_sync::config::Config;
use nutrilog_sync::db::PostgrestDb;
use nutrilog_sync::routes::create_router;
use nutrilog_sync::services::{FitbitClient, FitbitService, SyncService};
use nutrilog_sync::AppState;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use wiremock::MockServer;

/// Everything a test needs: the router plus the two mocked upstreams.
pub struct TestApp {
    pub router: axum::Router,
    /// Stubbed Supabase REST endpoint
    pub store: MockServer,
    /// Stubbed Fitbit API and token endpoints
    pub fitbit: MockServer,
    pub jwt_secret: Vec<u8>,
    pub app_url: String,
}

/// Spin up the service against two fresh stub servers.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let store = MockServer::start().await;
    let fitbit = MockServer::start().await;

    let mut config = Config::test_default();
    config.supabase_url = store.uri();

    let jwt_secret = config.supabase_jwt_secret.clone();
    let app_url = config.app_url.clone();

    let db = PostgrestDb::new(&config.supabase_url, &config.supabase_service_role_key);
    let client = FitbitClient::with_endpoints(
        config.fitbit_client_id.clone(),
        fitbit.uri(),
        format!("{}/oauth2/authorize", fitbit.uri()),
        format!("{}/oauth2/token", fitbit.uri()),
    );
    let fitbit_service = FitbitService::new(client, db.clone());
    let sync = SyncService::new(db.clone(), fitbit_service.clone());

    let state = Arc::new(AppState {
        config,
        db,
        fitbit: fitbit_service,
        sync,
    });

    TestApp {
        router: create_router(state),
        store,
        fitbit,
        jwt_secret,
        app_url,
    }
}

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Mint a token the way the identity service would.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: Uuid, secret: &[u8]) -> String {
    let now = Utc::now().timestamp();
    let claims = TestClaims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )
    .expect("Failed to encode test JWT")
}

/// Fixed user for request-shape assertions.
#[allow(dead_code)]
pub fn test_user_id() -> Uuid {
    Uuid::parse_str("7ae4b8f2-1f4b-4f0e-9fd1-3a2b1c4d5e6f").unwrap()
}

/// Authenticated POST with an empty body.
#[allow(dead_code)]
pub fn authed_post(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body was not JSON")
}

/// Read a response body as raw text.
#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    String::from_utf8_lossy(&bytes).to_string()
}

/// Connection row shaped the way the store returns it.
#[allow(dead_code)]
pub fn connection_row(user_id: Uuid, last_steps_sync_at: Option<&str>) -> Value {
    json!({
        "user_id": user_id,
        "provider_user_id": "FITBIT123",
        "status": "connected",
        "last_sync_at": null,
        "last_steps_sync_at": last_steps_sync_at,
        "last_error_message": null,
    })
}

/// Token row shaped the way the store returns it.
#[allow(dead_code)]
pub fn token_row(user_id: Uuid, expires_at: &str) -> Value {
    json!({
        "user_id": user_id,
        "access_token": "stored-access-token",
        "refresh_token": "stored-refresh-token",
        "expires_at": expires_at,
    })
}

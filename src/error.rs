// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Error strings end up in `last_error_message` and response `detail`
/// fields, so they must never embed tokens or code verifiers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No Fitbit connection for this user")]
    NotConnected,

    #[error("Steps sync attempted again too soon")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Fitbit connection exists but no stored tokens")]
    MissingTokens,

    #[error("Fitbit credentials are no longer valid")]
    Unauthorized,

    #[error("Fitbit token was not granted the activity scope")]
    InsufficientScope,

    #[error("Fitbit API returned HTTP {0}")]
    FetchFailed(u16),

    #[error("Failed to start Fitbit authorization: {0}")]
    StartFailed(String),

    #[error("Steps sync failed: {0}")]
    SyncFailed(String),

    #[error("Store error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Re-wrap infrastructure failures as the start operation's catch-all.
    ///
    /// Typed flow errors pass through untouched so their status codes and
    /// payload fields survive.
    pub fn into_start_failure(self) -> AppError {
        match self {
            AppError::Database(msg) => AppError::StartFailed(msg),
            AppError::Internal(err) => AppError::StartFailed(err.to_string()),
            other => other,
        }
    }

    /// Re-wrap infrastructure failures as the sync operation's catch-all.
    pub fn into_sync_failure(self) -> AppError {
        match self {
            AppError::Database(msg) => AppError::SyncFailed(msg),
            AppError::Internal(err) => AppError::SyncFailed(err.to_string()),
            other => other,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut detail = None;
        let mut retry_after = None;
        let mut upstream_status = None;

        let (status, error) = match &self {
            AppError::NotConnected => (StatusCode::NOT_FOUND, "NOT_CONNECTED"),
            AppError::RateLimited {
                retry_after_seconds,
            } => {
                retry_after = Some(*retry_after_seconds);
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT")
            }
            AppError::MissingTokens => (StatusCode::UNAUTHORIZED, "MISSING_TOKENS"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::InsufficientScope => (StatusCode::FORBIDDEN, "INSUFFICIENT_SCOPE"),
            AppError::FetchFailed(code) => {
                upstream_status = Some(*code);
                (StatusCode::BAD_GATEWAY, "FITBIT_FETCH_FAILED")
            }
            AppError::StartFailed(msg) => {
                detail = Some(msg.clone());
                (StatusCode::BAD_REQUEST, "FITBIT_START_FAILED")
            }
            AppError::SyncFailed(msg) => {
                detail = Some(msg.clone());
                (StatusCode::BAD_REQUEST, "FITBIT_SYNC_STEPS_FAILED")
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            detail,
            retry_after_seconds: retry_after,
            status: upstream_status,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

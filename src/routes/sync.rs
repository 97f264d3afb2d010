// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Steps sync endpoint.

use axum::{extract::State, routing::post, Extension, Json, Router};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::SyncOutcome;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/fitbit-sync-steps", post(sync_steps))
}

/// Sync the trailing week of step counts for the authenticated user.
///
/// The orchestration lives in [`crate::services::sync::SyncService`];
/// this handler only maps unexpected failures into the endpoint's
/// catch-all error shape.
async fn sync_steps(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncOutcome>> {
    let outcome = state
        .sync
        .sync_steps(user.user_id)
        .await
        .map_err(AppError::into_sync_failure)?;

    Ok(Json(outcome))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit connect flow: authorization start and OAuth callback.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Connection, OAuthSession};
use crate::services::pkce;
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339};
use crate::AppState;

/// How long a pending authorization session stays redeemable.
const SESSION_TTL_MINUTES: i64 = 10;

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/fitbit-start", post(fitbit_start))
}

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/fitbit-callback", get(fitbit_callback))
}

#[derive(Serialize)]
pub struct StartResponse {
    #[serde(rename = "authorizeUrl")]
    pub authorize_url: String,
}

/// Start the Fitbit authorization flow for the authenticated user.
///
/// Generates the PKCE verifier/challenge pair and a random state token,
/// stores both server side, and hands back the provider URL to open.
/// Only the challenge goes into that URL; the verifier stays with us
/// until the callback redeems it.
async fn fitbit_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<Json<StartResponse>> {
    let oauth_state = pkce::random_urlsafe(32);
    let code_verifier = pkce::random_urlsafe(64);
    let code_challenge = pkce::code_challenge(&code_verifier);

    // Remember which origin opened the flow so the callback can send the
    // user back there
    let app_origin = request_origin(&headers).unwrap_or_else(|| state.config.app_url.clone());

    let session = OAuthSession {
        state: oauth_state.clone(),
        user_id: user.user_id,
        code_verifier,
        expires_at: format_utc_rfc3339(Utc::now() + Duration::minutes(SESSION_TTL_MINUTES)),
        app_origin,
    };

    state
        .db
        .insert_oauth_session(&session)
        .await
        .map_err(AppError::into_start_failure)?;

    let authorize_url = state.fitbit.authorize_url(
        &state.config.fitbit_redirect_uri,
        &state.config.fitbit_scopes,
        &code_challenge,
        &oauth_state,
    );

    tracing::info!(user_id = %user.user_id, "Fitbit authorization started");

    Ok(Json(StartResponse { authorize_url }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider redirect target.
///
/// Consumes the stored session exactly once (the lookup deletes it, so a
/// replayed state finds nothing), exchanges the code, persists tokens and
/// the connection row, then redirects to the origin that started the
/// flow. Every failure becomes a `fitbit_error` query parameter on that
/// redirect rather than an API error; there is no caller to return JSON
/// to here, only a browser mid-redirect.
async fn fitbit_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let fallback = state.config.app_url.clone();

    let oauth_state = match params.state {
        Some(ref s) if !s.is_empty() => s.clone(),
        _ => {
            tracing::warn!("Callback arrived without a state parameter");
            return error_redirect(&fallback, "invalid_state");
        }
    };

    let session = match state.db.take_oauth_session(&oauth_state).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::warn!("Callback state matched no pending session");
            return error_redirect(&fallback, "invalid_state");
        }
        Err(e) => {
            tracing::error!(error = %e, "Session lookup failed during callback");
            return error_redirect(&fallback, "session_lookup_failed");
        }
    };

    let origin = session.app_origin.clone();

    let expired = parse_rfc3339(&session.expires_at).map_or(true, |at| at < Utc::now());
    if expired {
        tracing::warn!(user_id = %session.user_id, "Authorization session expired");
        return error_redirect(&origin, "session_expired");
    }

    // The session is consumed even when the provider denied: the state
    // token is single-use either way
    if let Some(error) = params.error {
        tracing::warn!(
            user_id = %session.user_id,
            error = %error,
            "Provider denied authorization"
        );
        return error_redirect(&origin, "provider_denied");
    }

    let code = match params.code {
        Some(code) => code,
        None => {
            tracing::warn!(user_id = %session.user_id, "Callback carried no authorization code");
            return error_redirect(&origin, "missing_code");
        }
    };

    let tokens = match state
        .fitbit
        .complete_authorization(
            session.user_id,
            &code,
            &state.config.fitbit_redirect_uri,
            &session.code_verifier,
        )
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(user_id = %session.user_id, error = %e, "Code exchange failed");
            return error_redirect(&origin, "exchange_failed");
        }
    };

    let connection = Connection {
        user_id: session.user_id,
        provider_user_id: Some(tokens.user_id),
        status: "connected".to_string(),
        last_sync_at: None,
        last_steps_sync_at: None,
        last_error_message: None,
    };

    if let Err(e) = state.db.upsert_connection(&connection).await {
        tracing::error!(user_id = %session.user_id, error = %e, "Failed to store connection");
        return error_redirect(&origin, "connection_store_failed");
    }

    Redirect::temporary(&format!("{}?fitbit=connected", origin))
}

/// Origin the connect flow should return the user to.
///
/// Prefers the Origin header, then the origin part of Referer. Browsers
/// send a literal "null" Origin from sandboxed contexts; treat that as
/// absent.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !origin.is_empty() && origin != "null" {
            return Some(origin.trim_end_matches('/').to_string());
        }
    }

    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok())?;
    let scheme_end = referer.find("://")? + 3;
    let origin_end = referer[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i)
        .unwrap_or(referer.len());
    Some(referer[..origin_end].to_string())
}

fn error_redirect(origin: &str, reason: &str) -> Redirect {
    Redirect::temporary(&format!("{}?fitbit_error={}", origin, reason))
}

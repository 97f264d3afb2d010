// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit API client and token lifecycle.
//!
//! Handles:
//! - Authorization URL construction (PKCE, S256)
//! - Code exchange and refresh-token rotation
//! - Steps time-series fetching
//! - Upstream failure classification (scope vs. credentials vs. outage)

use crate::error::AppError;
use chrono::NaiveDate;
use serde::Deserialize;

/// Fitbit API client.
///
/// Endpoints are fields rather than constants so tests can point the
/// client at a stub server.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    api_base: String,
    auth_url: String,
    token_url: String,
    client_id: String,
}

impl FitbitClient {
    /// Create a client against the production Fitbit endpoints.
    pub fn new(client_id: String) -> Self {
        Self::with_endpoints(
            client_id,
            "https://api.fitbit.com".to_string(),
            "https://www.fitbit.com/oauth2/authorize".to_string(),
            "https://api.fitbit.com/oauth2/token".to_string(),
        )
    }

    /// Create a client with explicit endpoints.
    pub fn with_endpoints(
        client_id: String,
        api_base: String,
        auth_url: String,
        token_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            auth_url,
            token_url,
            client_id,
        }
    }

    /// Build the user-facing authorization URL for the PKCE flow.
    ///
    /// `code_challenge` and `state` are base64url and need no escaping.
    pub fn authorize_url(
        &self,
        redirect_uri: &str,
        scopes: &str,
        code_challenge: &str,
        state: &str,
    ) -> String {
        format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             code_challenge={}&\
             code_challenge_method=S256&\
             state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(scopes),
            code_challenge,
            state
        )
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Public-client PKCE exchange: the code verifier stands in for a
    /// client secret.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<FitbitTokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("token exchange request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Fitbit token exchange failed");
            return Err(AppError::Unauthorized);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token response parse error: {}", e)))
    }

    /// Refresh an expired access token.
    ///
    /// Fitbit rotates the refresh token on every successful refresh, so
    /// the caller must persist the whole response. A rejected refresh
    /// maps to `Unauthorized` so the stored credentials get dropped.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<FitbitTokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("token refresh request failed: {}", e))
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Fitbit refused the refresh token");
            return Err(AppError::Unauthorized);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("refresh response parse error: {}", e)))
    }

    /// Fetch the steps time series for an inclusive date range.
    pub async fn fetch_steps_range(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StepsSeriesResponse, AppError> {
        let url = format!(
            "{}/1/user/-/activities/steps/date/{}/{}.json",
            self.api_base, start, end
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("steps fetch request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_failure(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("steps response parse error: {}", e)))
    }
}

/// Map a non-2xx Fitbit data response to the error the caller surfaces.
///
/// A 401/403 whose error fields name an insufficient scope means the
/// user connected without granting activity access; a plain 401 means
/// the credentials are dead. Everything else passes through with the
/// upstream status attached.
pub fn classify_api_failure(status: u16, body: &str) -> AppError {
    if (status == 401 || status == 403) && names_insufficient_scope(body) {
        return AppError::InsufficientScope;
    }
    if status == 401 {
        return AppError::Unauthorized;
    }
    AppError::FetchFailed(status)
}

/// Case-folded "insufficient" + "scope" test over the error-shape
/// fields only: top-level `errorType`/`message`, or the first `errors`
/// entry's `errorType`/`message`/`fieldName`. Secondary entries and
/// unrelated body text never count, so a dead-credential 401 with a
/// trailing scope complaint still classifies as unauthorized. Non-JSON
/// bodies never match.
fn names_insufficient_scope(body: &str) -> bool {
    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return false,
    };

    let mut text = String::new();
    let mut push = |value: &serde_json::Value| {
        if let Some(s) = value.as_str() {
            text.push_str(s);
            text.push(' ');
        }
    };
    push(&parsed["errorType"]);
    push(&parsed["message"]);
    if let Some(first) = parsed["errors"].get(0) {
        push(&first["errorType"]);
        push(&first["message"]);
        push(&first["fieldName"]);
    }

    let folded = text.to_lowercase();
    folded.contains("insufficient") && folded.contains("scope")
}

/// Token response from the Fitbit OAuth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FitbitTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Fitbit's own identifier for the user
    pub user_id: String,
    /// Space-delimited scopes actually granted
    #[serde(default)]
    pub scope: String,
}

/// Steps time series response (`activities-steps`).
#[derive(Debug, Clone, Deserialize)]
pub struct StepsSeriesResponse {
    #[serde(rename = "activities-steps", default)]
    pub activities_steps: Vec<StepsEntry>,
}

/// One day in the steps series. Fitbit documents `value` as a string,
/// but numbers have been observed too, so it is kept raw and parsed
/// leniently by the normalizer.
#[derive(Debug, Clone, Deserialize)]
pub struct StepsEntry {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    pub value: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// FitbitService - token lifecycle on top of the client
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::PostgrestDb;
use crate::models::TokenRecord;
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Absolute expiry for a freshly granted token. An `expires_in` outside
/// what the time math can represent clamps to "already expired" instead
/// of panicking.
fn token_expires_at(now: DateTime<Utc>, expires_in: i64) -> String {
    let expires_at = Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now);
    format_utc_rfc3339(expires_at)
}

/// High-level Fitbit service that manages the token lifecycle.
///
/// Deliberately stateless: no in-process token cache and no per-user
/// locks. Concurrent refreshes can race; the row-level token upsert keeps
/// the record consistent, and a loser that persisted a stale rotation
/// self-corrects through the unauthorized path on its next call.
#[derive(Clone)]
pub struct FitbitService {
    client: FitbitClient,
    db: PostgrestDb,
}

impl FitbitService {
    pub fn new(client: FitbitClient, db: PostgrestDb) -> Self {
        Self { client, db }
    }

    /// Build the user-facing authorization URL.
    pub fn authorize_url(
        &self,
        redirect_uri: &str,
        scopes: &str,
        code_challenge: &str,
        state: &str,
    ) -> String {
        self.client
            .authorize_url(redirect_uri, scopes, code_challenge, state)
    }

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// Refreshes proactively when the stored token is within 5 minutes of
    /// expiry, or when the stored expiry cannot be parsed. A refresh the
    /// provider rejects propagates as `Unauthorized` with the stored
    /// record untouched; deleting dead credentials is the caller's
    /// decision.
    pub async fn valid_access_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let record = self
            .db
            .get_token_record(user_id)
            .await?
            .ok_or(AppError::MissingTokens)?;

        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        // Unparsable expiry is treated as already expired
        if let Some(expires_at) = parse_rfc3339(&record.expires_at) {
            if now + margin < expires_at {
                return Ok(record.access_token);
            }
        }

        tracing::info!(user_id = %user_id, "Access token expiring, refreshing");

        let refreshed = self.client.refresh_token(&record.refresh_token).await?;

        let expires_at = token_expires_at(now, refreshed.expires_in);
        self.db
            .upsert_token_record(&TokenRecord {
                user_id,
                access_token: refreshed.access_token.clone(),
                refresh_token: refreshed.refresh_token,
                expires_at,
            })
            .await?;

        tracing::info!(user_id = %user_id, "Token refreshed and stored");
        Ok(refreshed.access_token)
    }

    /// Exchange the callback code and persist the resulting credentials.
    pub async fn complete_authorization(
        &self,
        user_id: Uuid,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<FitbitTokenResponse, AppError> {
        let tokens = self
            .client
            .exchange_code(code, redirect_uri, code_verifier)
            .await?;

        let expires_at = token_expires_at(Utc::now(), tokens.expires_in);
        self.db
            .upsert_token_record(&TokenRecord {
                user_id,
                access_token: tokens.access_token.clone(),
                refresh_token: tokens.refresh_token.clone(),
                expires_at,
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            provider_user_id = %tokens.user_id,
            scope = %tokens.scope,
            "Fitbit authorization completed"
        );
        Ok(tokens)
    }

    /// Fetch the steps series with an already-validated access token.
    pub async fn fetch_steps_range(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StepsSeriesResponse, AppError> {
        self.client
            .fetch_steps_range(access_token, start, end)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_insufficient_scope() {
        let body = r#"{"errors":[{"errorType":"insufficient_scope","message":"This application does not have permission to access activity data."}],"success":false}"#;
        assert!(matches!(
            classify_api_failure(403, body),
            AppError::InsufficientScope
        ));
        // Fitbit has served the same condition under 401
        assert!(matches!(
            classify_api_failure(401, body),
            AppError::InsufficientScope
        ));
    }

    #[test]
    fn test_classify_scope_match_is_case_insensitive() {
        let body = r#"{"errors":[{"errorType":"oauth","message":"Insufficient Scope granted"}]}"#;
        assert!(matches!(
            classify_api_failure(403, body),
            AppError::InsufficientScope
        ));
    }

    #[test]
    fn test_classify_plain_unauthorized() {
        let body = r#"{"errors":[{"errorType":"invalid_token","message":"Access token invalid"}]}"#;
        assert!(matches!(
            classify_api_failure(401, body),
            AppError::Unauthorized
        ));
    }

    #[test]
    fn test_classify_reads_only_first_error_entry() {
        // A dead credential with a trailing scope complaint is still a
        // dead credential: the first entry drives the call
        let body = r#"{"errors":[{"errorType":"invalid_token","message":"Access token invalid: expired"},{"errorType":"insufficient_scope","message":"This application does not have permission to access activity scope data."}],"success":false}"#;
        assert!(matches!(
            classify_api_failure(401, body),
            AppError::Unauthorized
        ));

        // Same two entries the other way around put the scope error first
        let reversed = r#"{"errors":[{"errorType":"insufficient_scope","message":"This application does not have permission to access activity scope data."},{"errorType":"invalid_token","message":"Access token invalid: expired"}],"success":false}"#;
        assert!(matches!(
            classify_api_failure(401, reversed),
            AppError::InsufficientScope
        ));
    }

    #[test]
    fn test_classify_reads_top_level_error_fields() {
        let body = r#"{"errorType":"oauth","message":"Insufficient scope to access this resource"}"#;
        assert!(matches!(
            classify_api_failure(403, body),
            AppError::InsufficientScope
        ));
    }

    #[test]
    fn test_classify_ignores_scope_words_outside_error_fields() {
        // Markers in a non-JSON body, or in fields the provider's error
        // shape does not define, never make a scope error
        assert!(matches!(
            classify_api_failure(403, "<html>insufficient scope</html>"),
            AppError::FetchFailed(403)
        ));
        assert!(matches!(
            classify_api_failure(401, r#"{"detail":"insufficient scope"}"#),
            AppError::Unauthorized
        ));
    }

    #[test]
    fn test_classify_passes_through_other_statuses() {
        assert!(matches!(
            classify_api_failure(429, ""),
            AppError::FetchFailed(429)
        ));
        assert!(matches!(
            classify_api_failure(500, "server error"),
            AppError::FetchFailed(500)
        ));
        // 403 without the scope markers is an upstream failure, not a
        // scope problem
        assert!(matches!(
            classify_api_failure(403, "forbidden"),
            AppError::FetchFailed(403)
        ));
    }

    #[test]
    fn test_token_expiry_clamps_absurd_lifetimes() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2024, 3, 10, 2, 0, 0).unwrap();
        assert_eq!(token_expires_at(now, 28800), "2024-03-10T10:00:00Z");
        // Lifetimes the time math cannot represent collapse to
        // "already expired" rather than panicking
        assert_eq!(token_expires_at(now, i64::MAX), "2024-03-10T02:00:00Z");
        assert_eq!(token_expires_at(now, i64::MIN), "2024-03-10T02:00:00Z");
        assert_eq!(token_expires_at(now, 10_000_000_000_000), "2024-03-10T02:00:00Z");
    }

    #[test]
    fn test_authorize_url_carries_pkce_params() {
        let client = FitbitClient::new("23ABCD".to_string());
        let url = client.authorize_url(
            "https://sync.example.com/fitbit-callback",
            "activity profile",
            "challenge123",
            "state456",
        );

        assert!(url.starts_with("https://www.fitbit.com/oauth2/authorize?"));
        assert!(url.contains("client_id=23ABCD"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fsync.example.com%2Ffitbit-callback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=activity%20profile"));
        assert!(url.contains("code_challenge=challenge123"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=state456"));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase REST (PostgREST) client wrapper with typed operations.
//!
//! All store access goes through this client, authenticated with the
//! service-role key. Provides high-level operations for:
//! - OAuth sessions (single-use PKCE state rows)
//! - Tokens (Fitbit OAuth credentials)
//! - Connections (per-user provider status and sync throttle)
//! - Daily activity (step totals)
//! - Profiles (timezone lookup, read-only)

use crate::db::tables;
use crate::error::AppError;
use crate::models::{Connection, DailyActivity, OAuthSession, Profile, TokenRecord};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Supabase REST client.
#[derive(Clone)]
pub struct PostgrestDb {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl PostgrestDb {
    /// Create a client for the given Supabase project.
    pub fn new(supabase_url: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }

    /// Start a request against a table with the auth headers applied.
    fn request(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
    }

    /// Check response status, mapping failures to a store error.
    async fn check(
        &self,
        table: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Database(format!(
            "{} request failed: HTTP {}: {}",
            table,
            status.as_u16(),
            body
        )))
    }

    /// Check response status and parse the JSON row array.
    async fn rows<T: DeserializeOwned>(
        &self,
        table: &str,
        response: reqwest::Response,
    ) -> Result<Vec<T>, AppError> {
        let response = self.check(table, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("{} response parse error: {}", table, e)))
    }

    // ─── OAuth Session Operations ────────────────────────────────

    /// Store a pending authorization session.
    pub async fn insert_oauth_session(&self, session: &OAuthSession) -> Result<(), AppError> {
        let response = self
            .request(Method::POST, tables::OAUTH_SESSIONS)
            .header("Prefer", "return=minimal")
            .json(session)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("oauth session insert failed: {}", e)))?;
        self.check(tables::OAUTH_SESSIONS, response).await?;
        Ok(())
    }

    /// Delete and return the session for `state`, if present.
    ///
    /// DELETE with `return=representation` makes consumption atomic: of
    /// two concurrent callbacks carrying the same state, at most one gets
    /// the row back.
    pub async fn take_oauth_session(&self, state: &str) -> Result<Option<OAuthSession>, AppError> {
        let response = self
            .request(Method::DELETE, tables::OAUTH_SESSIONS)
            .query(&[("state", format!("eq.{}", state))])
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|e| AppError::Database(format!("oauth session take failed: {}", e)))?;
        let rows: Vec<OAuthSession> = self.rows(tables::OAUTH_SESSIONS, response).await?;
        Ok(rows.into_iter().next())
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get the stored Fitbit tokens for a user.
    pub async fn get_token_record(&self, user_id: Uuid) -> Result<Option<TokenRecord>, AppError> {
        let response = self
            .request(Method::GET, tables::TOKENS)
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Database(format!("token fetch failed: {}", e)))?;
        let rows: Vec<TokenRecord> = self.rows(tables::TOKENS, response).await?;
        Ok(rows.into_iter().next())
    }

    /// Store tokens for a user, replacing any existing row.
    pub async fn upsert_token_record(&self, record: &TokenRecord) -> Result<(), AppError> {
        let response = self
            .request(Method::POST, tables::TOKENS)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("token upsert failed: {}", e)))?;
        self.check(tables::TOKENS, response).await?;
        Ok(())
    }

    /// Delete tokens (dead credentials, user must reconnect).
    pub async fn delete_token_record(&self, user_id: Uuid) -> Result<(), AppError> {
        let response = self
            .request(Method::DELETE, tables::TOKENS)
            .query(&[("user_id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .send()
            .await
            .map_err(|e| AppError::Database(format!("token delete failed: {}", e)))?;
        self.check(tables::TOKENS, response).await?;
        Ok(())
    }

    // ─── Connection Operations ───────────────────────────────────

    /// Get a user's Fitbit connection row.
    pub async fn get_connection(&self, user_id: Uuid) -> Result<Option<Connection>, AppError> {
        let response = self
            .request(Method::GET, tables::CONNECTIONS)
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Database(format!("connection fetch failed: {}", e)))?;
        let rows: Vec<Connection> = self.rows(tables::CONNECTIONS, response).await?;
        Ok(rows.into_iter().next())
    }

    /// Create or replace a user's connection row.
    pub async fn upsert_connection(&self, connection: &Connection) -> Result<(), AppError> {
        let response = self
            .request(Method::POST, tables::CONNECTIONS)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(connection)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("connection upsert failed: {}", e)))?;
        self.check(tables::CONNECTIONS, response).await?;
        Ok(())
    }

    /// Atomically claim the steps-sync slot for a user.
    ///
    /// One conditional UPDATE sets `last_steps_sync_at = now` and returns
    /// the row, but only when the previous value is NULL, at or before the
    /// cooldown cutoff, or in the future (clock skew is not a throttle).
    /// An empty result means another attempt inside the cooldown owns the
    /// slot, so the caller should answer with a retry delay.
    pub async fn claim_steps_sync(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Connection>, AppError> {
        let now_str = format_utc_rfc3339(now);
        let guard = format!(
            "(last_steps_sync_at.is.null,last_steps_sync_at.lte.{},last_steps_sync_at.gt.{})",
            format_utc_rfc3339(cutoff),
            now_str
        );
        let response = self
            .request(Method::PATCH, tables::CONNECTIONS)
            .query(&[("user_id", format!("eq.{}", user_id)), ("or", guard)])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "last_steps_sync_at": now_str }))
            .send()
            .await
            .map_err(|e| AppError::Database(format!("sync claim failed: {}", e)))?;
        let rows: Vec<Connection> = self.rows(tables::CONNECTIONS, response).await?;
        Ok(rows.into_iter().next())
    }

    /// Record a completed sync: advance the sync timestamps and clear any
    /// previous error.
    pub async fn mark_sync_success(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let now_str = format_utc_rfc3339(now);
        self.patch_connection(
            user_id,
            serde_json::json!({
                "status": "connected",
                "last_sync_at": now_str,
                "last_steps_sync_at": now_str,
                "last_error_message": null,
            }),
        )
        .await
    }

    /// Record a terminal sync failure: keep the error visible and put the
    /// throttle marker back to its pre-claim value, in one write.
    pub async fn record_sync_failure(
        &self,
        user_id: Uuid,
        message: &str,
        previous_steps_sync_at: Option<String>,
    ) -> Result<(), AppError> {
        self.patch_connection(
            user_id,
            serde_json::json!({
                "status": "error",
                "last_error_message": message,
                "last_steps_sync_at": previous_steps_sync_at,
            }),
        )
        .await
    }

    async fn patch_connection(
        &self,
        user_id: Uuid,
        body: serde_json::Value,
    ) -> Result<(), AppError> {
        let response = self
            .request(Method::PATCH, tables::CONNECTIONS)
            .query(&[("user_id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("connection update failed: {}", e)))?;
        self.check(tables::CONNECTIONS, response).await?;
        Ok(())
    }

    // ─── Daily Activity Operations ───────────────────────────────

    /// Upsert one batch of daily step rows on (user_id, date).
    ///
    /// Last writer wins per row; re-running a window is idempotent.
    pub async fn upsert_daily_activity(&self, rows: &[DailyActivity]) -> Result<(), AppError> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, tables::DAILY_ACTIVITY)
            .query(&[("on_conflict", "user_id,date")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("daily activity upsert failed: {}", e)))?;
        self.check(tables::DAILY_ACTIVITY, response).await?;
        Ok(())
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get the app profile for a user (timezone lookup).
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let response = self
            .request(Method::GET, tables::PROFILES)
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("select", "user_id,timezone".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Database(format!("profile fetch failed: {}", e)))?;
        let rows: Vec<Profile> = self.rows(tables::PROFILES, response).await?;
        Ok(rows.into_iter().next())
    }
}

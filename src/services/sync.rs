// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Steps sync orchestration.
//!
//! Runs the full pipeline for one sync request: connection lookup,
//! throttle claim, credential validation, windowed fetch, normalization,
//! and write-back. Each stage either produces the input for the next or
//! a typed error the route surfaces as-is.

use crate::db::PostgrestDb;
use crate::error::AppError;
use crate::models::DailyActivity;
use crate::services::fitbit::{FitbitService, StepsSeriesResponse};
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Cooldown between successive steps syncs for one user.
const SYNC_COOLDOWN_MINUTES: i64 = 15;

/// Days of history fetched per sync, today inclusive.
const SYNC_WINDOW_DAYS: i64 = 7;

/// Provenance marker written with every steps row.
const STEPS_SOURCE: &str = "fitbit";

/// Successful sync summary returned to the caller.
#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    pub ok: bool,
    /// Window dates, newest first
    pub synced_dates: Vec<NaiveDate>,
}

/// Orchestrates one steps sync end to end.
#[derive(Clone)]
pub struct SyncService {
    db: PostgrestDb,
    fitbit: FitbitService,
}

impl SyncService {
    pub fn new(db: PostgrestDb, fitbit: FitbitService) -> Self {
        Self { db, fitbit }
    }

    /// Run one steps sync for `user_id`.
    ///
    /// The throttle slot is claimed up front with a single conditional
    /// update, which closes the read-then-write race between concurrent
    /// requests. Any terminal failure after the claim restores the
    /// previous `last_steps_sync_at`, so a failed attempt does not burn
    /// the user's cooldown.
    pub async fn sync_steps(&self, user_id: Uuid) -> Result<SyncOutcome, AppError> {
        let connection = self
            .db
            .get_connection(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        let now = Utc::now();
        let cutoff = now - Duration::minutes(SYNC_COOLDOWN_MINUTES);

        if self.db.claim_steps_sync(user_id, now, cutoff).await?.is_none() {
            // Someone (possibly a concurrent request) synced within the
            // cooldown. Re-read for an accurate delay; the row we already
            // hold may predate the winner's claim.
            let latest = self.db.get_connection(user_id).await?;
            let retry = latest
                .and_then(|c| c.last_steps_sync_at)
                .as_deref()
                .and_then(parse_rfc3339)
                .map(|at| retry_after_seconds(now, at))
                .unwrap_or(1);
            tracing::debug!(user_id = %user_id, retry_after_seconds = retry, "Steps sync throttled");
            return Err(AppError::RateLimited {
                retry_after_seconds: retry,
            });
        }

        let previous_sync_at = connection.last_steps_sync_at.clone();

        match self.run_claimed(user_id, now).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.release_claim(user_id, previous_sync_at, &err).await;
                Err(err)
            }
        }
    }

    /// Pipeline stages that run while holding the throttle claim.
    async fn run_claimed(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, AppError> {
        let access_token = match self.fitbit.valid_access_token(user_id).await {
            Ok(token) => token,
            Err(AppError::Unauthorized) => {
                // The provider rejected the refresh token: drop the
                // stored credentials so the next attempt prompts a
                // reconnect
                self.db.delete_token_record(user_id).await?;
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        let timezone = self
            .db
            .get_profile(user_id)
            .await?
            .and_then(|profile| profile.timezone);
        let window = sync_window(now, timezone.as_deref());
        let (start, end) = (window[0], window[window.len() - 1]);

        tracing::debug!(
            user_id = %user_id,
            start = %start,
            end = %end,
            timezone = timezone.as_deref().unwrap_or("UTC"),
            "Fetching steps window"
        );

        let series = match self.fitbit.fetch_steps_range(&access_token, start, end).await {
            Ok(series) => series,
            Err(AppError::Unauthorized) => {
                // Credentials died between refresh and fetch: drop them so
                // the next attempt prompts a reconnect
                self.db.delete_token_record(user_id).await?;
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        let rows = normalize_series(&series, &window, user_id, now);
        self.db.upsert_daily_activity(&rows).await?;
        self.db.mark_sync_success(user_id, now).await?;

        let mut synced_dates = window;
        synced_dates.reverse(); // newest first

        tracing::info!(
            user_id = %user_id,
            days = synced_dates.len(),
            "Steps sync completed"
        );

        Ok(SyncOutcome {
            ok: true,
            synced_dates,
        })
    }

    /// Best-effort failure write-back: record the error and put the
    /// throttle marker back. Never masks the sync error itself.
    async fn release_claim(&self, user_id: Uuid, previous: Option<String>, err: &AppError) {
        if let Err(write_err) = self
            .db
            .record_sync_failure(user_id, &err.to_string(), previous)
            .await
        {
            tracing::warn!(
                user_id = %user_id,
                error = %write_err,
                "Failed to record sync failure on connection"
            );
        }
    }
}

/// Compute the inclusive 7-day window ending "today" in the user's
/// timezone, oldest date first.
///
/// Unknown or unparsable timezone names fall back to UTC.
pub fn sync_window(now: DateTime<Utc>, timezone: Option<&str>) -> Vec<NaiveDate> {
    let tz: Tz = timezone
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC);

    let today = now.with_timezone(&tz).date_naive();
    (0..SYNC_WINDOW_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}

/// Seconds a throttled caller should wait, with millisecond-resolution
/// rounding up: 14m59s into the cooldown yields 1, never 0.
pub fn retry_after_seconds(now: DateTime<Utc>, last_sync_at: DateTime<Utc>) -> u64 {
    let cooldown_ms = SYNC_COOLDOWN_MINUTES * 60 * 1000;
    let delta_ms = (now - last_sync_at).num_milliseconds();
    let remaining_ms = cooldown_ms - delta_ms;
    if remaining_ms <= 0 {
        return 0;
    }
    ((remaining_ms + 999) / 1000) as u64
}

/// Turn a raw Fitbit series into exactly one row per window date.
///
/// Provider entries with unparsable dates or values are dropped, as are
/// entries outside the window. Window dates the provider omitted get an
/// explicit zero row, so a sparse series still yields a full week.
pub fn normalize_series(
    series: &StepsSeriesResponse,
    window: &[NaiveDate],
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Vec<DailyActivity> {
    let mut by_date: HashMap<NaiveDate, u32> = HashMap::new();
    for entry in &series.activities_steps {
        let date = match entry.date_time.parse::<NaiveDate>() {
            Ok(date) => date,
            Err(_) => {
                tracing::debug!(raw = %entry.date_time, "Skipping series entry with unparsable date");
                continue;
            }
        };
        let steps = match parse_steps(&entry.value) {
            Some(steps) => steps,
            None => {
                tracing::debug!(date = %date, "Skipping series entry with unparsable value");
                continue;
            }
        };
        by_date.insert(date, steps);
    }

    let updated_at = format_utc_rfc3339(now);
    window
        .iter()
        .map(|date| DailyActivity {
            user_id,
            date: *date,
            steps: by_date.get(date).copied().unwrap_or(0),
            steps_source: STEPS_SOURCE.to_string(),
            steps_updated_at: updated_at.clone(),
        })
        .collect()
}

/// Parse a steps value that may arrive as a JSON number or a numeric
/// string. Negative and fractional values are rejected.
fn parse_steps(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

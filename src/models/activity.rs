// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Daily activity row written by the steps sync.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day of step totals, upserted on (user_id, date).
///
/// Every date in a sync window gets a row, zero-filled when the provider
/// reported nothing for that day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyActivity {
    pub user_id: Uuid,
    /// Calendar date in the user's timezone
    pub date: NaiveDate,
    pub steps: u32,
    /// Provenance marker ("fitbit")
    pub steps_source: String,
    /// When this row was last written (ISO 8601)
    pub steps_updated_at: String,
}

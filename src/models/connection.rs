//! Fitbit connection status row.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user provider connection state.
///
/// `last_steps_sync_at` doubles as the sync throttle marker; it is only
/// advanced by a completed sync (a failed attempt restores it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub user_id: Uuid,
    /// Fitbit's own identifier for the user
    pub provider_user_id: Option<String>,
    /// "connected" or "error"
    pub status: String,
    /// Last successful sync of any kind (ISO 8601)
    pub last_sync_at: Option<String>,
    /// Last successful steps sync, used for throttling (ISO 8601)
    pub last_steps_sync_at: Option<String>,
    /// Message of the most recent terminal failure, cleared on success
    pub last_error_message: Option<String>,
}

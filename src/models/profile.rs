//! App profile row (read-only here).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subset of the app's profile row this service reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    /// IANA timezone name; absent or unparsable falls back to UTC
    pub timezone: Option<String>,
}

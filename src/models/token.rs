//! Stored Fitbit OAuth credentials.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's Fitbit tokens, keyed by app user id.
///
/// Fitbit rotates the refresh token on every refresh, so updates always
/// replace the whole row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (ISO 8601; unparsable means expired)
    pub expires_at: String,
}

//! Pending OAuth authorization session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short-lived row pairing an OAuth `state` with its PKCE verifier.
///
/// Created by the start handler, consumed exactly once by the callback.
/// Expired rows are rejected at consumption time; there is no sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSession {
    /// Random `state` parameter (also the row key)
    pub state: String,
    pub user_id: Uuid,
    /// PKCE code verifier; must never appear in logs or responses
    pub code_verifier: String,
    /// When the session stops being acceptable (ISO 8601)
    pub expires_at: String,
    /// Web origin that initiated the flow, for the post-OAuth redirect
    pub app_origin: String,
}

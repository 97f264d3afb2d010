//! Database layer (Supabase REST).

pub mod postgrest;

pub use postgrest::PostgrestDb;

/// Table names as constants.
pub mod tables {
    pub const OAUTH_SESSIONS: &str = "fitbit_oauth_sessions";
    pub const TOKENS: &str = "fitbit_tokens";
    pub const CONNECTIONS: &str = "fitbit_connections";
    pub const DAILY_ACTIVITY: &str = "daily_activity";
    /// App profiles (timezone lookup only)
    pub const PROFILES: &str = "profiles";
}

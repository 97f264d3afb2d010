//! Application configuration loaded from environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fitbit OAuth client ID (public; PKCE flow, no client secret)
    pub fitbit_client_id: String,
    /// Redirect URI registered with the Fitbit application
    pub fitbit_redirect_uri: String,
    /// Space-delimited OAuth scopes requested at authorization
    pub fitbit_scopes: String,
    /// Supabase project URL (REST endpoint lives under /rest/v1)
    pub supabase_url: String,
    /// Service-role key for privileged store access
    pub supabase_service_role_key: String,
    /// HS256 secret the identity service signs user JWTs with
    pub supabase_jwt_secret: Vec<u8>,
    /// Frontend URL, fallback origin for post-OAuth redirects
    pub app_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            fitbit_client_id: env::var("FITBIT_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("FITBIT_CLIENT_ID"))?,
            fitbit_redirect_uri: env::var("FITBIT_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("FITBIT_REDIRECT_URI"))?,
            fitbit_scopes: env::var("FITBIT_SCOPES")
                .unwrap_or_else(|_| "activity profile".to_string()),
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?
                .into_bytes(),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            fitbit_client_id: "23TEST".to_string(),
            fitbit_redirect_uri: "http://localhost:8080/fitbit-callback".to_string(),
            fitbit_scopes: "activity profile".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_role_key: "test_service_role_key".to_string(),
            supabase_jwt_secret: b"test_jwt_secret_32_bytes_minimum".to_vec(),
            app_url: "http://localhost:5173".to_string(),
            port: 8080,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

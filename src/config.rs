use std::path::PathBuf;
use std::time::Duration;

use crate::core::errors::ApiError;

// === Limits ===
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_COMMENT_LENGTH: usize = 1000;
pub const POSTS_PER_PAGE: usize = 20;

// === Tables ===
pub const USERS_TABLE: &str = "users";
pub const POSTS_TABLE: &str = "posts";
pub const COMMENTS_TABLE: &str = "comments";
pub const POST_REACTIONS_TABLE: &str = "post_reactions";
pub const FOLLOW_REQUESTS_TABLE: &str = "follow_requests";
pub const FOLLOWS_TABLE: &str = "follows";

// === Environment ===
pub const URL_VAR: &str = "WAVELENGTH_SUPABASE_URL";
pub const ANON_KEY_VAR: &str = "WAVELENGTH_SUPABASE_ANON_KEY";
pub const SESSION_FILE_VAR: &str = "WAVELENGTH_SESSION_FILE";
pub const REQUEST_TIMEOUT_VAR: &str = "WAVELENGTH_REQUEST_TIMEOUT_SECS";
pub const REFRESH_MARGIN_VAR: &str = "WAVELENGTH_REFRESH_MARGIN_SECS";

const DEFAULT_SESSION_FILE: &str = ".wavelength-session.json";

pub fn request_timeout() -> Duration {
    Duration::from_secs(
        std::env::var(REQUEST_TIMEOUT_VAR)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30),
    )
}

/// Seconds before `expires_at` at which a stored session is treated as expired.
pub fn refresh_margin_secs() -> i64 {
    std::env::var(REFRESH_MARGIN_VAR)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(60)
}

pub fn session_file() -> PathBuf {
    std::env::var(SESSION_FILE_VAR)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE))
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            request_timeout: request_timeout(),
        }
    }

    /// Both variables are required; a missing or empty one is fatal at startup.
    pub fn from_env() -> Result<Self, ApiError> {
        let url = required_var(URL_VAR)?;
        let anon_key = required_var(ANON_KEY_VAR)?;
        Ok(Self::new(url, anon_key))
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path.trim_start_matches('/'))
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }
}

fn required_var(name: &str) -> Result<String, ApiError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::Config(format!(
            "Missing environment variable {}. Set {} and {} (e.g. in .env.local)",
            name, URL_VAR, ANON_KEY_VAR
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_without_double_slashes() {
        let config = BackendConfig::new("https://demo.supabase.co/", "anon");
        assert_eq!(config.auth_url("/signup"), "https://demo.supabase.co/auth/v1/signup");
        assert_eq!(config.rest_url(POSTS_TABLE), "https://demo.supabase.co/rest/v1/posts");
    }
}

//! Shell configuration parsed from environment variables.

use std::path::PathBuf;

use auth::AdminPolicy;

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const SESSION_FILE_NAME: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".atlas-session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },
    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    pub supabase_url: String,
    pub anon_key: String,
    pub admin_emails: Vec<String>,
    pub session_file: PathBuf,
    pub site_url: String,
    pub timeouts: Timeouts,
}

impl AtlasConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `ATLAS_ADMIN_EMAILS`: comma-separated allow-list, default empty
    /// - `ATLAS_SESSION_FILE`: default `$HOME/.atlas/session.json`
    /// - `ATLAS_SITE_URL`: origin for password-reset links, default `http://localhost:3000`
    /// - `ATLAS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `ATLAS_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url = required("SUPABASE_URL")?;
        let anon_key = required("SUPABASE_ANON_KEY")?;
        Self::with_credentials(supabase_url, anon_key)
    }

    /// Same as [`AtlasConfig::from_env`] with the two required values supplied
    /// by the caller (e.g. command-line flags).
    pub fn with_credentials(supabase_url: String, anon_key: String) -> Result<Self, ConfigError> {
        let supabase_url = parse_url("SUPABASE_URL", &supabase_url)?;
        if anon_key.trim().is_empty() {
            return Err(ConfigError::Missing { var: "SUPABASE_ANON_KEY" });
        }
        let site_url = match std::env::var("ATLAS_SITE_URL") {
            Ok(raw) => parse_url("ATLAS_SITE_URL", &raw)?,
            Err(_) => DEFAULT_SITE_URL.to_string(),
        };
        let admin_emails = std::env::var("ATLAS_ADMIN_EMAILS")
            .map(|raw| parse_email_list(&raw))
            .unwrap_or_default();
        let session_file = std::env::var_os("ATLAS_SESSION_FILE")
            .filter(|v| !v.is_empty())
            .map_or_else(default_session_file, PathBuf::from);
        let timeouts = Timeouts {
            request_secs: env_parse_u64("ATLAS_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("ATLAS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { supabase_url, anon_key, admin_emails, session_file, site_url, timeouts })
    }

    #[must_use]
    pub fn admin_policy(&self) -> AdminPolicy {
        AdminPolicy::allow_list(self.admin_emails.iter().cloned())
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn parse_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidUrl { var, value: raw.to_string() })
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn default_session_file() -> PathBuf {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map_or_else(
            || PathBuf::from(FALLBACK_SESSION_FILE),
            |home| PathBuf::from(home).join(".atlas").join(SESSION_FILE_NAME),
        )
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

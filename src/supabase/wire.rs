//! GoTrue and PostgREST wire shapes.
//!
//! Pure parsing and URL building, kept apart from the HTTP client so it can
//! be tested without a server.

use auth::gateway::SignUpOutcome;
use auth::{AuthUser, GatewayError, Profile, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Embedded select used for profile reads: the row plus its company.
pub const PROFILE_SELECT: &str = "*,company:companies(*)";
/// Path of the password-reset landing page on the web site.
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

// =============================================================================
// URLS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self { base: base_url.trim_end_matches('/').to_string() }
    }

    pub fn password_grant(&self) -> String {
        format!("{}/auth/v1/token?grant_type=password", self.base)
    }

    pub fn refresh_grant(&self) -> String {
        format!("{}/auth/v1/token?grant_type=refresh_token", self.base)
    }

    pub fn signup(&self) -> String {
        format!("{}/auth/v1/signup", self.base)
    }

    pub fn logout(&self) -> String {
        format!("{}/auth/v1/logout", self.base)
    }

    pub fn user(&self) -> String {
        format!("{}/auth/v1/user", self.base)
    }

    pub fn recover(&self) -> String {
        format!("{}/auth/v1/recover", self.base)
    }

    /// `users` row filter for one id.
    pub fn user_row(&self, user_id: Uuid) -> String {
        format!("{}/rest/v1/users?id=eq.{user_id}", self.base)
    }
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: &'a serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
pub struct RecoverRequest<'a> {
    pub email: &'a str,
}

#[derive(Serialize)]
pub struct PasswordUpdate<'a> {
    pub password: &'a str,
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct EmailRow {
    email: Option<String>,
}

/// Human-readable message out of a GoTrue or PostgREST error body.
pub fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    [parsed.msg, parsed.message, parsed.error_description, parsed.error]
        .into_iter()
        .flatten()
        .find(|m| !m.trim().is_empty())
}

/// Map a non-success response onto [`GatewayError::Rejected`].
pub fn rejected(status: u16, body: &str) -> GatewayError {
    let message = error_message(body).unwrap_or_default();
    GatewayError::Rejected { status, message }
}

/// Parse a token grant response, filling `expires_at` from `expires_in` when
/// the server omits it.
pub fn parse_session(body: &str, now_unix: i64) -> Result<Session, GatewayError> {
    let mut session: Session = serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if session.expires_at.is_none() {
        session.expires_at = Some(now_unix.saturating_add(session.expires_in));
    }
    Ok(session)
}

pub fn parse_user(body: &str) -> Result<AuthUser, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Sign-up answers with a full session when email confirmation is off and
/// with the bare user otherwise.
pub fn parse_sign_up(body: &str, now_unix: i64) -> Result<SignUpOutcome, GatewayError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if value.get("access_token").is_some() {
        let session = parse_session(body, now_unix)?;
        return Ok(SignUpOutcome { user: Some(session.user.clone()), session: Some(session) });
    }
    let user = value
        .get("id")
        .map(|_| serde_json::from_value::<AuthUser>(value.clone()))
        .transpose()
        .map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(SignUpOutcome { user, session: None })
}

/// First row of a profile select, if any.
pub fn parse_profile_rows(body: &str) -> Result<Option<Profile>, GatewayError> {
    let rows: Vec<Profile> = serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(rows.into_iter().next())
}

pub fn parse_email_rows(body: &str) -> Result<Option<String>, GatewayError> {
    let rows: Vec<EmailRow> = serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(rows.into_iter().next().and_then(|row| row.email))
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;

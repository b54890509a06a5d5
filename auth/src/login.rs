//! Credential flows: sign-in, sign-up and password maintenance.
//!
//! These are the only paths where gateway failures reach the user, as
//! form-level messages. Successful sign-in is not written into the store
//! here; the gateway's `SIGNED_IN` notification does that.

use std::fmt;

use serde_json::{Map as JsonMap, Value};

use crate::gateway::{IdentityGateway, SignUpOutcome};
use crate::guard::DEFAULT_LANDING_PATH;
use crate::types::Session;

pub const MIN_PASSWORD_LEN: usize = 6;

const SIGN_IN_FALLBACK: &str = "An unexpected error occurred during sign in";
const SIGN_UP_FALLBACK: &str = "An unexpected error occurred during sign up";
const RESET_FALLBACK: &str = "An unexpected error occurred while resetting password";
const UPDATE_PASSWORD_FALLBACK: &str = "An unexpected error occurred while updating password";

// =============================================================================
// FORM
// =============================================================================

/// Per-field and general messages for a credentials form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub email: Option<String>,
    pub password: Option<String>,
    pub general: Option<String>,
}

impl FormErrors {
    #[must_use]
    pub fn general(message: impl Into<String>) -> Self {
        Self { general: Some(message.into()), ..Self::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.general.is_none()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = [&self.general, &self.email, &self.password]
            .into_iter()
            .filter_map(|m| m.as_deref())
            .collect();
        f.write_str(&messages.join("; "))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// # Errors
    ///
    /// Returns the field messages when either field is missing or malformed.
    pub fn validate(&self) -> Result<(), FormErrors> {
        let errors = FormErrors {
            email: email_error(&self.email),
            password: password_error(&self.password),
            general: None,
        };
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn email_error(email: &str) -> Option<String> {
    if email.is_empty() {
        Some("Email is required".to_owned())
    } else if !looks_like_email(email) {
        Some("Please enter a valid email address".to_owned())
    } else {
        None
    }
}

fn password_error(password: &str) -> Option<String> {
    if password.is_empty() {
        Some("Password is required".to_owned())
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some(format!("Password must be at least {MIN_PASSWORD_LEN} characters"))
    } else {
        None
    }
}

/// Loose shape check: some `x@y.z` run with no whitespace inside it.
#[must_use]
pub fn looks_like_email(email: &str) -> bool {
    email.match_indices('@').any(|(at, _)| {
        let has_local = email[..at]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_whitespace());
        let domain = email[at + 1..]
            .split(char::is_whitespace)
            .next()
            .unwrap_or_default();
        has_local
            && domain
                .match_indices('.')
                .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
    })
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    /// The form did not pass local validation; nothing was sent.
    #[error("{0}")]
    Invalid(FormErrors),
    /// The gateway refused or failed the request.
    #[error("{0}")]
    Rejected(String),
}

impl LoginError {
    #[must_use]
    pub fn form_errors(&self) -> FormErrors {
        match self {
            Self::Invalid(errors) => errors.clone(),
            Self::Rejected(message) => FormErrors::general(message.clone()),
        }
    }
}

// =============================================================================
// FLOWS
// =============================================================================

/// Validate and submit credentials.
///
/// # Errors
///
/// [`LoginError::Invalid`] for local validation failures,
/// [`LoginError::Rejected`] carrying a user-facing message otherwise.
pub async fn sign_in(gateway: &dyn IdentityGateway, credentials: &Credentials) -> Result<Session, LoginError> {
    credentials.validate().map_err(LoginError::Invalid)?;
    let email = credentials.email.trim();
    gateway
        .sign_in(email, &credentials.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "sign in rejected");
            LoginError::Rejected(e.user_message(SIGN_IN_FALLBACK))
        })
}

/// Register a new account. `metadata` lands in the user's `user_metadata`.
///
/// # Errors
///
/// Same as [`sign_in`].
pub async fn sign_up(
    gateway: &dyn IdentityGateway,
    credentials: &Credentials,
    metadata: JsonMap<String, Value>,
) -> Result<SignUpOutcome, LoginError> {
    credentials.validate().map_err(LoginError::Invalid)?;
    gateway
        .sign_up(credentials.email.trim(), &credentials.password, metadata)
        .await
        .map_err(|e| LoginError::Rejected(e.user_message(SIGN_UP_FALLBACK)))
}

/// # Errors
///
/// [`LoginError::Invalid`] for a malformed email, otherwise the gateway's message.
pub async fn reset_password(gateway: &dyn IdentityGateway, email: &str) -> Result<(), LoginError> {
    if let Some(message) = email_error(email) {
        return Err(LoginError::Invalid(FormErrors { email: Some(message), ..FormErrors::default() }));
    }
    gateway
        .reset_password(email.trim())
        .await
        .map_err(|e| LoginError::Rejected(e.user_message(RESET_FALLBACK)))
}

/// # Errors
///
/// [`LoginError::Invalid`] for a too-short password, otherwise the gateway's message.
pub async fn update_password(gateway: &dyn IdentityGateway, new_password: &str) -> Result<(), LoginError> {
    if let Some(message) = password_error(new_password) {
        return Err(LoginError::Invalid(FormErrors { password: Some(message), ..FormErrors::default() }));
    }
    gateway
        .update_password(new_password)
        .await
        .map(|_| ())
        .map_err(|e| LoginError::Rejected(e.user_message(UPDATE_PASSWORD_FALLBACK)))
}

/// Where to go after signing in: the `redirect` target when it is a local
/// path, the dashboard otherwise.
#[must_use]
pub fn post_login_target(redirect: Option<&str>) -> String {
    match redirect {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_owned(),
        _ => DEFAULT_LANDING_PATH.to_owned(),
    }
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;

//! Terminal renditions of the Atlas pages.
//!
//! Pages are plain functions of the auth snapshot. Navigation decisions are
//! returned as [`Page::Redirect`] and carried out by the router.

pub mod admin;
pub mod dashboard;
pub mod home;
pub mod login;
pub mod logout;

pub const BRAND: &str = "The Atlas";

/// Outcome of visiting a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Screen(String),
    Redirect(String),
}

/// Spinner stand-in while auth state is resolving.
#[must_use]
pub fn loading() -> String {
    "Loading...".to_string()
}

#[must_use]
pub fn redirecting() -> String {
    "Redirecting...".to_string()
}

/// Forbidden screen for `path`, with the command that escapes it.
#[must_use]
pub fn access_denied(path: &str) -> String {
    format!(
        "Access Denied\n\n\
         You don't have permission to access this page. Administrator privileges are required.\n\n  \
         [Go to Dashboard]  atlas open '{path}' --escape"
    )
}

#[must_use]
pub fn not_found(path: &str) -> String {
    format!("404: nothing at {path}")
}

/// Page header: brand, signed-in email and admin badge.
fn header(email: &str, is_admin: bool) -> String {
    let badge = if is_admin { " [Admin]" } else { "" };
    format!("{BRAND}    Welcome, {email}{badge}")
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

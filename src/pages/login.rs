//! `/auth/login`. Already-authenticated visitors go straight to their target.

use auth::AuthSnapshot;
use auth::guard::redirect_param;
use auth::login::{FormErrors, post_login_target};

use super::{BRAND, Page};

#[must_use]
pub fn visit(snapshot: &AuthSnapshot, query: &str) -> Page {
    let redirect = redirect_param(query);
    if snapshot.is_authenticated() {
        return Page::Redirect(post_login_target(redirect.as_deref()));
    }
    Page::Screen(form(redirect.as_deref(), None))
}

/// Sign-in prompt, with any messages from a failed attempt.
#[must_use]
pub fn form(redirect: Option<&str>, errors: Option<&FormErrors>) -> String {
    let mut lines = vec![
        format!("Sign in to {BRAND}"),
        "Sign in to access your mapping dashboard".to_string(),
        String::new(),
    ];
    if let Some(errors) = errors {
        lines.extend(errors.general.iter().map(|m| format!("! {m}")));
        lines.extend(errors.email.iter().map(|m| format!("Email: {m}")));
        lines.extend(errors.password.iter().map(|m| format!("Password: {m}")));
        lines.push(String::new());
    }
    let flag = redirect.map(|r| format!(" --redirect '{r}'")).unwrap_or_default();
    lines.push(format!("  atlas login --email <email>{flag}"));
    lines.push("  Forgot your password?  atlas reset-password --email <email>".to_string());
    lines.join("\n")
}

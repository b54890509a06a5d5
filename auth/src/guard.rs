//! Route guard: gates a protected page on the current auth state.
//!
//! Per evaluation the guard is in one of four states:
//!
//! | state          | condition                                   | render                 |
//! |----------------|---------------------------------------------|------------------------|
//! | `Loading`      | `loading`                                   | waiting indicator      |
//! | `Unauthorized` | not authenticated                           | waiting + one redirect |
//! | `Forbidden`    | admin required, authenticated, not admin    | access denied          |
//! | `Authorized`   | otherwise                                   | protected content      |
//!
//! The redirect for `Unauthorized` fires once per transition into that state;
//! re-rendering with unchanged inputs does not navigate again.

use std::borrow::Cow;

use tokio::sync::watch;

use crate::store::AuthSnapshot;

pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
/// Where the access-denied escape action leads.
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardOptions {
    pub require_admin: bool,
    pub redirect_to: String,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self { require_admin: false, redirect_to: DEFAULT_LOGIN_PATH.to_owned() }
    }
}

impl GuardOptions {
    #[must_use]
    pub fn admin() -> Self {
        Self { require_admin: true, ..Self::default() }
    }

    #[must_use]
    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.redirect_to = target.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthorized,
    Forbidden,
    Authorized,
}

impl GuardState {
    #[must_use]
    pub fn evaluate(snapshot: &AuthSnapshot, options: &GuardOptions) -> Self {
        if snapshot.loading {
            Self::Loading
        } else if !snapshot.is_authenticated() {
            Self::Unauthorized
        } else if options.require_admin && !snapshot.is_admin {
            Self::Forbidden
        } else {
            Self::Authorized
        }
    }
}

/// Why the guard is showing the waiting indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waiting {
    Loading,
    Redirecting,
}

/// What the page should draw for the current evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Render {
    Waiting(Waiting),
    AccessDenied,
    Content,
}

/// Client-side navigation as seen by the guard.
pub trait Navigator {
    /// Current path including any query string.
    fn current_path(&self) -> String;

    fn push(&self, url: &str);
}

impl<N: Navigator + ?Sized> Navigator for &N {
    fn current_path(&self) -> String {
        (**self).current_path()
    }

    fn push(&self, url: &str) {
        (**self).push(url);
    }
}

/// Login URL carrying `current_path` as a percent-encoded `redirect` parameter.
#[must_use]
pub fn login_redirect_url(redirect_to: &str, current_path: &str) -> String {
    let separator = if redirect_to.contains('?') { '&' } else { '?' };
    format!("{redirect_to}{separator}{REDIRECT_PARAM}={}", encode_component(current_path))
}

/// Marks a URI component may carry unescaped; `urlencoding` escapes them.
const UNRESERVED_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
///
/// A literal `%` encodes as `%25`, so the escapes put back here can only
/// have come from the marks themselves.
fn encode_component(value: &str) -> String {
    UNRESERVED_MARKS
        .iter()
        .fold(urlencoding::encode(value).into_owned(), |encoded, (escape, mark)| {
            encoded.replace(escape, mark)
        })
}

/// Read the `redirect` parameter back out of a query string.
#[must_use]
pub fn redirect_param(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == REDIRECT_PARAM)
        .and_then(|(_, value)| urlencoding::decode(value).ok().map(Cow::into_owned))
        .filter(|value| !value.is_empty())
}

/// `true` once loading has finished and nobody is signed in.
#[must_use]
pub fn should_redirect_unauthenticated(snapshot: &AuthSnapshot) -> bool {
    !snapshot.loading && !snapshot.is_authenticated()
}

/// `true` once loading has finished and the user is not a signed-in admin.
#[must_use]
pub fn should_redirect_non_admin(snapshot: &AuthSnapshot) -> bool {
    !snapshot.loading && (!snapshot.is_authenticated() || !snapshot.is_admin)
}

/// Stateful guard for one mounted protected subtree.
pub struct RouteGuard<N> {
    options: GuardOptions,
    navigator: N,
    last: Option<GuardState>,
    redirected: bool,
}

impl<N: Navigator> RouteGuard<N> {
    pub fn new(options: GuardOptions, navigator: N) -> Self {
        Self { options, navigator, last: None, redirected: false }
    }

    #[must_use]
    pub fn state(&self) -> Option<GuardState> {
        self.last
    }

    #[must_use]
    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    /// Evaluate `snapshot`, performing the unauthorized redirect if due.
    pub fn render(&mut self, snapshot: &AuthSnapshot) -> Render {
        let state = GuardState::evaluate(snapshot, &self.options);
        if self.last != Some(state) {
            self.redirected = false;
        }
        self.last = Some(state);

        match state {
            GuardState::Loading => Render::Waiting(Waiting::Loading),
            GuardState::Unauthorized => {
                if !self.redirected {
                    self.redirected = true;
                    let url = login_redirect_url(&self.options.redirect_to, &self.navigator.current_path());
                    tracing::debug!(%url, "redirecting unauthenticated visitor");
                    self.navigator.push(&url);
                }
                Render::Waiting(Waiting::Redirecting)
            }
            GuardState::Forbidden => Render::AccessDenied,
            GuardState::Authorized => Render::Content,
        }
    }

    /// Re-render on every state change until loading has finished.
    pub async fn settle(&mut self, rx: &mut watch::Receiver<AuthSnapshot>) -> Render {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let render = self.render(&snapshot);
            if render != Render::Waiting(Waiting::Loading) || rx.changed().await.is_err() {
                return render;
            }
        }
    }

    /// Escape action of the access-denied view.
    pub fn escape(&self) {
        self.navigator.push(DEFAULT_LANDING_PATH);
    }

    #[must_use]
    pub fn into_navigator(self) -> N {
        self.navigator
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

//! Terminal router: resolves a path to a page, runs the route guard for
//! protected pages and follows redirects until a screen is produced.

use std::sync::{Mutex, PoisonError};

use auth::guard::{DEFAULT_LOGIN_PATH, Waiting};
use auth::{AuthContext, AuthSnapshot, GuardOptions, Navigator, Render, RouteGuard};

use crate::pages::{self, Page, admin, dashboard, home, login, logout};

/// Redirects followed before giving up on a visit.
pub const MAX_HOPS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("too many redirects ({hops}) while opening {path}")]
    TooManyRedirects { hops: usize, path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Logout,
    Dashboard,
    Admin,
    NotFound,
}

impl Route {
    /// Route for a path, ignoring any query string and trailing slash.
    #[must_use]
    pub fn resolve(location: &str) -> Self {
        let (path, _) = split_location(location);
        match path.trim_end_matches('/') {
            "" => Self::Home,
            DEFAULT_LOGIN_PATH => Self::Login,
            "/auth/logout" => Self::Logout,
            "/dashboard" => Self::Dashboard,
            "/admin" => Self::Admin,
            _ => Self::NotFound,
        }
    }
}

fn split_location(location: &str) -> (&str, &str) {
    location.split_once('?').unwrap_or((location, ""))
}

/// Result of opening a path: where the visit ended and what it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub path: String,
    pub screen: String,
    /// Every location visited, starting with the one requested.
    pub trail: Vec<String>,
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Location bar for the terminal session.
#[derive(Debug, Default)]
pub struct TerminalNavigator {
    location: Mutex<String>,
    pending: Mutex<Option<String>>,
}

impl TerminalNavigator {
    fn set_location(&self, location: &str) {
        *lock(&self.location) = location.to_string();
    }

    fn take_pending(&self) -> Option<String> {
        lock(&self.pending).take()
    }
}

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        lock(&self.location).clone()
    }

    fn push(&self, url: &str) {
        *lock(&self.pending) = Some(url.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// ROUTER
// =============================================================================

pub struct TerminalRouter {
    auth: AuthContext,
    navigator: TerminalNavigator,
    escape_denied: bool,
}

impl TerminalRouter {
    #[must_use]
    pub fn new(auth: AuthContext) -> Self {
        Self { auth, navigator: TerminalNavigator::default(), escape_denied: false }
    }

    /// Take the access-denied escape action instead of showing the denial.
    #[must_use]
    pub fn escape_denied(mut self, escape: bool) -> Self {
        self.escape_denied = escape;
        self
    }

    /// Open `location` and follow redirects to the screen it settles on.
    ///
    /// # Errors
    ///
    /// [`RouteError::TooManyRedirects`] after [`MAX_HOPS`] redirects.
    pub async fn open(&self, location: &str) -> Result<Visit, RouteError> {
        let mut trail = vec![location.to_string()];
        let mut current = location.to_string();

        for _ in 0..=MAX_HOPS {
            self.navigator.set_location(&current);
            match self.visit(&current).await {
                Page::Screen(screen) => return Ok(Visit { path: current, screen, trail }),
                Page::Redirect(next) => {
                    tracing::debug!(from = %current, to = %next, "redirect");
                    trail.push(next.clone());
                    current = next;
                }
            }
        }
        Err(RouteError::TooManyRedirects { hops: MAX_HOPS, path: location.to_string() })
    }

    async fn visit(&self, location: &str) -> Page {
        let (path, query) = split_location(location);
        match Route::resolve(location) {
            Route::Home => Page::Screen(home::render()),
            Route::Login => login::visit(&self.auth.ready().await, query),
            Route::Logout => logout::visit(&self.auth).await,
            Route::Dashboard => self.guarded(path, GuardOptions::default(), dashboard::render).await,
            Route::Admin => self.guarded(path, GuardOptions::admin(), admin::render).await,
            Route::NotFound => Page::Screen(pages::not_found(path)),
        }
    }

    async fn guarded(&self, path: &str, options: GuardOptions, content: fn(&AuthSnapshot) -> String) -> Page {
        let mut guard = RouteGuard::new(options, &self.navigator);
        let mut rx = self.auth.subscribe();

        match guard.settle(&mut rx).await {
            Render::Content => Page::Screen(content(&self.auth.snapshot())),
            Render::AccessDenied if self.escape_denied => {
                guard.escape();
                self.follow_push(pages::access_denied(path))
            }
            Render::AccessDenied => Page::Screen(pages::access_denied(path)),
            Render::Waiting(Waiting::Redirecting) => self.follow_push(pages::redirecting()),
            Render::Waiting(Waiting::Loading) => Page::Screen(pages::loading()),
        }
    }

    fn follow_push(&self, fallback: String) -> Page {
        self.navigator
            .take_pending()
            .map_or(Page::Screen(fallback), Page::Redirect)
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;

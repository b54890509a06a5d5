//! Authorization context: the read-only view and actions handed to pages.
//!
//! DESIGN
//! ======
//! [`AuthProvider`] is built once at the composition root and owns the
//! running [`SessionStore`]; dropping it (or calling
//! [`AuthProvider::shutdown`]) releases the gateway subscription.
//! [`AuthContext`] is the cheap cloneable handle consumers hold.
//!
//! Code that is not handed a context explicitly can run inside
//! [`AuthProvider::scope`] and call [`use_auth`]. Calling [`use_auth`] outside
//! a scope is a wiring bug and panics.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::admin::AdminPolicy;
use crate::gateway::{GatewayError, IdentityGateway, ProfileStore};
use crate::observe::AuthObserver;
use crate::store::{AuthSnapshot, SessionStore};
use crate::types::{AuthUser, Profile, ProfileUpdate, Session};

tokio::task_local! {
    static CURRENT: AuthContext;
}

/// Shared handle onto the application's auth state.
#[derive(Clone, Debug)]
pub struct AuthContext {
    store: SessionStore,
}

impl AuthContext {
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.store.snapshot()
    }

    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        self.snapshot().user
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.snapshot().session
    }

    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.snapshot().profile
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.snapshot().loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.snapshot().is_admin
    }

    /// Watch receiver for guards and pages that re-render on change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.store.subscribe()
    }

    /// Wait until the initial session check has finished.
    pub async fn ready(&self) -> AuthSnapshot {
        self.store.ready().await
    }

    pub async fn wait_until(&self, ready: impl FnMut(&AuthSnapshot) -> bool) -> AuthSnapshot {
        self.store.wait_until(ready).await
    }

    /// Gateway handle for flows that talk to it directly (sign-in, sign-up).
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn IdentityGateway> {
        self.store.gateway()
    }

    /// Sign out and clear local state. Never fails from the caller's view;
    /// once this resolves, [`AuthContext::is_authenticated`] is `false`.
    pub async fn sign_out(&self) {
        self.store.sign_out().await;
    }

    pub async fn refresh_profile(&self) {
        self.store.refresh_profile().await;
    }

    /// # Errors
    ///
    /// See [`SessionStore::update_profile`].
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), GatewayError> {
        self.store.update_profile(update).await
    }
}

/// Owner of the application-wide auth state.
#[derive(Debug)]
pub struct AuthProvider {
    context: AuthContext,
}

impl AuthProvider {
    /// Start the session store over the given gateway and policy.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn IdentityGateway>,
        profiles: Arc<dyn ProfileStore>,
        policy: AdminPolicy,
        observer: Arc<dyn AuthObserver>,
    ) -> Self {
        let store = SessionStore::builder(gateway, profiles)
            .admin_policy(policy)
            .observer(observer)
            .start();
        Self::from_store(store)
    }

    #[must_use]
    pub fn from_store(store: SessionStore) -> Self {
        Self { context: AuthContext { store } }
    }

    #[must_use]
    pub fn context(&self) -> AuthContext {
        self.context.clone()
    }

    /// Run `fut` with this provider's context available to [`use_auth`].
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT.scope(self.context(), fut).await
    }

    /// Release the subscription and wait for the listener to stop.
    pub async fn shutdown(self) {
        self.context.store.shutdown().await;
    }
}

impl Drop for AuthProvider {
    fn drop(&mut self) {
        self.context.store.abort();
    }
}

/// Context of the enclosing [`AuthProvider::scope`].
///
/// # Panics
///
/// Panics when called outside a provider scope.
#[must_use]
pub fn use_auth() -> AuthContext {
    try_use_auth().unwrap_or_else(|| panic!("use_auth must be used within an AuthProvider"))
}

#[must_use]
pub fn try_use_auth() -> Option<AuthContext> {
    CURRENT.try_with(AuthContext::clone).ok()
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

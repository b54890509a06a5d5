//! Session store: process-wide reactive cache of the signed-in user.
//!
//! DESIGN
//! ======
//! The cache is a `watch` channel of [`AuthSnapshot`]; every reader gets a
//! consistent snapshot and can await changes. A single listener task owns the
//! gateway subscription: it runs bootstrap first, then drains notifications
//! strictly in delivery order, so no two notification handlers overlap.
//! Notifications that arrive during bootstrap queue in the subscription
//! channel until bootstrap finishes.
//!
//! Profile refreshes are serialized by an async mutex. Each identity change
//! bumps an epoch; a refresh only lands if the epoch it started under is still
//! current and the store is not closed, so late completions after sign-out,
//! a user switch, or teardown are dropped instead of resurrecting stale state.
//!
//! ERROR HANDLING
//! ==============
//! Gateway failures in bootstrap, refresh and sign-out are reported to the
//! [`AuthObserver`] and otherwise swallowed: the store falls back to
//! `None`/`false` rather than blocking the UI.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::admin::AdminPolicy;
use crate::gateway::{AuthChange, GatewayError, IdentityGateway, ProfileStore, Subscription};
use crate::observe::{AuthObserver, AuthOp, StoreEvent, TracingObserver};
use crate::types::{AuthUser, Profile, ProfileUpdate, Session};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Point-in-time view of the auth state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub is_admin: bool,
    pub loading: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self { loading: true, ..Self::default() }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.email.as_deref())
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Collects the store's collaborators before [`SessionStoreBuilder::start`].
pub struct SessionStoreBuilder {
    gateway: Arc<dyn IdentityGateway>,
    profiles: Arc<dyn ProfileStore>,
    policy: AdminPolicy,
    observer: Arc<dyn AuthObserver>,
}

impl SessionStoreBuilder {
    #[must_use]
    pub fn admin_policy(mut self, policy: AdminPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn AuthObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Register the change listener and spawn the listener task.
    ///
    /// Must be called inside a tokio runtime. The listener is registered
    /// before this returns, so no notification emitted afterwards is missed.
    #[must_use]
    pub fn start(self) -> SessionStore {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        let inner = Arc::new(Inner {
            gateway: self.gateway,
            profiles: self.profiles,
            policy: self.policy,
            observer: self.observer,
            state,
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            refresh_lock: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        });

        let subscription = inner.gateway.on_auth_state_change();
        let task = tokio::spawn(Arc::clone(&inner).run(subscription));
        *inner.lock_listener() = Some(task);

        SessionStore { inner }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Handle to the running store. Cloning shares the same store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    #[must_use]
    pub fn builder(gateway: Arc<dyn IdentityGateway>, profiles: Arc<dyn ProfileStore>) -> SessionStoreBuilder {
        SessionStoreBuilder {
            gateway,
            profiles,
            policy: AdminPolicy::none(),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every subsequent state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    /// Wait until `ready` holds for the current state, then return it.
    pub async fn wait_until(&self, ready: impl FnMut(&AuthSnapshot) -> bool) -> AuthSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(ready).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Wait for `loading` to clear.
    pub async fn ready(&self) -> AuthSnapshot {
        self.wait_until(|s| !s.loading).await
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn IdentityGateway> {
        &self.inner.gateway
    }

    /// Re-fetch the profile and admin flag for the current user, or clear
    /// them when nobody is signed in.
    pub async fn refresh_profile(&self) {
        let (user_id, epoch) = {
            let state = self.inner.state.borrow();
            (state.user.as_ref().map(|u| u.id), self.inner.epoch.load(Ordering::SeqCst))
        };
        self.inner.derive_profile(user_id, epoch).await;
    }

    /// Write a partial profile update for the signed-in user, then refresh.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NoSession`] when nobody is signed in, or the
    /// profile store's error when the write fails.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), GatewayError> {
        let user_id = self
            .inner
            .state
            .borrow()
            .user
            .as_ref()
            .map(|u| u.id)
            .ok_or(GatewayError::NoSession)?;
        self.inner.profiles.update_profile(user_id, update).await?;
        self.refresh_profile().await;
        Ok(())
    }

    /// Sign out at the gateway and clear local state whatever the outcome.
    pub async fn sign_out(&self) {
        self.inner.set_loading(true);
        if let Err(error) = self.inner.gateway.sign_out().await {
            self.inner.report(AuthOp::SignOut, error);
        }
        self.inner.replace_identity(None, None);
        self.inner.set_loading(false);
        self.inner.observer.observe(&StoreEvent::SignedOut);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Release the change subscription and wait for the listener task to stop.
    pub async fn shutdown(&self) {
        if let Some(task) = self.inner.close() {
            task.abort();
            let _ = task.await;
            self.inner.observer.observe(&StoreEvent::TornDown);
        }
    }

    /// Non-blocking teardown for drop paths. The subscription is released
    /// once the runtime reaps the aborted task.
    pub fn abort(&self) {
        if let Some(task) = self.inner.close() {
            task.abort();
            self.inner.observer.observe(&StoreEvent::TornDown);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.borrow())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// INTERNALS
// =============================================================================

struct Inner {
    gateway: Arc<dyn IdentityGateway>,
    profiles: Arc<dyn ProfileStore>,
    policy: AdminPolicy,
    observer: Arc<dyn AuthObserver>,
    state: watch::Sender<AuthSnapshot>,
    epoch: AtomicU64,
    closed: AtomicBool,
    refresh_lock: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Clears `loading` when bootstrap ends, however it ends.
struct LoadingGuard<'a> {
    inner: &'a Inner,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.inner.set_loading(false);
        let authenticated = self.inner.state.borrow().is_authenticated();
        self.inner
            .observer
            .observe(&StoreEvent::BootstrapFinished { authenticated });
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut subscription: Subscription) {
        self.bootstrap().await;
        while let Some(change) = subscription.next().await {
            if self.is_closed() {
                break;
            }
            self.apply_change(change).await;
        }
    }

    async fn bootstrap(&self) {
        let _loading = LoadingGuard { inner: self };

        let (session, user) = tokio::join!(self.gateway.current_session(), self.gateway.current_user());
        let session = self.settle(AuthOp::CurrentSession, session);
        let user = self.settle(AuthOp::CurrentUser, user);
        // A session the gateway no longer vouches for is not restored.
        let session = session.filter(|_| user.is_some());

        let user_id = user.as_ref().map(|u| u.id);
        let epoch = self.replace_identity(session, user);
        self.derive_profile(user_id, epoch).await;
    }

    async fn apply_change(&self, change: AuthChange) {
        let user = change.session.as_ref().map(|s| s.user.clone());
        let user_id = user.as_ref().map(|u| u.id);
        tracing::debug!(event = change.event.as_str(), user_id = ?user_id, "auth change received");

        let epoch = self.replace_identity(change.session, user);
        self.derive_profile(user_id, epoch).await;
        self.set_loading(false);

        self.observer.observe(&StoreEvent::ChangeApplied {
            event: change.event,
            authenticated: user_id.is_some(),
        });
    }

    /// Swap session and user in one update and start a new epoch.
    ///
    /// Profile and admin flag are cleared whenever the user goes away or
    /// changes identity.
    fn replace_identity(&self, session: Option<Session>, user: Option<AuthUser>) -> u64 {
        let mut epoch = 0;
        self.state.send_modify(|state| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let same_user = match (&state.user, &user) {
                (Some(old), Some(new)) => old.id == new.id,
                _ => false,
            };
            if !same_user {
                state.profile = None;
                state.is_admin = false;
            }
            state.session = session;
            state.user = user;
        });
        epoch
    }

    async fn derive_profile(&self, user_id: Option<Uuid>, epoch: u64) {
        let Some(user_id) = user_id else {
            self.apply_profile(epoch, None, false);
            return;
        };

        let _serial = self.refresh_lock.lock().await;
        let profile = self.settle(AuthOp::GetProfile, self.profiles.get_profile(user_id).await);
        let is_admin = self
            .settle(AuthOp::LookupEmail, self.profiles.lookup_email(user_id).await)
            .is_some_and(|email| self.policy.is_admin(&email));

        if !self.apply_profile(epoch, profile, is_admin) {
            tracing::debug!(%user_id, "discarding stale profile refresh");
        }
    }

    fn apply_profile(&self, epoch: u64, profile: Option<Profile>, is_admin: bool) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            applied = true;
            if state.profile == profile && state.is_admin == is_admin {
                return false;
            }
            state.profile = profile;
            state.is_admin = is_admin;
            true
        });
        applied
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    fn settle<T: Default>(&self, op: AuthOp, result: Result<T, GatewayError>) -> T {
        result.unwrap_or_else(|error| {
            self.report(op, error);
            T::default()
        })
    }

    fn report(&self, op: AuthOp, error: GatewayError) {
        self.observer.observe(&StoreEvent::Failure { op, error });
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) -> Option<JoinHandle<()>> {
        self.closed.store(true, Ordering::SeqCst);
        self.lock_listener().take()
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

//! Identity gateway seam: the external collaborator that owns credentials,
//! token issuance, session storage and row-level data access.
//!
//! DESIGN
//! ======
//! The gateway is consumed through two object-safe traits so the store can
//! hold `Arc<dyn ...>` handles: [`IdentityGateway`] for auth calls and
//! [`ProfileStore`] for the `users` table. State-change notifications are
//! delivered over a per-subscriber unbounded channel wrapped in a
//! [`Subscription`], which unregisters itself when dropped.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{AuthEvent, AuthUser, Profile, ProfileUpdate, Session};

// =============================================================================
// ERROR
// =============================================================================

/// Failure of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response (network, TLS, timeout).
    #[error("gateway request failed: {0}")]
    Request(String),

    /// The gateway answered with an error status and a message meant for users.
    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected gateway response: {0}")]
    Decode(String),

    /// The call needs a signed-in session and there is none.
    #[error("no active session")]
    NoSession,

    /// Local session storage could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Message suitable for showing in a form.
    ///
    /// Gateway rejections carry their own wording (bad credentials, weak
    /// password, ...); anything else collapses to `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_owned(),
        }
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// One auth state-change notification.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    #[must_use]
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

type Release = Box<dyn FnOnce() + Send>;

/// Registration handle returned by [`IdentityGateway::on_auth_state_change`].
///
/// Changes arrive in delivery order through [`Subscription::next`]. The
/// registration is released by [`Subscription::unsubscribe`] or on drop,
/// whichever comes first.
pub struct Subscription {
    changes: mpsc::UnboundedReceiver<AuthChange>,
    release: Option<Release>,
}

impl Subscription {
    pub fn new(changes: mpsc::UnboundedReceiver<AuthChange>, release: impl FnOnce() + Send + 'static) -> Self {
        Self { changes, release: Some(Box::new(release)) }
    }

    /// Wait for the next change. `None` once the gateway side is gone.
    pub async fn next(&mut self) -> Option<AuthChange> {
        self.changes.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            self.changes.close();
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    senders: Vec<(u64, mpsc::UnboundedSender<AuthChange>)>,
}

/// Registry of change listeners for gateway implementations.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct ListenerSet {
    inner: Arc<Mutex<Listeners>>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and hand back its subscription.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut listeners = self.lock();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.senders.push((id, tx));
            id
        };
        let registry = self.clone();
        Subscription::new(rx, move || registry.remove(id))
    }

    /// Deliver a change to every live listener, pruning closed ones.
    pub fn emit(&self, change: &AuthChange) {
        let mut listeners = self.lock();
        listeners
            .senders
            .retain(|(_, tx)| tx.send(change.clone()).is_ok());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.lock().senders.retain(|(sid, _)| *sid != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// Result of a sign-up. `session` is `None` when the gateway requires email
/// confirmation before the first sign-in.
#[derive(Clone, Debug, PartialEq)]
pub struct SignUpOutcome {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
}

/// Authentication half of the identity gateway.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError>;

    async fn current_user(&self) -> Result<Option<AuthUser>, GatewayError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: JsonMap<String, Value>,
    ) -> Result<SignUpOutcome, GatewayError>;

    async fn sign_out(&self) -> Result<(), GatewayError>;

    /// Send a password-recovery email.
    async fn reset_password(&self, email: &str) -> Result<(), GatewayError>;

    async fn update_password(&self, new_password: &str) -> Result<AuthUser, GatewayError>;

    /// Register a change listener for the lifetime of the returned handle.
    fn on_auth_state_change(&self) -> Subscription;
}

/// Row access to the `users` table.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, GatewayError>;

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<(), GatewayError>;

    /// Email on record for `user_id`, used for admin allow-list checks.
    async fn lookup_email(&self, user_id: Uuid) -> Result<Option<String>, GatewayError>;
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;

//! Observability hook for the session store.
//!
//! Infrastructure failures during bootstrap, sign-out and profile refresh
//! never reach the UI; the store degrades to a logged-out-safe state instead.
//! They are reported here so they can still be logged or counted.

use crate::gateway::GatewayError;
use crate::types::AuthEvent;

/// Gateway call a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthOp {
    CurrentSession,
    CurrentUser,
    SignOut,
    GetProfile,
    LookupEmail,
}

impl AuthOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentSession => "current_session",
            Self::CurrentUser => "current_user",
            Self::SignOut => "sign_out",
            Self::GetProfile => "get_profile",
            Self::LookupEmail => "lookup_email",
        }
    }
}

/// Lifecycle and failure events emitted by the store.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// A gateway call failed and the store fell back to defaults.
    Failure { op: AuthOp, error: GatewayError },
    /// Bootstrap released `loading`. Emitted exactly once per store.
    BootstrapFinished { authenticated: bool },
    /// A change notification was fully applied.
    ChangeApplied { event: AuthEvent, authenticated: bool },
    /// Local state was cleared by an explicit sign-out.
    SignedOut,
    /// The change subscription was released.
    TornDown,
}

pub trait AuthObserver: Send + Sync {
    fn observe(&self, event: &StoreEvent);
}

/// Default observer: structured `tracing` output.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl AuthObserver for TracingObserver {
    fn observe(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Failure { op, error } => {
                tracing::warn!(op = op.as_str(), error = %error, "auth gateway call failed; using defaults");
            }
            StoreEvent::BootstrapFinished { authenticated } => {
                tracing::debug!(authenticated, "session bootstrap finished");
            }
            StoreEvent::ChangeApplied { event, authenticated } => {
                tracing::debug!(event = event.as_str(), authenticated, "auth change applied");
            }
            StoreEvent::SignedOut => tracing::info!("signed out"),
            StoreEvent::TornDown => tracing::debug!("auth subscription released"),
        }
    }
}

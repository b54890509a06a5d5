//! # auth
//!
//! Client-side session and authorization coordination for the Atlas mapping
//! platform. Identity, token issuance and row storage belong to the identity
//! gateway (Supabase); this crate only keeps a local, reactive view of the
//! signed-in user and decides what a protected page may render.
//!
//! Data flows one way:
//!
//! ```text
//! IdentityGateway events -> SessionStore -> AuthContext -> RouteGuard -> render
//! ```
//!
//! The crate is UI-agnostic so the terminal shell (and any future web
//! client) can consume it directly.

pub mod admin;
pub mod context;
pub mod gateway;
pub mod guard;
pub mod login;
pub mod observe;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use admin::AdminPolicy;
pub use context::{AuthContext, AuthProvider, try_use_auth, use_auth};
pub use gateway::{AuthChange, GatewayError, IdentityGateway, ListenerSet, ProfileStore, Subscription};
pub use guard::{GuardOptions, GuardState, Navigator, Render, RouteGuard};
pub use observe::{AuthObserver, StoreEvent, TracingObserver};
pub use store::{AuthSnapshot, SessionStore};
pub use types::{AuthEvent, AuthUser, Profile, ProfileUpdate, Session};

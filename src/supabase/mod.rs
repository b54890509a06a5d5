//! Supabase-backed identity gateway.
//!
//! GoTrue (`/auth/v1`) handles credentials and tokens; PostgREST
//! (`/rest/v1`) serves the `users` rows. The current session lives in a
//! [`SessionFile`] and is refreshed on read once it is within
//! [`EXPIRY_MARGIN_SECS`] of expiring. A refresh the server refuses clears
//! the stored session and is announced as `SIGNED_OUT`.

pub mod storage;
pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use auth::gateway::SignUpOutcome;
use auth::{
    AuthChange, AuthEvent, AuthUser, GatewayError, IdentityGateway, ListenerSet, Profile, ProfileStore, ProfileUpdate,
    Session, Subscription,
};
use serde_json::{Map as JsonMap, Value};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::AtlasConfig;
pub use storage::SessionFile;
use wire::Endpoints;

/// Refresh sessions this close to expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    anon_key: String,
    site_url: String,
    storage: SessionFile,
    listeners: ListenerSet,
    /// Serializes reads and writes of the stored session.
    session_lock: Mutex<()>,
}

impl SupabaseClient {
    pub fn new(config: &AtlasConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        Ok(Self {
            http,
            endpoints: Endpoints::new(&config.supabase_url),
            anon_key: config.anon_key.clone(),
            site_url: config.site_url.clone(),
            storage: SessionFile::new(&config.session_file),
            listeners: ListenerSet::new(),
            session_lock: Mutex::new(()),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, GatewayError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(wire::rejected(status, &text));
        }
        Ok(text)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, GatewayError> {
        let body = self
            .send(
                self.http
                    .post(self.endpoints.refresh_grant())
                    .json(&wire::RefreshGrant { refresh_token }),
            )
            .await?;
        wire::parse_session(&body, now_unix())
    }

    async fn persist(&self, session: &Session) -> Result<(), GatewayError> {
        let _guard = self.session_lock.lock().await;
        self.storage.save(session).await
    }

    /// Token for PostgREST: the signed-in user's, or the anon key.
    async fn rest_bearer(&self) -> Result<String, GatewayError> {
        Ok(self
            .current_session()
            .await?
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token))
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        tracing::debug!(%event, listeners = self.listeners.len(), "auth state change");
        self.listeners.emit(&AuthChange::new(event, session));
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

// =============================================================================
// IDENTITY
// =============================================================================

#[async_trait]
impl IdentityGateway for SupabaseClient {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError> {
        let _guard = self.session_lock.lock().await;
        let Some(session) = self.storage.load().await? else {
            return Ok(None);
        };
        if !session.is_expired_at(now_unix(), EXPIRY_MARGIN_SECS) {
            return Ok(Some(session));
        }

        match self.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                self.storage.save(&fresh).await?;
                self.emit(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            // Only a refused credential ends the session; 408/429 and 5xx keep it.
            Err(e @ GatewayError::Rejected { status: 400 | 401 | 403, .. }) => {
                tracing::info!(user_id = %session.user.id, error = %e, "session refresh refused; signing out");
                self.storage.clear().await?;
                self.emit(AuthEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, GatewayError> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };
        let body = self
            .send(self.http.get(self.endpoints.user()).bearer_auth(&session.access_token))
            .await?;
        wire::parse_user(&body).map(Some)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let body = self
            .send(
                self.http
                    .post(self.endpoints.password_grant())
                    .json(&wire::PasswordGrant { email, password }),
            )
            .await?;
        let session = wire::parse_session(&body, now_unix())?;
        self.persist(&session).await?;
        tracing::info!(user_id = %session.user.id, "signed in");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: JsonMap<String, Value>,
    ) -> Result<SignUpOutcome, GatewayError> {
        let body = self
            .send(
                self.http
                    .post(self.endpoints.signup())
                    .json(&wire::SignUpRequest { email, password, data: &metadata }),
            )
            .await?;
        let outcome = wire::parse_sign_up(&body, now_unix())?;
        if let Some(session) = &outcome.session {
            self.persist(session).await?;
            self.emit(AuthEvent::SignedIn, Some(session.clone()));
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        let (remote, cleared) = {
            let _guard = self.session_lock.lock().await;
            let remote = match self.storage.load().await {
                Ok(Some(session)) => self
                    .send(self.http.post(self.endpoints.logout()).bearer_auth(&session.access_token))
                    .await
                    .map(|_| ()),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            (remote, self.storage.clear().await)
        };
        self.emit(AuthEvent::SignedOut, None);

        if let Err(e) = cleared {
            tracing::warn!(error = %e, "stored session could not be removed");
            return Err(e);
        }
        match remote {
            // The server already forgot the session.
            Err(GatewayError::Rejected { status: 401 | 403 | 404, .. }) => Ok(()),
            other => other,
        }
    }

    async fn reset_password(&self, email: &str) -> Result<(), GatewayError> {
        let redirect_to = format!("{}{}", self.site_url, wire::RESET_PASSWORD_PATH);
        self.send(
            self.http
                .post(self.endpoints.recover())
                .query(&[("redirect_to", redirect_to.as_str())])
                .json(&wire::RecoverRequest { email }),
        )
        .await
        .map(|_| ())
    }

    async fn update_password(&self, new_password: &str) -> Result<AuthUser, GatewayError> {
        let session = self.current_session().await?.ok_or(GatewayError::NoSession)?;
        let body = self
            .send(
                self.http
                    .put(self.endpoints.user())
                    .bearer_auth(&session.access_token)
                    .json(&wire::PasswordUpdate { password: new_password }),
            )
            .await?;
        let user = wire::parse_user(&body)?;
        let updated = Session { user: user.clone(), ..session };
        self.persist(&updated).await?;
        self.emit(AuthEvent::UserUpdated, Some(updated));
        Ok(user)
    }

    fn on_auth_state_change(&self) -> Subscription {
        self.listeners.subscribe()
    }
}

// =============================================================================
// PROFILES
// =============================================================================

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, GatewayError> {
        let bearer = self.rest_bearer().await?;
        let body = self
            .send(
                self.http
                    .get(self.endpoints.user_row(user_id))
                    .query(&[("select", wire::PROFILE_SELECT)])
                    .bearer_auth(bearer),
            )
            .await?;
        wire::parse_profile_rows(&body)
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<(), GatewayError> {
        if update.is_empty() {
            return Ok(());
        }
        let bearer = self.rest_bearer().await?;
        self.send(
            self.http
                .patch(self.endpoints.user_row(user_id))
                .header("Prefer", "return=minimal")
                .bearer_auth(bearer)
                .json(update),
        )
        .await
        .map(|_| ())
    }

    async fn lookup_email(&self, user_id: Uuid) -> Result<Option<String>, GatewayError> {
        let bearer = self.rest_bearer().await?;
        let body = self
            .send(
                self.http
                    .get(self.endpoints.user_row(user_id))
                    .query(&[("select", "email")])
                    .bearer_auth(bearer),
            )
            .await?;
        wire::parse_email_rows(&body)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

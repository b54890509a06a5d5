//! In-memory gateway and observer fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value};
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::admin::AdminPolicy;
use crate::gateway::{
    AuthChange, GatewayError, IdentityGateway, ListenerSet, ProfileStore, SignUpOutcome, Subscription,
};
use crate::observe::{AuthObserver, StoreEvent};
use crate::store::SessionStore;
use crate::types::{AuthEvent, AuthUser, Company, Profile, ProfileUpdate, Session};

pub const ADMIN_EMAIL: &str = "admin@yourdomain.com";

// =============================================================================
// FIXTURES
// =============================================================================

#[must_use]
pub fn user(email: &str) -> AuthUser {
    AuthUser { id: Uuid::new_v4(), email: Some(email.to_owned()), user_metadata: JsonMap::new() }
}

#[must_use]
pub fn session_for(user: &AuthUser) -> Session {
    Session {
        access_token: format!("access-{}", user.id),
        refresh_token: format!("refresh-{}", user.id),
        expires_in: 3600,
        expires_at: None,
        token_type: "bearer".into(),
        user: user.clone(),
    }
}

#[must_use]
pub fn profile_for(user: &AuthUser, company: Option<&str>) -> Profile {
    let company = company.map(|name| Company {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        projects: None,
    });
    Profile {
        id: user.id,
        email: user.email.clone().unwrap_or_default(),
        company_id: company.as_ref().map(|c| c.id),
        created_at: OffsetDateTime::UNIX_EPOCH,
        company,
    }
}

// =============================================================================
// FAKE BACKEND
// =============================================================================

/// Gateway + profile store backed by in-memory maps.
#[derive(Default)]
pub struct FakeBackend {
    pub listeners: ListenerSet,
    session: Mutex<Option<Session>>,
    accounts: Mutex<HashMap<String, (String, AuthUser)>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    profile_gate: Mutex<Option<Arc<Semaphore>>>,
    pub fail_current_session: AtomicBool,
    pub fail_current_user: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub fail_profiles: AtomicBool,
    pub sign_out_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an account that can sign in, with a matching profile row.
    pub fn add_account(&self, user: &AuthUser, password: &str, company: Option<&str>) {
        let email = user.email.clone().unwrap_or_default();
        self.accounts
            .lock()
            .unwrap()
            .insert(email, (password.to_owned(), user.clone()));
        self.put_profile(profile_for(user, company));
    }

    pub fn put_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.id, profile);
    }

    /// Pretend a session was restored from storage.
    pub fn restore_session(&self, session: Session) {
        *self.session.lock().unwrap() = Some(session);
    }

    /// Emit a change as the gateway would, updating the stored session.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        self.session.lock().unwrap().clone_from(&session);
        self.listeners.emit(&AuthChange::new(event, session));
    }

    /// Make profile reads wait for permits on the returned semaphore.
    pub fn hold_profiles(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.profile_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), GatewayError> {
        if flag.load(Ordering::SeqCst) {
            return Err(GatewayError::Request(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityGateway for FakeBackend {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError> {
        Self::check(&self.fail_current_session, "session")?;
        Ok(self.session.lock().unwrap().clone())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, GatewayError> {
        Self::check(&self.fail_current_user, "user")?;
        Ok(self.session.lock().unwrap().as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let account = self.accounts.lock().unwrap().get(email).cloned();
        match account {
            Some((expected, user)) if expected == password => {
                let session = session_for(&user);
                self.emit(AuthEvent::SignedIn, Some(session.clone()));
                Ok(session)
            }
            _ => Err(GatewayError::Rejected { status: 400, message: "Invalid login credentials".into() }),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: JsonMap<String, Value>,
    ) -> Result<SignUpOutcome, GatewayError> {
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(GatewayError::Rejected { status: 422, message: "User already registered".into() });
        }
        let new_user = user(email);
        self.add_account(&new_user, password, None);
        Ok(SignUpOutcome { user: Some(new_user), session: None })
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_sign_out, "logout")?;
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password(&self, _email: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn update_password(&self, _new_password: &str) -> Result<AuthUser, GatewayError> {
        let session = self.session.lock().unwrap().clone();
        session.map(|s| s.user).ok_or(GatewayError::NoSession)
    }

    fn on_auth_state_change(&self) -> Subscription {
        self.listeners.subscribe()
    }
}

#[async_trait]
impl ProfileStore for FakeBackend {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, GatewayError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.profile_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        Self::check(&self.fail_profiles, "profiles")?;
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<(), GatewayError> {
        Self::check(&self.fail_profiles, "profiles")?;
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| GatewayError::Rejected { status: 404, message: "profile not found".into() })?;
        if let Some(email) = &update.email {
            profile.email.clone_from(email);
        }
        if let Some(company_id) = update.company_id {
            profile.company_id = Some(company_id);
        }
        Ok(())
    }

    async fn lookup_email(&self, user_id: Uuid) -> Result<Option<String>, GatewayError> {
        Self::check(&self.fail_profiles, "profiles")?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|p| p.email.clone()))
    }
}

// =============================================================================
// RECORDING OBSERVER
// =============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StoreEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn count(&self, matches: impl Fn(&StoreEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches(e)).count()
    }

    /// Poll until at least `n` events match, failing the test after 2s.
    pub async fn wait_for(&self, n: usize, matches: impl Fn(&StoreEvent) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.count(&matches) < n {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {n} events: {:?}", self.events());
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    pub async fn wait_for_changes(&self, n: usize) {
        self.wait_for(n, |e| matches!(e, StoreEvent::ChangeApplied { .. }))
            .await;
    }
}

impl AuthObserver for RecordingObserver {
    fn observe(&self, event: &StoreEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// =============================================================================
// STORE HARNESS
// =============================================================================

/// Start a store over `backend` with the default admin allow-list.
#[must_use]
pub fn start_store(backend: &Arc<FakeBackend>) -> (SessionStore, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let store = SessionStore::builder(backend.clone(), backend.clone())
        .admin_policy(AdminPolicy::allow_list([ADMIN_EMAIL]))
        .observer(observer.clone())
        .start();
    (store, observer)
}

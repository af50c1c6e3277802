//! In-memory reference backend used by tests and the demo mode.
//!
//! Mirrors the hosted service's observable behavior: identity creation also
//! creates the profile row and signs the caller in as the new user, profile
//! deletion leaves the credential behind, and session changes are pushed on
//! a broadcast stream.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use quiz_core::Clock;
use quiz_core::model::{AttemptRecord, Role, UserId};

use crate::repository::{
    AuthEvent, AuthGateway, AuthSession, BackendError, NewAttemptRecord, ProfileRecord,
    ProfileRepository, ProfileUpdate, ProgressRepository, SignUpMetadata,
};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user_id: UserId,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    profiles: HashMap<UserId, ProfileRecord>,
    attempts: Vec<AttemptRecord>,
    session: Option<AuthSession>,
    fail_profile_reads: bool,
    fail_progress_reads: bool,
}

#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<AuthEvent>,
    clock: Clock,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::default_clock())
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, BackendError> {
        self.inner
            .lock()
            .map_err(|e| BackendError::Connection(e.to_string()))
    }

    fn emit(&self, event: AuthEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Insert an account + profile without signing anyone in or emitting
    /// events. Seeding hook for tests and the demo.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Auth` if the email is already registered.
    pub fn seed_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<UserId, BackendError> {
        let mut inner = self.lock()?;
        if inner.accounts.contains_key(email) {
            return Err(BackendError::Auth("User already registered".into()));
        }
        let id = UserId::random();
        inner.accounts.insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                user_id: id,
            },
        );
        inner.profiles.insert(
            id,
            ProfileRecord {
                id,
                name: name.to_owned(),
                email: email.to_owned(),
                role,
                child_id: None,
            },
        );
        Ok(id)
    }

    /// Append an attempt row directly. Seeding hook for tests and the demo.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the store is unavailable.
    pub fn seed_attempt(&self, record: AttemptRecord) -> Result<(), BackendError> {
        self.lock()?.attempts.push(record);
        Ok(())
    }

    /// Make subsequent profile reads fail, for stale-cache tests.
    pub fn set_fail_profile_reads(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_profile_reads = fail;
        }
    }

    /// Make subsequent progress reads fail, for stale-cache tests.
    pub fn set_fail_progress_reads(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_progress_reads = fail;
        }
    }

    #[must_use]
    pub fn current_session(&self) -> Option<AuthSession> {
        self.inner.lock().ok().and_then(|inner| inner.session.clone())
    }
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let session = {
            let mut inner = self.lock()?;
            let account = inner
                .accounts
                .get(email)
                .filter(|account| account.password == password)
                .cloned()
                .ok_or_else(|| BackendError::Auth("Invalid login credentials".into()))?;

            // a deleted profile does not revoke the credential; the session
            // simply has no profile behind it
            let session = AuthSession {
                user_id: account.user_id,
                email: email.to_owned(),
            };
            inner.session = Some(session.clone());
            session
        };

        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<AuthSession, BackendError> {
        let id = self.seed_user(email, password, &metadata.name, metadata.role)?;
        let session = AuthSession {
            user_id: id,
            email: email.to_owned(),
        };
        // identity creation authenticates as the new user
        self.lock()?.session = Some(session.clone());
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.lock()?.session = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, BackendError> {
        let inner = self.lock()?;
        if inner.fail_profile_reads {
            return Err(BackendError::Connection("injected read fault".into()));
        }
        let mut rows: Vec<_> = inner.profiles.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_profile(&self, id: UserId) -> Result<ProfileRecord, BackendError> {
        let inner = self.lock()?;
        if inner.fail_profile_reads {
            return Err(BackendError::Connection("injected read fault".into()));
        }
        inner.profiles.get(&id).cloned().ok_or(BackendError::NotFound)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<ProfileRecord>, BackendError> {
        Ok(self
            .list_profiles()
            .await?
            .into_iter()
            .filter(|row| row.role == role)
            .collect())
    }

    async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> Result<(), BackendError> {
        let mut inner = self.lock()?;
        if let Some(Some(child)) = update.child_id {
            // models the store's foreign key on child_id
            if !inner.profiles.contains_key(&child) {
                return Err(BackendError::NotFound);
            }
        }
        let row = inner.profiles.get_mut(&id).ok_or(BackendError::NotFound)?;
        if let Some(name) = update.name {
            row.name = name;
        }
        if let Some(role) = update.role {
            row.role = role;
        }
        if let Some(child_id) = update.child_id {
            row.child_id = child_id;
        }
        Ok(())
    }

    async fn delete_profile(&self, id: UserId) -> Result<(), BackendError> {
        // idempotent; the credential in `accounts` deliberately survives
        self.lock()?.profiles.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryBackend {
    async fn list_attempts(&self) -> Result<Vec<AttemptRecord>, BackendError> {
        let inner = self.lock()?;
        if inner.fail_progress_reads {
            return Err(BackendError::Connection("injected read fault".into()));
        }
        // insertion order is the stable order the normalizer contract needs
        Ok(inner.attempts.clone())
    }

    async fn insert_attempt(&self, record: NewAttemptRecord) -> Result<(), BackendError> {
        let created_at = self.clock.now();
        let mut inner = self.lock()?;
        inner.attempts.push(AttemptRecord {
            user_id: record.user_id,
            operation: record.operation,
            stage: record.stage,
            score: record.score,
            total_time: record.total_time,
            created_at,
        });
        Ok(())
    }

    async fn delete_attempts(&self, user_id: UserId) -> Result<(), BackendError> {
        self.lock()?.attempts.retain(|row| row.user_id != user_id);
        Ok(())
    }
}

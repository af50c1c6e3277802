use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use quiz_core::model::{AttemptRecord, Operation, Role, User, UserError, UserId};

/// Errors surfaced by backend adapters.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BackendError {
    /// Auth rejection whose message is shown to the user verbatim
    /// (bad credentials, duplicate email, ...).
    #[error("{0}")]
    Auth(String),

    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── AUTH ─────────────────────────────────────────────────────────────────────
//

/// An authenticated session as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: UserId,
    pub email: String,
}

/// Session-change notification pushed by the auth service.
///
/// The controller's auth listener is the only consumer that mutates
/// `current_user`; every other component treats these as read-only facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
}

/// Profile fields attached to identity creation.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpMetadata {
    pub name: String,
    pub role: Role,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Request a password sign-in. Success is reported through the event
    /// stream, not by the return value alone.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Auth` with the service's message on rejection.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;

    /// Create a new identity. The service creates the matching profile row
    /// and authenticates as the new user, which replaces any current session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Auth` for duplicate emails or rejected input.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<AuthSession, BackendError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the service rejects the request.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Subscribe to session-change events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

//
// ─── PROFILES ─────────────────────────────────────────────────────────────────
//

/// Wire shape of a profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub child_id: Option<UserId>,
}

impl ProfileRecord {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id(),
            name: user.name().to_owned(),
            email: user.email().to_owned(),
            role: user.role(),
            child_id: user.child_id(),
        }
    }

    /// Convert the row back into a domain `User`.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the row violates domain invariants.
    pub fn into_user(self) -> Result<User, UserError> {
        User::new(self.id, self.name, self.email, self.role, self.child_id)
    }
}

/// Partial profile update. Email and password are owned by the auth service
/// and can never be changed through this path.
///
/// `child_id` is doubly optional: `None` leaves the link untouched,
/// `Some(None)` clears it, `Some(Some(id))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub child_id: Option<Option<UserId>>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn link_child(child_id: UserId) -> Self {
        Self {
            child_id: Some(Some(child_id)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.child_id.is_none()
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// All profile rows, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on read failure.
    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, BackendError>;

    /// Single profile by id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if missing.
    async fn get_profile(&self, id: UserId) -> Result<ProfileRecord, BackendError>;

    /// Profiles filtered by role.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on read failure.
    async fn list_by_role(&self, role: Role) -> Result<Vec<ProfileRecord>, BackendError>;

    /// Apply a partial update to a profile row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the target — or a referenced
    /// `child_id` — does not exist.
    async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> Result<(), BackendError>;

    /// Remove a profile row. Idempotent: deleting an absent row succeeds.
    ///
    /// The underlying auth identity is *not* removed (that needs elevated
    /// server-side privilege); a deleted profile's credentials remain valid.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on write failure.
    async fn delete_profile(&self, id: UserId) -> Result<(), BackendError>;
}

//
// ─── PROGRESS ─────────────────────────────────────────────────────────────────
//

/// Insert shape for an attempt row; `created_at` is assigned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewAttemptRecord {
    pub user_id: UserId,
    pub operation: Operation,
    pub stage: u32,
    pub score: u8,
    pub total_time: f64,
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Every attempt row, ordered by creation time. The stable order is part
    /// of the contract: the progress normalizer is last-write-wins.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on read failure.
    async fn list_attempts(&self) -> Result<Vec<AttemptRecord>, BackendError>;

    /// Append one attempt row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on write failure.
    async fn insert_attempt(&self, record: NewAttemptRecord) -> Result<(), BackendError>;

    /// Remove all attempt rows for a user. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on write failure.
    async fn delete_attempts(&self, user_id: UserId) -> Result<(), BackendError>;
}

//
// ─── AGGREGATE ────────────────────────────────────────────────────────────────
//

/// Bundles the three backend surfaces behind trait objects so the controller
/// can swap implementations (in-memory vs hosted) freely.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthGateway>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Backend {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(crate::memory::InMemoryBackend::new())
    }

    #[must_use]
    pub fn from_memory(backend: crate::memory::InMemoryBackend) -> Self {
        let auth: Arc<dyn AuthGateway> = Arc::new(backend.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(backend.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(backend);
        Self {
            auth,
            profiles,
            progress,
        }
    }

    #[must_use]
    pub fn rest(backend: crate::rest::RestBackend) -> Self {
        let backend = Arc::new(backend);
        let auth: Arc<dyn AuthGateway> = backend.clone();
        let profiles: Arc<dyn ProfileRepository> = backend.clone();
        let progress: Arc<dyn ProgressRepository> = backend;
        Self {
            auth,
            profiles,
            progress,
        }
    }

    /// Session-change event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }
}

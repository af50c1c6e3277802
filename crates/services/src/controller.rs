//! Session/auth controller: owns the signed-in identity, the user and
//! progress caches, and the navigation cursor.
//!
//! All state goes out as snapshots on a `watch` channel; renderers and tests
//! subscribe instead of sharing mutable state. The auth-event listener is the
//! single writer of `current_user` — `login`/`logout` only issue requests, so
//! overlapping auth calls resolve to whichever event arrives last.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use backend::{
    AuthEvent, Backend, NewAttemptRecord, ProfileUpdate, SignUpMetadata,
};
use quiz_core::model::{QuizSettings, QuizSummary, Role, User, UserId};
use quiz_core::progress::{self, ProgressIndex};
use quiz_core::Clock;

use crate::error::{ControllerError, DeleteUserError, SignUpError};
use crate::nav::{self, View};

//
// ─── STATE SNAPSHOT ───────────────────────────────────────────────────────────
//

/// One published snapshot of controller state.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    pub is_loading: bool,
    pub current_user: Option<User>,
    pub users: Vec<User>,
    pub progress: ProgressIndex,
    pub view: View,
    pub quiz_settings: Option<QuizSettings>,
    pub quiz_summary: Option<QuizSummary>,
}

impl ControllerState {
    /// The view a renderer should actually draw, after the stale-navigation
    /// recovery rule.
    #[must_use]
    pub fn resolved_view(&self) -> View {
        nav::resolve(
            self.view,
            self.quiz_settings.is_some(),
            self.quiz_summary.is_some(),
        )
    }
}

/// Input for the signup saga. `child_id` is only honored for parents.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub child_id: Option<UserId>,
}

//
// ─── CONTROLLER ───────────────────────────────────────────────────────────────
//

pub struct SessionController {
    backend: Backend,
    clock: Clock,
    state: watch::Sender<ControllerState>,
}

impl SessionController {
    #[must_use]
    pub fn new(backend: Backend, clock: Clock) -> Arc<Self> {
        let (state, _) = watch::channel(ControllerState::default());
        Arc::new(Self {
            backend,
            clock,
            state,
        })
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Current snapshot, cloned out of the channel.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    /// Spawn the task that consumes session-change events from the backend.
    ///
    /// This task is the only writer of `current_user` and the only place
    /// sign-out clears the caches.
    pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut events = controller.backend.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.apply_auth_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // last event wins anyway; keep reading
                        tracing::warn!(skipped, "auth event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// React to one session-change event. Normally driven by the listener
    /// task; exposed so embedders can run their own event loop.
    pub async fn apply_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                self.state.send_modify(|s| s.is_loading = true);
                let loaded = self
                    .backend
                    .profiles
                    .get_profile(session.user_id)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|row| row.into_user().map_err(|e| e.to_string()));

                match loaded {
                    Ok(user) => {
                        self.state.send_modify(|s| {
                            s.current_user = Some(user);
                            s.view = View::Dashboard;
                            s.is_loading = false;
                        });
                        self.refresh_users().await;
                        self.refresh_progress().await;
                    }
                    Err(error) => {
                        // e.g. a soft-deleted profile authenticating; stay
                        // signed out rather than show a broken dashboard
                        tracing::warn!(%error, "profile load failed after sign-in");
                        self.state.send_modify(|s| s.is_loading = false);
                    }
                }
            }
            AuthEvent::SignedOut => {
                self.state.send_modify(|s| {
                    s.current_user = None;
                    s.users.clear();
                    s.progress = ProgressIndex::default();
                    s.quiz_settings = None;
                    s.quiz_summary = None;
                    s.view = View::Login;
                    s.is_loading = false;
                });
            }
        }
    }

    //
    // ─── AUTH REQUESTS ────────────────────────────────────────────────────
    //

    /// Request a sign-in. Does not flip `current_user`; that happens only
    /// when the resulting auth event arrives.
    ///
    /// # Errors
    ///
    /// Returns the auth service's rejection verbatim.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ControllerError> {
        self.state.send_modify(|s| s.is_loading = true);
        let result = self.backend.auth.sign_in(email, password).await;
        self.state.send_modify(|s| s.is_loading = false);
        result.map(|_session| ()).map_err(Into::into)
    }

    /// Request a sign-out. Caches clear when the event arrives.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` if the service rejects the request.
    pub async fn logout(&self) -> Result<(), ControllerError> {
        self.backend.auth.sign_out().await.map_err(Into::into)
    }

    /// Two-phase signup: create the identity, then (for a parent with a
    /// `child_id`) link parent → child in a second call.
    ///
    /// # Errors
    ///
    /// `SignUpError::Auth` aborts with nothing created.
    /// `SignUpError::LinkFailed` means the account exists but is unlinked —
    /// a first-class partial outcome, never retried automatically.
    pub async fn sign_up(&self, new_user: NewUser) -> Result<(), SignUpError> {
        let metadata = SignUpMetadata {
            name: new_user.name.clone(),
            role: new_user.role,
        };
        let session = self
            .backend
            .auth
            .sign_up(&new_user.email, &new_user.password, metadata)
            .await?;

        if new_user.role == Role::Parent {
            if let Some(child) = new_user.child_id {
                self.backend
                    .profiles
                    .update_profile(session.user_id, ProfileUpdate::link_child(child))
                    .await
                    .map_err(|source| SignUpError::LinkFailed { source })?;
            }
        }
        Ok(())
    }

    //
    // ─── PRIVILEGED USER MANAGEMENT ───────────────────────────────────────
    //

    /// Admin-side user creation, reusing the signup saga.
    ///
    /// Known limitation of the client-only trust model: identity creation
    /// authenticates as the new user, so the caller's own session is
    /// replaced. Callers must warn the admin before invoking this.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sign_up`].
    pub async fn add_user(&self, new_user: NewUser) -> Result<(), SignUpError> {
        self.sign_up(new_user).await?;
        self.refresh_users().await;
        Ok(())
    }

    /// Edit name/role/child link on a profile. Email and password never
    /// change through this path.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` if the update is rejected.
    pub async fn update_user(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<(), ControllerError> {
        self.backend.profiles.update_profile(id, update).await?;
        self.refresh_users().await;
        Ok(())
    }

    /// Two-phase delete: profile row, then the user's attempt rows.
    ///
    /// The auth identity is *not* removed (server-side privilege); the
    /// deleted user could still authenticate but has no profile or progress.
    ///
    /// # Errors
    ///
    /// `DeleteUserError::CannotDeleteSelf` if `id` is the signed-in user.
    /// `DeleteUserError::ProgressCleanupFailed` if phase 2 failed after the
    /// profile was already gone.
    pub async fn delete_user(&self, id: UserId) -> Result<(), DeleteUserError> {
        let current = self.state.borrow().current_user.as_ref().map(User::id);
        if current == Some(id) {
            return Err(DeleteUserError::CannotDeleteSelf);
        }

        self.backend.profiles.delete_profile(id).await?;
        let cleanup = self.backend.progress.delete_attempts(id).await;

        self.refresh_users().await;
        self.refresh_progress().await;

        cleanup.map_err(|source| DeleteUserError::ProgressCleanupFailed { source })
    }

    //
    // ─── QUIZ FLOW ────────────────────────────────────────────────────────
    //

    /// Pin the settings for a new session and navigate to the quiz screen.
    /// Any previous summary is discarded.
    pub fn start_quiz(&self, settings: QuizSettings) {
        self.state.send_modify(|s| {
            s.quiz_settings = Some(settings);
            s.quiz_summary = None;
            s.view = View::Quiz;
        });
    }

    /// Persist a completed session and move to the results screen.
    ///
    /// Guarded: anyone but a student finishing a quiz indicates a routing
    /// bug upstream, so the call is a silent no-op — nothing is persisted
    /// and the view stays put.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` if the attempt row cannot be written.
    pub async fn finish_quiz(&self, summary: QuizSummary) -> Result<(), ControllerError> {
        let Some(user) = self.state.borrow().current_user.clone() else {
            return Ok(());
        };
        if !user.is_student() {
            tracing::debug!(role = %user.role(), "finish_quiz ignored for non-student");
            return Ok(());
        }

        let settings = summary.settings();
        self.backend
            .progress
            .insert_attempt(NewAttemptRecord {
                user_id: user.id(),
                operation: settings.operation,
                stage: settings.stage,
                score: summary.score(),
                total_time: summary.total_time(),
            })
            .await?;

        self.refresh_progress().await;
        self.state.send_modify(|s| {
            s.quiz_summary = Some(summary);
            s.view = View::Results;
        });
        Ok(())
    }

    /// Abort the quiz flow, discarding settings and summary.
    pub fn exit_quiz(&self) {
        self.state.send_modify(|s| {
            s.quiz_settings = None;
            s.quiz_summary = None;
            s.view = View::Dashboard;
        });
    }

    pub fn set_view(&self, view: View) {
        self.state.send_modify(|s| s.view = view);
    }

    //
    // ─── CACHE REFRESH ────────────────────────────────────────────────────
    //

    /// Reload the user cache. On read failure the previous (possibly stale)
    /// list is kept so a transient error does not blank the UI. Concurrent
    /// refreshes are fine: reads are idempotent snapshots.
    pub async fn refresh_users(&self) {
        match self.backend.profiles.list_profiles().await {
            Ok(rows) => {
                let users: Vec<User> = rows
                    .into_iter()
                    .filter_map(|row| match row.into_user() {
                        Ok(user) => Some(user),
                        Err(error) => {
                            tracing::warn!(%error, "skipping invalid profile row");
                            None
                        }
                    })
                    .collect();
                self.state.send_modify(|s| s.users = users);
            }
            Err(error) => {
                tracing::warn!(%error, "user cache refresh failed; keeping stale list");
            }
        }
    }

    /// Reload and re-normalize the progress cache. Same stale-on-failure
    /// policy as [`Self::refresh_users`].
    pub async fn refresh_progress(&self) {
        match self.backend.progress.list_attempts().await {
            Ok(rows) => {
                let index = progress::normalize(&rows);
                self.state.send_modify(|s| s.progress = index);
            }
            Err(error) => {
                tracing::warn!(%error, "progress cache refresh failed; keeping stale index");
            }
        }
    }
}

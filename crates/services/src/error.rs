//! Shared error types for the services crate.

use thiserror::Error;

use backend::BackendError;
use quiz_core::model::QuizSummaryError;

/// Errors from single-call controller operations (login, logout,
/// update, cache-backed persistence).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors from the two-phase signup saga.
///
/// Phase 1 creates the identity; phase 2 optionally links parent → child.
/// The phases are not atomic: `LinkFailed` means the account exists but the
/// link does not, and the caller must report that outcome distinctly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignUpError {
    #[error(transparent)]
    Auth(#[from] BackendError),

    #[error("account created but child link failed: {source}")]
    LinkFailed {
        #[source]
        source: BackendError,
    },
}

/// Errors from the two-phase delete saga (profile row, then attempt rows).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeleteUserError {
    /// Guard rejection: deleting the signed-in account is blocked at the
    /// controller boundary, not left to presentation.
    #[error("cannot delete the currently signed-in account")]
    CannotDeleteSelf,

    #[error("profile deleted but progress cleanup failed: {source}")]
    ProgressCleanupFailed {
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors emitted by the quiz session state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz already started")]
    AlreadyStarted,

    /// Also the double-record guard: a second submission (or a timeout after
    /// a submission) for the same question lands here and is ignored.
    #[error("no active question to answer")]
    NotAwaitingAnswer,

    #[error("cannot advance before the current question is revealed")]
    NotRevealed,

    #[error(transparent)]
    Summary(#[from] QuizSummaryError),
}

// Error types for the practice engine and its collaborators.

use crate::model::SessionStatus;

/// Failures reported by a session backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session {id} is {status} and cannot be practiced")]
    SessionClosed { id: String, status: SessionStatus },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// The user-facing actions whose failure leaves the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionAction {
    Pause,
    Resume,
    Complete,
}

/// Errors surfaced by the practice controller.
#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error("Either a session id or both a plan id and a schedule id are required")]
    MissingParameters,
    #[error("Could not load the practice session: {0}")]
    Initialization(#[source] BackendError),
    #[error("Could not {action} the session: {source}")]
    Action {
        action: SessionAction,
        #[source]
        source: BackendError,
    },
    #[error("The practice session is not ready")]
    NotReady,
}

/// Failures of the text-to-speech collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Could not start speech program: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Speech playback failed: {0}")]
    Failed(String),
}

//! Error types surfaced by the session core, settings validation and
//! profile storage.

use thiserror::Error;

use crate::session::Phase;

/// Errors raised while driving a typing session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no user is signed in")]
    NotAuthenticated,

    #[error("cannot {operation} while the session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },
}

/// Rejected challenge settings. Callers fall back to defaults instead of
/// propagating these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("challenge duration must be a positive number of seconds, got {0:?}")]
    InvalidDuration(String),

    #[error("challenge lives must be a number from 1 to 99, got {0:?}")]
    InvalidLives(String),
}

/// Errors surfaced by profile storage.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted timestamp for {username}: {value}")]
    CorruptedTimestamp { username: String, value: String },
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

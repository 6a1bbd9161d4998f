// src/error.rs

//! Error taxonomy for conveyor.
//!
//! Only four variants are allowed to cross a component boundary:
//! [`Error::Precondition`], [`Error::AuthZ`], [`Error::NotFound`] and
//! [`Error::Conflict`] (spec §7). [`Error::Storage`] and
//! [`Error::WorkerExternal`] are constructed internally by the state
//! machine and workers and are always translated into a terminal state
//! transition plus a history row before they would otherwise escape;
//! their constructors are `pub(crate)` so nothing outside the crate can
//! manufacture one.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Actor, role, or prior state rejects the transition. Maps to HTTP 400.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Role not permitted for this action. Maps to HTTP 403.
    #[error("not authorized: {0}")]
    AuthZ(String),

    /// Entity does not exist or is not visible to the actor. Maps to HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-key violation (reference, username). Maps to HTTP 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient database failure. Never returned from a public API after
    /// the HTTP boundary's single retry; that retry exhausted maps to 503.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// Subprocess non-zero exit, scanner missing, rsync failure, timeout.
    /// Always resolved by the caller into a terminal state transition;
    /// never propagated past the worker that produced it.
    #[error("worker external failure: {0}")]
    WorkerExternal(String),

    /// Request body failed schema validation. Maps to HTTP 422.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn storage(detail: impl fmt::Display) -> Self {
        Error::Storage(detail.to_string())
    }

    pub(crate) fn worker_external(detail: impl fmt::Display) -> Self {
        Error::WorkerExternal(detail.to_string())
    }

    pub fn precondition(detail: impl fmt::Display) -> Self {
        Error::Precondition(detail.to_string())
    }

    pub fn authz(detail: impl fmt::Display) -> Self {
        Error::AuthZ(detail.to_string())
    }

    pub fn not_found(detail: impl fmt::Display) -> Self {
        Error::NotFound(detail.to_string())
    }

    pub fn conflict(detail: impl fmt::Display) -> Self {
        Error::Conflict(detail.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Conflict(e.to_string())
            }
            other => Error::storage(other),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::worker_external(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::storage(e)
    }
}

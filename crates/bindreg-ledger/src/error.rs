//! Error types for the ledger.
//!
//! These are infrastructure failures. A request the registry refuses is not
//! an error here; it comes back as [`crate::Rejection`].

use bindreg_core::ParamsError;
use thiserror::Error;

/// Errors that can occur while talking to a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// State or request serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A registry is already deployed in this database.
    #[error("registry already deployed")]
    AlreadyDeployed,

    /// No registry is deployed in this database.
    #[error("no registry deployed")]
    NotDeployed,

    /// Deployment parameters were rejected.
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    /// A lock guarding ledger state was poisoned.
    #[error("ledger lock poisoned: {0}")]
    LockPoisoned(String),

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    TaskFailed(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

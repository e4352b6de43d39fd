//! Error types for the registry facade.

use bindreg_client::ClientError;
use bindreg_core::{CoreError, RegistryError};
use bindreg_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic or encoding failure.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The registry refused a request.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Ledger infrastructure failure.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Client-side failure, including rejected submissions.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

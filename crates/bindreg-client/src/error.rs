//! Error types for the client.

use bindreg_core::{Commitment, LogKind, RegistryError};
use bindreg_ledger::{LedgerError, Rejection};
use thiserror::Error;

/// Errors from maintaining a local tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("leaf index {index} out of range")]
    IndexOutOfRange { index: u32 },

    #[error("leaf {index} is already occupied")]
    SlotOccupied { index: u32 },

    #[error("cannot insert the empty leaf value")]
    EmptyValue,
}

/// Errors that can occur while driving a registry.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Ledger infrastructure failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Replaying history into a local tree failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// The request fails against the state the client just read; nothing
    /// was submitted.
    #[error("request refused locally: {0}")]
    Registry(#[from] RegistryError),

    /// The ledger refused the submission.
    #[error("submission rejected: {0}")]
    Rejected(Rejection),

    /// Local tree root differs from the committed commitment.
    #[error("{log:?} tree diverged: local root {local}, committed {committed}")]
    Diverged {
        log: LogKind,
        local: Commitment,
        committed: Commitment,
    },

    /// The ledger returned a non-contiguous history.
    #[error("history gap: expected version {expected}, got {got}")]
    HistoryGap { expected: u64, got: u64 },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

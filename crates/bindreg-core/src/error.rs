//! Error types for bindreg core.

use thiserror::Error;

use crate::append_log::AppendError;
use crate::message::Rule;

/// Errors from cryptographic and encoding operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Message content failures, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message does not decompose into payload and flag block")]
    DecompositionMismatch,

    #[error("flag block {low} exceeds 111111")]
    FlagSizeViolation { low: u32 },

    #[error("flag block {low} decodes to {checker}: digits must be 0 or 1")]
    FlagDecodeMismatch { low: u32, checker: u32 },

    #[error("flag rule {0} violated")]
    RuleViolation(Rule),
}

/// Failures of the registry transitions.
///
/// Every variant is terminal for the request that caused it; no state is
/// changed when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("caller is not the registry admin")]
    NotAdmin,

    #[error("identity registry is full ({capacity} entries)")]
    CapacityExceeded { capacity: u32 },

    #[error("witness index {got} does not match next slot {expected}")]
    IndexMismatch { expected: u32, got: u32 },

    #[error("witness for slot {index} is out of sync with the identity commitment")]
    OutOfSync { index: u32 },

    #[error("caller is not registered")]
    NotEligible,

    #[error("identity slot {identity_index} does not match message slot {message_index}")]
    BindingMismatch {
        identity_index: u32,
        message_index: u32,
    },

    #[error("message slot {index} is occupied or the witness is stale")]
    MessageSlotFull { index: u32 },

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] MessageError),
}

impl From<AppendError> for RegistryError {
    fn from(e: AppendError) -> Self {
        match e {
            AppendError::OutOfSync { index } => RegistryError::OutOfSync { index },
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

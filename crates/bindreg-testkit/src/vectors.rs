//! Message validation vectors.
//!
//! Known messages with the outcome every implementation of the validator
//! must report. Exported as JSON for use outside Rust.

use bindreg_core::{validate_message, Message, MessageError};
use serde::{Deserialize, Serialize};

/// Expected validator outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expected {
    Valid,
    FlagSizeViolation,
    FlagDecodeMismatch,
    /// Rule violation with the rule number.
    RuleViolation(u8),
}

impl Expected {
    /// Classify an actual validator result.
    pub fn of(result: &Result<impl Sized, MessageError>) -> Option<Self> {
        match result {
            Ok(_) => Some(Expected::Valid),
            Err(MessageError::FlagSizeViolation { .. }) => Some(Expected::FlagSizeViolation),
            Err(MessageError::FlagDecodeMismatch { .. }) => Some(Expected::FlagDecodeMismatch),
            Err(MessageError::RuleViolation(rule)) => Some(Expected::RuleViolation(rule.number())),
            Err(MessageError::DecompositionMismatch) => None,
        }
    }
}

/// A single message vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageVector {
    pub name: String,
    /// Decimal encoding of the message.
    pub message: String,
    pub expected: Expected,
}

impl MessageVector {
    fn new(name: &str, message: u128, expected: Expected) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
            expected,
        }
    }

    /// The message as a value.
    ///
    /// # Panics
    /// Panics if the decimal encoding is not a `u128`.
    pub fn message(&self) -> Message {
        Message::new(self.message.parse().expect("vector message must be a u128"))
    }
}

/// Get all message vectors.
pub fn all_vectors() -> Vec<MessageVector> {
    use Expected::*;
    vec![
        MessageVector::new("single flag 6", 123_423_432_423_423_434_100_000, Valid),
        MessageVector::new("no flags", 42_000_000, Valid),
        MessageVector::new("zero message", 0, Valid),
        MessageVector::new("flag 1 alone", 7_000_001, RuleViolation(1)),
        MessageVector::new("flags 2 and 3", 7_000_110, Valid),
        MessageVector::new("flags 4 and 3", 7_001_100, Valid),
        MessageVector::new("flags 4 5 6", 7_111_000, RuleViolation(3)),
        MessageVector::new("flags 4 and 5", 7_011_000, RuleViolation(3)),
        MessageVector::new("flag 1 with flag 6", 7_100_001, RuleViolation(1)),
        MessageVector::new("flag 2 without 3", 7_000_010, RuleViolation(2)),
        MessageVector::new("rule 2 reported before rule 3", 7_011_010, RuleViolation(2)),
        MessageVector::new("block 230000", 7_230_000, FlagSizeViolation),
        MessageVector::new("block 111112", 7_111_112, FlagSizeViolation),
        MessageVector::new("digit 2 under bound", 7_000_002, FlagDecodeMismatch),
        MessageVector::new("digit 9 under bound", 7_100_009, FlagDecodeMismatch),
        MessageVector::new("max message", u128::MAX, FlagSizeViolation),
    ]
}

/// Run every vector; returns `(name, passed)`.
pub fn verify_all_vectors() -> Vec<(String, bool)> {
    all_vectors()
        .into_iter()
        .map(|v| {
            let actual = Expected::of(&validate_message(v.message()));
            (v.name.clone(), actual == Some(v.expected))
        })
        .collect()
}

/// All vectors as pretty JSON.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

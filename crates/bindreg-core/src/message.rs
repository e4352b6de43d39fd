//! Message validation: flag-block decoding and rule checks.
//!
//! The low six decimal digits of a message form a flag block. Digit `d_i`
//! (counted from the least significant, `d0 = low % 10`) is flag `i + 1`.
//! A digit is a set flag when it equals 1 and an unset flag when it equals 0;
//! any other digit makes the block undecodable.
//!
//! Checks run in a fixed order and the first failure is reported:
//!
//! 1. coarse bound `low <= 111_111`
//! 2. exact reconstruction of `low` from the decoded flags
//! 3. rule 1: flag 1 set requires the block to be exactly `100_000`
//! 4. rule 2: flag 2 set requires flag 3
//! 5. rule 3: flag 4 set forbids flags 5 and 6

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MessageError;
use crate::types::{Message, FLAG_BLOCK};

/// Number of flags in a flag block.
pub const FLAG_COUNT: usize = 6;

/// Largest flag block whose digits could all be 0 or 1.
pub const MAX_FLAG_BLOCK: u32 = 111_111;

/// The only flag block rule 1 admits when flag 1 is set.
pub const EXCLUSIVE_BLOCK: u32 = 100_000;

/// A content rule applied to decoded flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rule {
    /// Flag 1 requires the block to equal [`EXCLUSIVE_BLOCK`].
    Exclusivity = 1,
    /// Flag 2 implies flag 3.
    Implication = 2,
    /// Flag 4 excludes flags 5 and 6.
    MutualExclusion = 3,
}

impl Rule {
    /// The rule number as used in error reports.
    pub const fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Decoded flags of a valid flag block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagSet([bool; FLAG_COUNT]);

impl FlagSet {
    /// Decode the digits of `low`, least significant first.
    fn decode(low: u32) -> Self {
        let mut flags = [false; FLAG_COUNT];
        let mut rest = low;
        for flag in flags.iter_mut() {
            *flag = rest % 10 == 1;
            rest /= 10;
        }
        Self(flags)
    }

    /// Rebuild the block value from the flags.
    fn checker(&self) -> u32 {
        self.0
            .iter()
            .rev()
            .fold(0, |acc, &set| acc * 10 + u32::from(set))
    }

    /// Whether flag `n` (1-based) is set.
    ///
    /// # Panics
    /// Panics if `n` is 0 or greater than [`FLAG_COUNT`].
    pub fn is_set(&self, n: usize) -> bool {
        assert!((1..=FLAG_COUNT).contains(&n), "flag {} out of range", n);
        self.0[n - 1]
    }

    /// Number of set flags.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&set| set).count()
    }

    /// The flags as an array, flag 1 first.
    pub fn as_array(&self) -> [bool; FLAG_COUNT] {
        self.0
    }

    fn check_rules(&self, low: u32) -> Result<(), Rule> {
        // Flag 1 is digit d0, which EXCLUSIVE_BLOCK leaves clear, so any
        // block with flag 1 set fails here.
        if self.is_set(1) && low != EXCLUSIVE_BLOCK {
            return Err(Rule::Exclusivity);
        }
        if self.is_set(2) && !self.is_set(3) {
            return Err(Rule::Implication);
        }
        if self.is_set(4) && (self.is_set(5) || self.is_set(6)) {
            return Err(Rule::MutualExclusion);
        }
        Ok(())
    }
}

/// Validate a message's flag block.
///
/// Returns the decoded flags on success.
pub fn validate_message(message: Message) -> Result<FlagSet, MessageError> {
    let (high, low) = message.split();

    // Holds by construction of div/mod; kept so a broken split cannot pass.
    if high
        .checked_mul(FLAG_BLOCK)
        .and_then(|v| v.checked_add(u128::from(low)))
        != Some(message.value())
    {
        return Err(MessageError::DecompositionMismatch);
    }

    if low > MAX_FLAG_BLOCK {
        return Err(MessageError::FlagSizeViolation { low });
    }

    let flags = FlagSet::decode(low);
    let checker = flags.checker();
    if checker != low {
        return Err(MessageError::FlagDecodeMismatch { low, checker });
    }

    flags.check_rules(low).map_err(MessageError::RuleViolation)?;

    Ok(flags)
}

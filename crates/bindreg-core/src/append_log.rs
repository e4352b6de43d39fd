//! Authenticated append log.
//!
//! A log is nothing but its committed root. Appending requires a witness
//! that reproduces the live root with the target slot empty; the same check
//! proves freshness of the caller's tree and emptiness of the slot, and the
//! two causes of failure are reported as one.

use thiserror::Error;

use crate::merkle::Witness;
use crate::types::{Commitment, LeafValue};

/// Failure to append to a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppendError {
    /// The witness does not reproduce the live root with an empty slot.
    ///
    /// Either the caller's tree is stale or the slot is already occupied.
    #[error("witness for slot {index} is out of sync with the committed root")]
    OutOfSync { index: u32 },
}

/// Append `value` at the witness's slot and return the new root.
pub fn append_at(
    root: &Commitment,
    witness: &Witness,
    value: &LeafValue,
) -> Result<Commitment, AppendError> {
    let index = witness.index();

    if witness.root_assuming(&LeafValue::ZERO) != *root {
        tracing::trace!(index, %root, "append rejected: slot not provably empty");
        return Err(AppendError::OutOfSync { index });
    }

    Ok(witness.root_assuming(value))
}

/// Whether `value` is stored at the witness's slot under `root`.
pub fn prove_inclusion(root: &Commitment, witness: &Witness, value: &LeafValue) -> bool {
    witness.proves(root, value)
}

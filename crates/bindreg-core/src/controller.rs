//! Admission and binding controller.
//!
//! Pure transition functions over [`RegistryState`]. Each function either
//! returns the complete next state or an error; the input state is never
//! modified. Checks run in the documented order and the first failure wins.

use serde::{Deserialize, Serialize};

use crate::append_log::{append_at, prove_inclusion};
use crate::crypto::Ed25519PublicKey;
use crate::error::RegistryError;
use crate::merkle::Witness;
use crate::message::validate_message;
use crate::state::RegistryState;
use crate::types::{identity_digest, LeafValue, Message};

/// Which append log a leaf belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    Identity,
    Message,
}

/// The single leaf written by a transition.
///
/// Off-chain tree maintainers replay these to stay in step with the
/// committed roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeafUpdate {
    pub log: LogKind,
    pub index: u32,
    pub value: LeafValue,
}

/// Notifications emitted by transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A message was deposited; carries the updated count.
    MessageDeposited { message_count: u64 },
}

/// A state-advancing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Admit `candidate` at the slot proven empty by `witness`.
    RegisterIdentity {
        candidate: Ed25519PublicKey,
        witness: Witness,
    },
    /// Deposit `message` in the caller's bound message slot.
    DepositMessage {
        identity_witness: Witness,
        message: Message,
        message_witness: Witness,
    },
}

impl Request {
    /// The leaf this request writes if it is applied.
    pub fn leaf_update(&self) -> LeafUpdate {
        match self {
            Request::RegisterIdentity { candidate, witness } => LeafUpdate {
                log: LogKind::Identity,
                index: witness.index(),
                value: identity_digest(candidate),
            },
            Request::DepositMessage {
                message,
                message_witness,
                ..
            } => LeafUpdate {
                log: LogKind::Message,
                index: message_witness.index(),
                value: message.leaf(),
            },
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::RegisterIdentity { .. } => "register_identity",
            Request::DepositMessage { .. } => "deposit_message",
        }
    }
}

/// The outcome of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The complete next state.
    pub state: RegistryState,
    /// Notification to publish, if any.
    pub event: Option<RegistryEvent>,
    /// The leaf written.
    pub update: LeafUpdate,
}

/// Admit `candidate` into the identity log.
///
/// Only the admin may call this, slots fill strictly in order, and the
/// witness must prove the next slot empty under the live commitment.
pub fn register_identity(
    state: &RegistryState,
    caller: &Ed25519PublicKey,
    candidate: &Ed25519PublicKey,
    witness: &Witness,
) -> Result<Transition, RegistryError> {
    if !state.is_admin(caller) {
        return Err(RegistryError::NotAdmin);
    }

    let next_index = state.next_identity_index();
    if next_index >= i64::from(state.params.capacity) {
        return Err(RegistryError::CapacityExceeded {
            capacity: state.params.capacity,
        });
    }

    let claimed = witness.index();
    if i64::from(claimed) != next_index {
        return Err(RegistryError::IndexMismatch {
            // next_index is in 0..capacity here.
            expected: next_index as u32,
            got: claimed,
        });
    }

    let digest = identity_digest(candidate);
    let identity_commitment = append_at(&state.identity_commitment, witness, &digest)?;

    let mut next = state.clone();
    next.identity_commitment = identity_commitment;
    next.last_identity_digest = digest;
    next.identity_count = next_index;

    Ok(Transition {
        state: next,
        event: None,
        update: LeafUpdate {
            log: LogKind::Identity,
            index: claimed,
            value: digest,
        },
    })
}

/// Deposit `message` in the message slot bound to the caller's identity slot.
pub fn deposit_message(
    state: &RegistryState,
    caller: &Ed25519PublicKey,
    identity_witness: &Witness,
    message: Message,
    message_witness: &Witness,
) -> Result<Transition, RegistryError> {
    let sender = identity_digest(caller);
    if !prove_inclusion(&state.identity_commitment, identity_witness, &sender) {
        return Err(RegistryError::NotEligible);
    }

    let identity_index = identity_witness.index();
    let message_index = message_witness.index();
    if identity_index != message_index {
        return Err(RegistryError::BindingMismatch {
            identity_index,
            message_index,
        });
    }

    validate_message(message)?;

    let leaf = message.leaf();
    let message_commitment = append_at(&state.message_commitment, message_witness, &leaf)
        .map_err(|_| RegistryError::MessageSlotFull {
            index: message_index,
        })?;

    let mut next = state.clone();
    next.message_commitment = message_commitment;
    next.last_message = message;
    next.message_count += 1;

    Ok(Transition {
        event: Some(RegistryEvent::MessageDeposited {
            message_count: next.message_count,
        }),
        state: next,
        update: LeafUpdate {
            log: LogKind::Message,
            index: message_index,
            value: leaf,
        },
    })
}

/// Apply `request` on behalf of `caller`.
pub fn apply(
    state: &RegistryState,
    caller: &Ed25519PublicKey,
    request: &Request,
) -> Result<Transition, RegistryError> {
    match request {
        Request::RegisterIdentity { candidate, witness } => {
            register_identity(state, caller, candidate, witness)
        }
        Request::DepositMessage {
            identity_witness,
            message,
            message_witness,
        } => deposit_message(state, caller, identity_witness, *message, message_witness),
    }
}

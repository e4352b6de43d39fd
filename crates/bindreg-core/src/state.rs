//! Committed registry state.
//!
//! The whole registry is this record. It is created once by
//! [`RegistryState::initialize`] and afterwards only replaced by the result of
//! a successful transition in [`crate::controller`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Ed25519PublicKey;
use crate::merkle::{empty_root, TREE_LEAVES};
use crate::types::{identity_digest, Commitment, LeafValue, Message};

/// Default maximum number of identities.
pub const DEFAULT_CAPACITY: u32 = 100;

/// Sentinel for `identity_count` before any identity is admitted.
pub const NO_IDENTITY: i64 = -1;

/// Deployment parameters, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryParams {
    /// Maximum number of identities the registry admits.
    pub capacity: u32,
}

impl Default for RegistryParams {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Invalid deployment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("capacity {capacity} must be between 1 and {max}")]
    CapacityOutOfRange { capacity: u32, max: u32 },
}

impl RegistryParams {
    /// Check that the parameters fit the tree.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.capacity == 0 || self.capacity > TREE_LEAVES {
            return Err(ParamsError::CapacityOutOfRange {
                capacity: self.capacity,
                max: TREE_LEAVES,
            });
        }
        Ok(())
    }
}

/// The committed state of one registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    /// Hash of the admin's public identity.
    pub admin_hash: LeafValue,

    /// Deployment parameters.
    pub params: RegistryParams,

    /// Root of the identity log.
    pub identity_commitment: Commitment,

    /// Index of the most recently admitted identity, or [`NO_IDENTITY`].
    pub identity_count: i64,

    /// Digest stored by the most recent admission.
    pub last_identity_digest: LeafValue,

    /// Root of the message log.
    pub message_commitment: Commitment,

    /// The most recently deposited message.
    pub last_message: Message,

    /// Number of deposited messages.
    pub message_count: u64,
}

impl RegistryState {
    /// Create the initial state with `admin` as the privileged principal.
    pub fn initialize(admin: &Ed25519PublicKey, params: RegistryParams) -> Self {
        Self {
            admin_hash: identity_digest(admin),
            params,
            identity_commitment: empty_root(),
            identity_count: NO_IDENTITY,
            last_identity_digest: LeafValue::ZERO,
            message_commitment: empty_root(),
            last_message: Message::default(),
            message_count: 0,
        }
    }

    /// The slot the next admitted identity must occupy.
    pub fn next_identity_index(&self) -> i64 {
        self.identity_count + 1
    }

    /// Number of admitted identities.
    pub fn registered(&self) -> u32 {
        // identity_count never drops below NO_IDENTITY and never exceeds
        // the capacity, so this fits.
        (self.identity_count + 1) as u32
    }

    /// Whether the identity log has reached capacity.
    pub fn is_full(&self) -> bool {
        self.registered() >= self.params.capacity
    }

    /// Whether `identity` is the admin.
    pub fn is_admin(&self, identity: &Ed25519PublicKey) -> bool {
        identity_digest(identity) == self.admin_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_initialize() {
        let admin = Keypair::from_seed(&[1; 32]).public_key();
        let state = RegistryState::initialize(&admin, RegistryParams::default());

        assert_eq!(state.identity_commitment, empty_root());
        assert_eq!(state.message_commitment, empty_root());
        assert_eq!(state.identity_count, NO_IDENTITY);
        assert_eq!(state.last_identity_digest, LeafValue::ZERO);
        assert_eq!(state.message_count, 0);
        assert_eq!(state.last_message, Message::new(0));
        assert_eq!(state.next_identity_index(), 0);
        assert_eq!(state.registered(), 0);
        assert!(state.is_admin(&admin));
        assert!(!state.is_admin(&Keypair::from_seed(&[2; 32]).public_key()));
    }

    #[test]
    fn test_admin_is_stored_hashed() {
        let admin = Keypair::from_seed(&[1; 32]).public_key();
        let state = RegistryState::initialize(&admin, RegistryParams::default());
        assert_ne!(state.admin_hash.as_bytes(), admin.as_bytes());
    }

    #[test]
    fn test_params_validation() {
        assert!(RegistryParams::default().validate().is_ok());
        assert!(RegistryParams { capacity: TREE_LEAVES }.validate().is_ok());
        assert_eq!(
            RegistryParams { capacity: 0 }.validate(),
            Err(ParamsError::CapacityOutOfRange {
                capacity: 0,
                max: TREE_LEAVES
            })
        );
        assert!(RegistryParams { capacity: TREE_LEAVES + 1 }.validate().is_err());
    }

    #[test]
    fn test_state_cbor_roundtrip() {
        let admin = Keypair::from_seed(&[1; 32]).public_key();
        let mut state = RegistryState::initialize(&admin, RegistryParams::default());
        state.last_message = Message::new(123_423_432_423_423_434_100_000);

        let mut buf = Vec::new();
        ciborium::into_writer(&state, &mut buf).unwrap();
        let back: RegistryState = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(state, back);
    }
}

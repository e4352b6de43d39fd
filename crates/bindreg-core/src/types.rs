//! Strong type definitions for bindreg.
//!
//! Leaf values, messages and commitments are newtypes so that an identity
//! digest cannot be passed where a commitment is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{domain, Blake3Hash, Ed25519PublicKey};

/// A committed tree root.
pub type Commitment = Blake3Hash;

/// The value held by one leaf of an append log.
///
/// [`LeafValue::ZERO`] is the canonical empty slot. Digests produced by
/// [`identity_digest`] and [`message_leaf`] are domain-separated Blake3
/// outputs and never equal it in practice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafValue(pub [u8; 32]);

impl LeafValue {
    /// The empty leaf.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the empty leaf.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Leaf({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl From<Blake3Hash> for LeafValue {
    fn from(hash: Blake3Hash) -> Self {
        Self(hash.0)
    }
}

impl From<[u8; 32]> for LeafValue {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Hash a public identity into its registry representation.
///
/// Used for identity leaves and for the stored admin hash.
pub fn identity_digest(identity: &Ed25519PublicKey) -> LeafValue {
    Blake3Hash::hash_with_domain(domain::IDENTITY, &[identity.as_bytes()]).into()
}

/// Modulus separating the payload from the flag block.
pub const FLAG_BLOCK: u128 = 1_000_000;

/// An encoded message: a high-order payload followed by a six-digit flag block.
///
/// Stored whole; only decomposed during validation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Message(pub u128);

impl Message {
    /// Create a message from its integer encoding.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Build a message from a payload and a flag block.
    ///
    /// Returns `None` if the result does not fit or `low` is not a
    /// six-digit block.
    pub fn compose(high: u128, low: u32) -> Option<Self> {
        if u128::from(low) >= FLAG_BLOCK {
            return None;
        }
        high.checked_mul(FLAG_BLOCK)?
            .checked_add(u128::from(low))
            .map(Self)
    }

    /// The integer encoding.
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Split into `(high, low)` where `low` is the flag block.
    pub const fn split(&self) -> (u128, u32) {
        let high = self.0 / FLAG_BLOCK;
        // FLAG_BLOCK fits in u32, so the remainder does too.
        let low = (self.0 % FLAG_BLOCK) as u32;
        (high, low)
    }

    /// The leaf value this message occupies in the message log.
    pub fn leaf(&self) -> LeafValue {
        message_leaf(*self)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({})", self.0)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Message {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

/// The leaf value for a deposited message.
pub fn message_leaf(message: Message) -> LeafValue {
    Blake3Hash::hash_with_domain(domain::MESSAGE, &[&message.0.to_be_bytes()]).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_split_scenario_message() {
        let msg = Message::new(123_423_432_423_423_434_100_000);
        let (high, low) = msg.split();
        assert_eq!(high, 123_423_432_423_423_434);
        assert_eq!(low, 100_000);
        assert_eq!(high * FLAG_BLOCK + u128::from(low), msg.value());
    }

    #[test]
    fn test_compose() {
        assert_eq!(Message::compose(7, 11_000), Some(Message::new(7_011_000)));
        assert_eq!(Message::compose(7, 1_000_000), None);
        assert_eq!(Message::compose(u128::MAX, 0), None);
    }

    #[test]
    fn test_message_leaf_never_zero() {
        assert!(!Message::new(0).leaf().is_zero());
        assert_ne!(Message::new(1).leaf(), Message::new(2).leaf());
    }

    #[test]
    fn test_identity_digest_deterministic() {
        let pk = Keypair::from_seed(&[9; 32]).public_key();
        assert_eq!(identity_digest(&pk), identity_digest(&pk));

        let other = Keypair::from_seed(&[10; 32]).public_key();
        assert_ne!(identity_digest(&pk), identity_digest(&other));
    }

    #[test]
    fn test_identity_and_message_domains_differ() {
        // Same 32 input bytes under different domains must not collide.
        let pk = Ed25519PublicKey::from_bytes([0; 32]);
        assert_ne!(identity_digest(&pk), Message::new(0).leaf());
    }
}

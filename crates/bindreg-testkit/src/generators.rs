//! Proptest generators for property-based testing.

use proptest::prelude::*;

use bindreg_core::message::{EXCLUSIVE_BLOCK, FLAG_COUNT};
use bindreg_core::{Ed25519PublicKey, Keypair, LeafValue, Message, Witness, TREE_LEAVES};

/// Largest payload that still fits a `u128` message.
pub const MAX_PAYLOAD: u128 = u128::MAX / 1_000_000;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Ed25519PublicKey.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a non-empty leaf value.
pub fn leaf_value() -> impl Strategy<Value = LeafValue> {
    any::<[u8; 32]>()
        .prop_filter("leaf must not be empty", |b| b != &[0u8; 32])
        .prop_map(LeafValue::from_bytes)
}

/// Generate a leaf index.
pub fn leaf_index() -> impl Strategy<Value = u32> {
    0u32..TREE_LEAVES
}

/// Generate a witness for the empty tree.
pub fn empty_tree_witness() -> impl Strategy<Value = Witness> {
    leaf_index().prop_map(Witness::for_empty_tree)
}

/// Generate any message.
pub fn message() -> impl Strategy<Value = Message> {
    any::<u128>().prop_map(Message::new)
}

/// Encode flags (flag 1 first) as a flag block.
pub fn flags_to_block(flags: [bool; FLAG_COUNT]) -> u32 {
    flags
        .iter()
        .rev()
        .fold(0u32, |acc, &set| acc * 10 + u32::from(set))
}

/// Whether decoded flags satisfy all three rules.
pub fn flags_satisfy_rules(f: [bool; FLAG_COUNT]) -> bool {
    let rule1 = !f[0] || flags_to_block(f) == EXCLUSIVE_BLOCK;
    let rule2 = !f[1] || f[2];
    let rule3 = !f[3] || !(f[4] || f[5]);
    rule1 && rule2 && rule3
}

/// Generate a flag block whose digits are all 0 or 1.
pub fn binary_flag_block() -> impl Strategy<Value = u32> {
    prop::array::uniform6(any::<bool>()).prop_map(flags_to_block)
}

/// Generate a flag block that passes validation.
pub fn valid_flag_block() -> impl Strategy<Value = u32> {
    prop::array::uniform6(any::<bool>())
        .prop_filter("flags must satisfy the rules", |f| flags_satisfy_rules(*f))
        .prop_map(flags_to_block)
}

/// Generate a six-digit block with at least one digit above 1.
pub fn malformed_flag_block() -> impl Strategy<Value = u32> {
    (0u32..1_000_000)
        .prop_filter("needs a digit above 1", |low| {
            (0..FLAG_COUNT as u32).any(|i| (low / 10u32.pow(i)) % 10 > 1)
        })
}

/// Generate a message with the given flag-block strategy.
pub fn message_with_block<S>(block: S) -> impl Strategy<Value = Message>
where
    S: Strategy<Value = u32>,
{
    (0..=MAX_PAYLOAD, block).prop_filter_map("must fit in u128", |(high, low)| {
        Message::compose(high, low)
    })
}

/// Generate a message that passes validation.
pub fn valid_message() -> impl Strategy<Value = Message> {
    message_with_block(valid_flag_block())
}

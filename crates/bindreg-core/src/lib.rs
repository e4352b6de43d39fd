//! # bindreg core
//!
//! Pure primitives for an authenticated, capacity-bounded registry: Merkle
//! witnesses, the append log built on them, the message validator and the
//! registry transitions.
//!
//! This crate contains no I/O, no storage and no networking. Every function
//! is a deterministic computation over values.
//!
//! ## Key Types
//!
//! - [`Witness`] - Sibling path proving a leaf's position under a root
//! - [`RegistryState`] - The committed state of one registry
//! - [`Request`] - A state-advancing request
//! - [`SignedRequest`] - A request authenticated by its caller
//! - [`Message`] - An encoded message with a six-digit flag block
//!
//! ## Transitions
//!
//! [`controller::apply`] maps a state, a caller and a request to the next
//! state or a [`RegistryError`]. The ledger and the client both run it: the
//! client to propose, the ledger to check the proposal.

pub mod append_log;
pub mod canonical;
pub mod controller;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod merkle;
pub mod message;
pub mod state;
pub mod types;

pub use append_log::{append_at, prove_inclusion, AppendError};
pub use canonical::{canonical_request_bytes, decode_request, signing_message};
pub use controller::{apply, LeafUpdate, LogKind, RegistryEvent, Request, Transition};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use envelope::{RequestId, SignedRequest};
pub use error::{CoreError, MessageError, RegistryError};
pub use merkle::{empty_root, PathEntry, Witness, TREE_DEPTH, TREE_LEAVES};
pub use message::{validate_message, FlagSet, Rule};
pub use state::{ParamsError, RegistryParams, RegistryState, DEFAULT_CAPACITY};
pub use types::{identity_digest, Commitment, LeafValue, Message};

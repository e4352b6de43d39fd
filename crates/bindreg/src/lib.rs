//! # bindreg
//!
//! An authenticated, capacity-bounded registry. An admin admits public
//! identities one at a time into a fixed-depth Merkle append log; each
//! admitted identity may then deposit exactly one validated message into the
//! slot of a second log bound to its identity slot.
//!
//! ## Overview
//!
//! - **Append log**: a log is only its root. Appending needs a witness that
//!   proves the slot empty under the live root.
//! - **Admission**: admin only, strictly sequential, at most `capacity`
//!   identities.
//! - **Binding**: the identity at slot `i` may deposit only into message
//!   slot `i`, once.
//! - **Validation**: the low six decimal digits of a message are a flag
//!   block checked against three rules.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bindreg::{Registry, RegistryConfig};
//! use bindreg::core::{Keypair, Message};
//!
//! async fn example() -> bindreg::Result<()> {
//!     let admin = Keypair::generate();
//!     let alice = Keypair::generate();
//!     let registry = Registry::deploy_in_memory(&admin.public_key(), RegistryConfig::default())?;
//!
//!     registry.client(admin).await?.register_identity(&alice.public_key()).await?;
//!     registry.client(alice).await?.deposit_message(Message::new(100_000)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `bindreg::core` - Witnesses, state, transitions and the validator
//! - `bindreg::ledger` - The ledger boundary and its backends
//! - `bindreg::client` - Local trees and the registry client

pub mod config;
pub mod error;
pub mod indexer;
pub mod registry;
pub mod telemetry;

pub use bindreg_client as client;
pub use bindreg_core as core;
pub use bindreg_ledger as ledger;

pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use indexer::{spawn_indexer, DepositProgress, IndexerHandle};
pub use registry::Registry;
pub use telemetry::init_tracing;

pub use bindreg_client::{ClientError, LocalTree, RegistryClient};
pub use bindreg_core::{
    Ed25519PublicKey, Keypair, Message, RegistryError, RegistryEvent, RegistryParams,
    RegistryState, Request, SignedRequest, Witness,
};
pub use bindreg_ledger::{Ledger, MemoryLedger, Rejection, SqliteLedger, SubmitOutcome};

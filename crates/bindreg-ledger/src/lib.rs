//! # bindreg ledger
//!
//! The boundary between registry callers and committed state. Provides the
//! [`Ledger`] trait with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! A ledger stores one [`bindreg_core::RegistryState`] and the ordered list
//! of transitions that produced it. Callers submit a [`StateTransition`]: a
//! signed request plus the state they expect it to produce. The ledger
//! re-executes the request with [`bindreg_core::controller::apply`] against
//! its current state and commits only if the result matches the proposal.
//!
//! ## Key Types
//!
//! - [`Ledger`] - The async trait for reading and advancing a registry
//! - [`SqliteLedger`] - SQLite-based persistent ledger
//! - [`MemoryLedger`] - In-memory ledger for tests
//! - [`SubmitOutcome`] - Applied with a version, or rejected with a reason
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bindreg_core::{Keypair, RegistryParams};
//! use bindreg_ledger::{Ledger, SqliteLedger};
//!
//! async fn example() {
//!     let admin = Keypair::generate();
//!     let ledger = SqliteLedger::deploy("registry.db", &admin.public_key(), RegistryParams::default()).unwrap();
//!
//!     let snapshot = ledger.read_state().await.unwrap();
//!     assert_eq!(snapshot.version, 0);
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, Result};
pub use memory::{MemoryLedger, DEFAULT_EVENT_CAPACITY};
pub use sqlite::SqliteLedger;
pub use traits::{
    evaluate, AppliedTransition, Ledger, LedgerEvent, Rejection, Snapshot, StateTransition,
    SubmitOutcome,
};

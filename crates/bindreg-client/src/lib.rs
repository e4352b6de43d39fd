//! # bindreg client
//!
//! Off-ledger side of a registry. The ledger commits only tree roots; the
//! client materializes both trees from committed history, builds witnesses
//! from them and submits proposals computed with the same pure transitions
//! the ledger re-executes.
//!
//! ## Key Types
//!
//! - [`LocalTree`] - A full depth-8 tree with witness extraction
//! - [`RegistryClient`] - Sync, register and deposit against a [`bindreg_ledger::Ledger`]
//!
//! A rejected submission is returned as [`ClientError::Rejected`]. The client
//! never retries; resyncing and resubmitting is the caller's decision.

pub mod client;
pub mod error;
pub mod tree;

pub use client::RegistryClient;
pub use error::{ClientError, Result, TreeError};
pub use tree::LocalTree;

//! # bindreg testkit
//!
//! Testing utilities for bindreg.
//!
//! ## Overview
//!
//! - **Message vectors**: Known messages with the validator outcome every
//!   implementation must report
//! - **Generators**: Proptest strategies for keys, leaves, witnesses and
//!   messages
//! - **Fixtures**: An in-memory registry with deterministic keys
//!
//! ## Message Vectors
//!
//! ```rust
//! use bindreg_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed) in verify_all_vectors() {
//!     assert!(passed, "{}", name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use bindreg_testkit::generators::valid_message;
//!
//! proptest! {
//!     #[test]
//!     fn valid_messages_pass(msg in valid_message()) {
//!         prop_assert!(bindreg_core::validate_message(msg).is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{member, RegistryFixture};
pub use vectors::{all_vectors, verify_all_vectors, Expected, MessageVector};

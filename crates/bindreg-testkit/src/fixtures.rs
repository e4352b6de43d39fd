//! Test fixtures and helpers.
//!
//! Common setup for registry integration tests.

use std::sync::Arc;

use bindreg_client::{ClientError, RegistryClient};
use bindreg_core::{Ed25519PublicKey, Keypair, RegistryParams};
use bindreg_ledger::MemoryLedger;

/// Seed of the fixture admin.
pub const ADMIN_SEED: [u8; 32] = [0xad; 32];

/// Deterministic keypair for the `n`th member.
pub fn member(n: u32) -> Keypair {
    let mut seed = [0x5e; 32];
    seed[..4].copy_from_slice(&n.to_be_bytes());
    Keypair::from_seed(&seed)
}

/// An in-memory registry with a deterministic admin.
pub struct RegistryFixture {
    pub admin: Keypair,
    pub ledger: Arc<MemoryLedger>,
}

impl RegistryFixture {
    /// A registry with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(RegistryParams::default().capacity)
    }

    /// A registry admitting at most `capacity` identities.
    ///
    /// # Panics
    /// Panics if `capacity` is out of range.
    pub fn with_capacity(capacity: u32) -> Self {
        let admin = Keypair::from_seed(&ADMIN_SEED);
        let ledger = MemoryLedger::deploy(&admin.public_key(), RegistryParams { capacity })
            .expect("fixture capacity must be valid");
        Self {
            admin,
            ledger: Arc::new(ledger),
        }
    }

    pub fn admin_key(&self) -> Ed25519PublicKey {
        self.admin.public_key()
    }

    /// A client for the admin.
    pub fn admin_client(&self) -> RegistryClient<MemoryLedger> {
        self.client(self.admin.clone())
    }

    /// A client for `keypair`. Not yet synced.
    pub fn client(&self, keypair: Keypair) -> RegistryClient<MemoryLedger> {
        RegistryClient::new(self.ledger.clone(), keypair)
    }

    /// Register members `0..count` in order and return their keypairs.
    pub async fn register_members(&self, count: u32) -> Result<Vec<Keypair>, ClientError> {
        let mut admin = self.admin_client();
        let mut members = Vec::with_capacity(count as usize);
        for n in 0..count {
            let keypair = member(n);
            admin.register_identity(&keypair.public_key()).await?;
            members.push(keypair);
        }
        Ok(members)
    }
}

impl Default for RegistryFixture {
    fn default() -> Self {
        Self::new()
    }
}

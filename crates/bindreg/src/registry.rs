//! The Registry: one deployed registry and the handles to drive it.

use std::sync::Arc;

use bindreg_client::RegistryClient;
use bindreg_core::{Ed25519PublicKey, Keypair};
use bindreg_ledger::{Ledger, LedgerEvent, MemoryLedger, Snapshot, SqliteLedger};
use tokio::sync::broadcast;

use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::indexer::{spawn_indexer, IndexerHandle};

/// A deployed registry.
///
/// Cheap to share: clients hold the same ledger through an `Arc`.
pub struct Registry<L: Ledger> {
    ledger: Arc<L>,
    config: RegistryConfig,
}

impl Registry<MemoryLedger> {
    /// Deploy an in-memory registry administered by `admin`.
    pub fn deploy_in_memory(admin: &Ed25519PublicKey, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let ledger =
            MemoryLedger::deploy_with_event_capacity(admin, config.params(), config.event_buffer)?;
        Ok(Self::from_ledger(Arc::new(ledger), config))
    }
}

impl Registry<SqliteLedger> {
    /// Deploy into the database named by `config.database`.
    pub fn deploy_sqlite(admin: &Ed25519PublicKey, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let path = config
            .database
            .as_ref()
            .ok_or_else(|| Error::Config("database path required".into()))?;
        let ledger = SqliteLedger::deploy(path, admin, config.params())?
            .with_event_capacity(config.event_buffer);
        Ok(Self::from_ledger(Arc::new(ledger), config))
    }

    /// Open the registry in the database named by `config.database`.
    ///
    /// Deployment parameters come from the database, not from `config`.
    pub fn open_sqlite(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let path = config
            .database
            .as_ref()
            .ok_or_else(|| Error::Config("database path required".into()))?;
        let ledger = SqliteLedger::open(path)?.with_event_capacity(config.event_buffer);
        Ok(Self::from_ledger(Arc::new(ledger), config))
    }
}

impl<L: Ledger> Registry<L> {
    /// Wrap an existing ledger.
    pub fn from_ledger(ledger: Arc<L>, config: RegistryConfig) -> Self {
        Self { ledger, config }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Read the committed state.
    pub async fn state(&self) -> Result<Snapshot> {
        Ok(self.ledger.read_state().await?)
    }

    /// A client acting as `keypair`, synced to the current version.
    pub async fn client(&self, keypair: Keypair) -> Result<RegistryClient<L>> {
        let mut client = RegistryClient::new(self.ledger.clone(), keypair);
        client.sync().await?;
        Ok(client)
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.ledger.subscribe()
    }

    /// Start a background indexer following deposits.
    pub fn spawn_indexer(&self) -> IndexerHandle {
        spawn_indexer(self.ledger.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindreg_core::Message;

    #[tokio::test]
    async fn test_deploy_in_memory_and_drive() {
        let admin = Keypair::from_seed(&[1; 32]);
        let alice = Keypair::from_seed(&[2; 32]);
        let registry =
            Registry::deploy_in_memory(&admin.public_key(), RegistryConfig::default()).unwrap();
        let mut indexer = registry.spawn_indexer();

        let mut admin_client = registry.client(admin).await.unwrap();
        admin_client.register_identity(&alice.public_key()).await.unwrap();

        let mut alice_client = registry.client(alice).await.unwrap();
        alice_client.deposit_message(Message::new(100_000)).await.unwrap();

        let progress = indexer.wait_for_count(1).await.unwrap();
        assert_eq!(progress.version, 2);
        assert_eq!(registry.state().await.unwrap().state.message_count, 1);
    }

    #[tokio::test]
    async fn test_deploy_sqlite_requires_path() {
        let admin = Keypair::from_seed(&[1; 32]);
        let result = Registry::deploy_sqlite(&admin.public_key(), RegistryConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let admin = Keypair::from_seed(&[1; 32]);
        let config = RegistryConfig {
            capacity: 0,
            ..RegistryConfig::default()
        };
        assert!(Registry::deploy_in_memory(&admin.public_key(), config).is_err());
    }
}

//! Background consumer of registry notifications.
//!
//! Observers that only care about deposits do not need to replay history;
//! they follow [`bindreg_ledger::LedgerEvent`]s and read the running count.

use bindreg_core::RegistryEvent;
use bindreg_ledger::LedgerEvent;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Latest deposit seen by an indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepositProgress {
    /// Ledger version of the latest deposit.
    pub version: u64,
    /// Message count after that deposit.
    pub message_count: u64,
}

/// Handle to a running indexer task.
pub struct IndexerHandle {
    progress: watch::Receiver<DepositProgress>,
    task: JoinHandle<u64>,
}

impl IndexerHandle {
    /// The most recent progress. Versions never decrease.
    pub fn progress(&self) -> DepositProgress {
        *self.progress.borrow()
    }

    /// Wait until at least `count` messages have been deposited.
    ///
    /// Returns `None` if the indexer stopped first.
    pub async fn wait_for_count(&mut self, count: u64) -> Option<DepositProgress> {
        self.progress
            .wait_for(|p| p.message_count >= count)
            .await
            .ok()
            .map(|p| *p)
    }

    /// Stop the indexer without waiting for the ledger to close.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the indexer to stop and return how many deposits it saw.
    pub async fn join(self) -> u64 {
        self.task.await.unwrap_or(0)
    }
}

/// Spawn a task that follows `events` until the ledger is dropped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_indexer(mut events: broadcast::Receiver<LedgerEvent>) -> IndexerHandle {
    let (tx, rx) = watch::channel(DepositProgress::default());

    let task = tokio::spawn(async move {
        let mut processed = 0u64;
        loop {
            match events.recv().await {
                Ok(LedgerEvent {
                    version,
                    event: RegistryEvent::MessageDeposited { message_count },
                }) => {
                    if version <= tx.borrow().version {
                        tracing::warn!(version, message_count, "stale deposit event ignored");
                        continue;
                    }
                    processed += 1;
                    tracing::info!(version, message_count, "message deposited");
                    tx.send_replace(DepositProgress {
                        version,
                        message_count,
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "indexer lagged; counts may jump");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(processed, "indexer stopped");
        processed
    });

    IndexerHandle { progress: rx, task }
}

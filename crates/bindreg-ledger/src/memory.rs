//! In-memory implementation of the Ledger trait.
//!
//! Same semantics as SQLite with no persistence. Used by tests and by
//! embedded deployments that rebuild state from elsewhere.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bindreg_core::{Ed25519PublicKey, RegistryParams, RegistryState};
use tokio::sync::broadcast;

use crate::error::{LedgerError, Result};
use crate::traits::{
    evaluate, publish, AppliedTransition, Ledger, LedgerEvent, Snapshot, StateTransition,
    SubmitOutcome,
};

/// Default capacity of the notification channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// In-memory ledger.
///
/// All data is lost when the ledger is dropped. Thread-safe via RwLock; the
/// write lock is held across evaluate-and-commit so submissions serialize.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
    events: broadcast::Sender<LedgerEvent>,
}

struct MemoryLedgerInner {
    state: RegistryState,
    history: Vec<AppliedTransition>,
}

impl MemoryLedgerInner {
    fn version(&self) -> u64 {
        self.history.len() as u64
    }
}

impl MemoryLedger {
    /// Deploy a new registry with `admin` as its privileged principal.
    pub fn deploy(admin: &Ed25519PublicKey, params: RegistryParams) -> Result<Self> {
        Self::deploy_with_event_capacity(admin, params, DEFAULT_EVENT_CAPACITY)
    }

    /// Deploy with a custom notification buffer size.
    pub fn deploy_with_event_capacity(
        admin: &Ed25519PublicKey,
        params: RegistryParams,
        event_capacity: usize,
    ) -> Result<Self> {
        params.validate()?;
        let (events, _) = broadcast::channel(event_capacity.max(1));
        tracing::info!(admin = %admin, capacity = params.capacity, "registry deployed in memory");
        Ok(Self {
            inner: RwLock::new(MemoryLedgerInner {
                state: RegistryState::initialize(admin, params),
                history: Vec::new(),
            }),
            events,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLedgerInner>> {
        self.inner
            .read()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLedgerInner>> {
        self.inner
            .write()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn read_state(&self) -> Result<Snapshot> {
        let inner = self.read()?;
        Ok(Snapshot {
            version: inner.version(),
            state: inner.state.clone(),
        })
    }

    async fn submit(&self, transition: StateTransition) -> Result<SubmitOutcome> {
        let (version, event) = {
            let mut inner = self.write()?;

            let outcome = match evaluate(&inner.state, &transition) {
                Ok(outcome) => outcome,
                Err(rejection) => {
                    tracing::debug!(
                        request = transition.request.request.name(),
                        caller = %transition.request.caller,
                        %rejection,
                        "transition rejected"
                    );
                    return Ok(SubmitOutcome::Rejected(rejection));
                }
            };

            let version = inner.version() + 1;
            inner.state = outcome.state;
            inner.history.push(AppliedTransition {
                version,
                request: transition.request,
                event: outcome.event,
            });
            // Under the write guard so receivers see versions in order.
            publish(&self.events, version, outcome.event);
            (version, outcome.event)
        };

        tracing::info!(version, "transition applied");
        Ok(SubmitOutcome::Applied { version, event })
    }

    async fn history(&self, after: u64, through: u64) -> Result<Vec<AppliedTransition>> {
        let inner = self.read()?;
        Ok(inner
            .history
            .iter()
            .filter(|t| t.version > after && t.version <= through)
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }
}

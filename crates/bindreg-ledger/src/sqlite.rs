//! SQLite implementation of the Ledger trait.
//!
//! The persistent backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via tokio::spawn_blocking. Each submission runs in one SQLite
//! transaction, so a crash never leaves a half-applied version behind.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bindreg_core::{Ed25519PublicKey, RegistryEvent, RegistryParams, RegistryState, SignedRequest};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;

use crate::error::{LedgerError, Result};
use crate::memory::DEFAULT_EVENT_CAPACITY;
use crate::migration::{self, now_millis};
use crate::traits::{
    evaluate, publish, AppliedTransition, Ledger, LedgerEvent, Rejection, Snapshot,
    StateTransition, SubmitOutcome,
};

/// SQLite-backed ledger.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking to
/// avoid blocking the async runtime.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    events: broadcast::Sender<LedgerEvent>,
}

impl SqliteLedger {
    /// Deploy a new registry into the database at `path`.
    ///
    /// Fails with [`LedgerError::AlreadyDeployed`] if the database already
    /// holds one.
    pub fn deploy(
        path: impl AsRef<Path>,
        admin: &Ed25519PublicKey,
        params: RegistryParams,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::deploy_into(conn, admin, params)
    }

    /// Deploy into an in-memory database. Useful for testing.
    pub fn deploy_memory(admin: &Ed25519PublicKey, params: RegistryParams) -> Result<Self> {
        Self::deploy_into(Connection::open_in_memory()?, admin, params)
    }

    /// Open the registry previously deployed at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        if !is_deployed(&conn)? {
            return Err(LedgerError::NotDeployed);
        }
        Ok(Self::from_conn(conn))
    }

    /// Replace the notification channel with one of the given size.
    ///
    /// Existing subscribers stop receiving events.
    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        self.events = events;
        self
    }

    fn deploy_into(
        mut conn: Connection,
        admin: &Ed25519PublicKey,
        params: RegistryParams,
    ) -> Result<Self> {
        params.validate()?;
        migration::migrate(&mut conn)?;
        if is_deployed(&conn)? {
            return Err(LedgerError::AlreadyDeployed);
        }

        let genesis = RegistryState::initialize(admin, params);
        conn.execute(
            "INSERT INTO deployment (id, admin, genesis_state, deployed_at) VALUES (1, ?1, ?2, ?3)",
            params![admin.0.as_slice(), encode_cbor(&genesis)?, now_millis()],
        )?;
        tracing::info!(admin = %admin, capacity = params.capacity, "registry deployed");

        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            events,
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| LedgerError::TaskFailed(e.to_string()))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| LedgerError::LockPoisoned(e.to_string()))
}

fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| LedgerError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
}

fn is_deployed(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM deployment", [], |row| row.get(0))?;
    Ok(count > 0)
}

/// The latest committed state, falling back to genesis.
fn load_snapshot(conn: &Connection) -> Result<Snapshot> {
    let latest: Option<(i64, Vec<u8>)> = conn
        .query_row(
            "SELECT version, state FROM transitions ORDER BY version DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    if let Some((version, state)) = latest {
        return Ok(Snapshot {
            version: version as u64,
            state: decode_cbor(&state)?,
        });
    }

    let genesis: Vec<u8> = conn
        .query_row(
            "SELECT genesis_state FROM deployment WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(LedgerError::NotDeployed)?;

    Ok(Snapshot {
        version: 0,
        state: decode_cbor(&genesis)?,
    })
}

type Committed = std::result::Result<(u64, Option<RegistryEvent>), Rejection>;

#[async_trait]
impl Ledger for SqliteLedger {
    async fn read_state(&self) -> Result<Snapshot> {
        self.blocking(|conn| load_snapshot(conn)).await
    }

    async fn submit(&self, transition: StateTransition) -> Result<SubmitOutcome> {
        let request_name = transition.request.request.name();
        let caller = transition.request.caller;

        let events = self.events.clone();
        let committed: Committed = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                let current = load_snapshot(&tx)?;

                let outcome = match evaluate(&current.state, &transition) {
                    Ok(outcome) => outcome,
                    Err(rejection) => return Ok(Err(rejection)),
                };

                let version = current.version + 1;
                let event = outcome
                    .event
                    .as_ref()
                    .map(encode_cbor)
                    .transpose()?;

                tx.execute(
                    "INSERT INTO transitions (
                        version, request_id, caller, request, state, event, applied_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        version as i64,
                        transition.request.id().0.as_slice(),
                        transition.request.caller.0.as_slice(),
                        transition.request.to_bytes(),
                        encode_cbor(&outcome.state)?,
                        event,
                        now_millis(),
                    ],
                )?;
                tx.commit()?;
                // Still holding the connection lock, so versions publish in order.
                publish(&events, version, outcome.event);

                Ok(Ok((version, outcome.event)))
            })
            .await?;

        match committed {
            Ok((version, event)) => {
                tracing::info!(version, request = request_name, "transition applied");
                Ok(SubmitOutcome::Applied { version, event })
            }
            Err(rejection) => {
                tracing::debug!(
                    request = request_name,
                    caller = %caller,
                    %rejection,
                    "transition rejected"
                );
                Ok(SubmitOutcome::Rejected(rejection))
            }
        }
    }

    async fn history(&self, after: u64, through: u64) -> Result<Vec<AppliedTransition>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT version, request, event FROM transitions
                 WHERE version > ?1 AND version <= ?2
                 ORDER BY version",
            )?;

            let rows = stmt
                .query_map(params![after as i64, through as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, Option<Vec<u8>>>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(version, request, event)| {
                    let request = SignedRequest::from_bytes(&request)
                        .map_err(|e| LedgerError::InvalidData(e.to_string()))?;
                    let event = event.as_deref().map(decode_cbor).transpose()?;
                    Ok(AppliedTransition {
                        version: version as u64,
                        request,
                        event,
                    })
                })
                .collect()
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindreg_core::{controller, Keypair, Message, RegistryError, Request, Witness};

    fn admin() -> Keypair {
        Keypair::from_seed(&[1; 32])
    }

    async fn submit(
        ledger: &SqliteLedger,
        signer: &Keypair,
        request: Request,
    ) -> SubmitOutcome {
        let state = ledger.read_state().await.unwrap().state;
        let proposed = controller::apply(&state, &signer.public_key(), &request)
            .map(|t| t.state)
            .unwrap_or(state);
        ledger
            .submit(StateTransition {
                request: SignedRequest::sign(signer, request),
                proposed,
            })
            .await
            .unwrap()
    }

    fn register_at_zero(candidate: &Keypair) -> Request {
        Request::RegisterIdentity {
            candidate: candidate.public_key(),
            witness: Witness::for_empty_tree(0),
        }
    }

    #[tokio::test]
    async fn test_deploy_memory_snapshot() {
        let ledger =
            SqliteLedger::deploy_memory(&admin().public_key(), RegistryParams::default()).unwrap();
        let snapshot = ledger.read_state().await.unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(
            snapshot.state,
            RegistryState::initialize(&admin().public_key(), RegistryParams::default())
        );
    }

    #[tokio::test]
    async fn test_submit_and_history() {
        let ledger =
            SqliteLedger::deploy_memory(&admin().public_key(), RegistryParams::default()).unwrap();
        let mut events = ledger.subscribe();
        let alice = Keypair::from_seed(&[2; 32]);

        assert!(submit(&ledger, &admin(), register_at_zero(&alice)).await.is_applied());

        let deposit = Request::DepositMessage {
            identity_witness: Witness::for_empty_tree(0),
            message: Message::new(123_423_432_423_423_434_100_000),
            message_witness: Witness::for_empty_tree(0),
        };
        let outcome = submit(&ledger, &alice, deposit.clone()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Applied {
                version: 2,
                event: Some(RegistryEvent::MessageDeposited { message_count: 1 })
            }
        );
        assert_eq!(events.recv().await.unwrap().version, 2);

        let history = ledger.history_since(0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].request.request, deposit);
        assert_eq!(history[1].caller(), &alice.public_key());
        assert!(history[0].event.is_none());

        let state = ledger.read_state().await.unwrap().state;
        assert_eq!(state.last_message, Message::new(123_423_432_423_423_434_100_000));
    }

    #[tokio::test]
    async fn test_rejected_submission_not_recorded() {
        let ledger =
            SqliteLedger::deploy_memory(&admin().public_key(), RegistryParams::default()).unwrap();
        let outsider = Keypair::from_seed(&[3; 32]);

        let outcome = submit(&ledger, &outsider, register_at_zero(&outsider)).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(Rejection::Registry(RegistryError::NotAdmin))
        );
        assert_eq!(ledger.read_state().await.unwrap().version, 0);
        assert!(ledger.history(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let alice = Keypair::from_seed(&[2; 32]);

        {
            let ledger =
                SqliteLedger::deploy(&path, &admin().public_key(), RegistryParams::default())
                    .unwrap();
            assert!(submit(&ledger, &admin(), register_at_zero(&alice)).await.is_applied());
        }

        let ledger = SqliteLedger::open(&path).unwrap();
        let snapshot = ledger.read_state().await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.state.identity_count, 0);
        assert_eq!(ledger.history_since(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        SqliteLedger::deploy(&path, &admin().public_key(), RegistryParams::default()).unwrap();
        let again = SqliteLedger::deploy(&path, &admin().public_key(), RegistryParams::default());
        assert!(matches!(again, Err(LedgerError::AlreadyDeployed)));
    }

    #[tokio::test]
    async fn test_open_without_deployment_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteLedger::open(dir.path().join("empty.db"));
        assert!(matches!(result, Err(LedgerError::NotDeployed)));
    }
}

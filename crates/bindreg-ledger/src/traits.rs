//! Ledger trait: the boundary between callers and committed registry state.
//!
//! A ledger holds exactly one registry. Callers read the committed state,
//! compute a proposed next state off-ledger, and submit the proposal with a
//! signed request. The ledger re-executes the request against the state it
//! holds at commit time and accepts the proposal only if both agree.

use async_trait::async_trait;
use bindreg_core::{
    controller, Ed25519PublicKey, LeafUpdate, RegistryError, RegistryEvent,
    RegistryState, SignedRequest, Transition,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Committed state together with its version.
///
/// Version 0 is the state created at deployment; each applied transition
/// increments it by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub state: RegistryState,
}

/// A signed request and the state its caller expects it to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub request: SignedRequest,
    pub proposed: RegistryState,
}

/// Why the ledger refused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The signature does not authenticate the caller.
    BadSignature,
    /// The registry refused the request against the current state.
    Registry(RegistryError),
    /// The request is valid but produces a different state than proposed.
    ProposalMismatch,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::BadSignature => write!(f, "bad signature"),
            Rejection::Registry(e) => write!(f, "{}", e),
            Rejection::ProposalMismatch => write!(f, "proposed state does not match"),
        }
    }
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The transition was committed at `version`.
    Applied {
        version: u64,
        event: Option<RegistryEvent>,
    },
    /// The transition was refused; committed state is unchanged.
    Rejected(Rejection),
}

impl SubmitOutcome {
    /// Whether the transition was committed.
    pub fn is_applied(&self) -> bool {
        matches!(self, SubmitOutcome::Applied { .. })
    }
}

/// A committed transition, as replayed by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransition {
    pub version: u64,
    pub request: SignedRequest,
    pub event: Option<RegistryEvent>,
}

impl AppliedTransition {
    /// The caller that submitted this transition.
    pub fn caller(&self) -> &Ed25519PublicKey {
        &self.request.caller
    }

    /// The leaf this transition wrote.
    pub fn update(&self) -> LeafUpdate {
        self.request.request.leaf_update()
    }
}

/// A published notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Version of the transition that emitted the event.
    pub version: u64,
    pub event: RegistryEvent,
}

/// Check a submission against the current state.
///
/// Verifies the signature, re-executes the request and compares the result
/// with the proposal. Shared by every ledger implementation so that they
/// accept exactly the same transitions.
pub fn evaluate(
    current: &RegistryState,
    transition: &StateTransition,
) -> std::result::Result<Transition, Rejection> {
    let signed = &transition.request;

    signed.verify().map_err(|_| Rejection::BadSignature)?;

    let outcome = controller::apply(current, &signed.caller, &signed.request)
        .map_err(Rejection::Registry)?;

    if outcome.state != transition.proposed {
        return Err(Rejection::ProposalMismatch);
    }

    Ok(outcome)
}

/// The Ledger trait: async interface to one deployed registry.
///
/// Submissions are serialized: each is evaluated against the state committed
/// immediately before it, so of two proposals built from the same snapshot at
/// most one can be applied.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Read the committed state.
    async fn read_state(&self) -> Result<Snapshot>;

    /// Submit a transition.
    ///
    /// Returns `Ok(Rejected(..))` when the registry refuses it; `Err` is
    /// reserved for infrastructure failures.
    async fn submit(&self, transition: StateTransition) -> Result<SubmitOutcome>;

    /// Committed transitions with `after < version <= through`, in order.
    async fn history(&self, after: u64, through: u64) -> Result<Vec<AppliedTransition>>;

    /// Subscribe to notifications emitted by future transitions.
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent>;

    /// Every transition committed after `after`, up to the current version.
    async fn history_since(&self, after: u64) -> Result<Vec<AppliedTransition>> {
        let snapshot = self.read_state().await?;
        if snapshot.version <= after {
            return Ok(Vec::new());
        }
        self.history(after, snapshot.version).await
    }
}

/// Publish `event` if present. Having no subscribers is not an error.
pub(crate) fn publish(
    sender: &broadcast::Sender<LedgerEvent>,
    version: u64,
    event: Option<RegistryEvent>,
) {
    if let Some(event) = event {
        let receivers = sender.send(LedgerEvent { version, event }).unwrap_or(0);
        tracing::trace!(version, receivers, "event published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindreg_core::{Keypair, RegistryParams, Request, Witness};

    fn setup() -> (Keypair, RegistryState) {
        let admin = Keypair::from_seed(&[1; 32]);
        let state = RegistryState::initialize(&admin.public_key(), RegistryParams::default());
        (admin, state)
    }

    fn register(admin: &Keypair, state: &RegistryState, seed: u8) -> StateTransition {
        let request = Request::RegisterIdentity {
            candidate: Keypair::from_seed(&[seed; 32]).public_key(),
            witness: Witness::for_empty_tree(0),
        };
        let proposed = controller::apply(state, &admin.public_key(), &request)
            .unwrap()
            .state;
        StateTransition {
            request: SignedRequest::sign(admin, request),
            proposed,
        }
    }

    #[test]
    fn test_evaluate_accepts_matching_proposal() {
        let (admin, state) = setup();
        let transition = register(&admin, &state, 2);
        let outcome = evaluate(&state, &transition).unwrap();
        assert_eq!(outcome.state, transition.proposed);
    }

    #[test]
    fn test_evaluate_rejects_bad_signature() {
        let (admin, state) = setup();
        let mut transition = register(&admin, &state, 2);
        transition.request.signature = Keypair::from_seed(&[9; 32]).sign(b"other");
        assert_eq!(evaluate(&state, &transition), Err(Rejection::BadSignature));
    }

    #[test]
    fn test_evaluate_rejects_inflated_proposal() {
        let (admin, state) = setup();
        let mut transition = register(&admin, &state, 2);
        transition.proposed.message_count = 99;
        assert_eq!(evaluate(&state, &transition), Err(Rejection::ProposalMismatch));
    }

    #[test]
    fn test_evaluate_reexecutes_against_current_state() {
        let (admin, state) = setup();
        let first = register(&admin, &state, 2);
        let second = register(&admin, &state, 3);

        let after_first = evaluate(&state, &first).unwrap().state;
        assert_eq!(
            evaluate(&after_first, &second),
            Err(Rejection::Registry(RegistryError::IndexMismatch {
                expected: 1,
                got: 0
            }))
        );
    }

    #[test]
    fn test_evaluate_non_admin_signer() {
        let (admin, state) = setup();
        let impostor = Keypair::from_seed(&[5; 32]);
        let mut transition = register(&admin, &state, 2);
        transition.request = SignedRequest::sign(&impostor, transition.request.request.clone());
        assert_eq!(
            evaluate(&state, &transition),
            Err(Rejection::Registry(RegistryError::NotAdmin))
        );
    }
}

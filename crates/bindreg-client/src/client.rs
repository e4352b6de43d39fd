//! Registry client: keeps local trees in step with a ledger and submits
//! proposals built from them.

use std::sync::Arc;

use bindreg_core::{
    controller, identity_digest, Ed25519PublicKey, Keypair, LeafUpdate, LogKind, Message,
    RegistryError, RegistryState, Request, SignedRequest, Transition, TREE_LEAVES,
};
use bindreg_ledger::{Ledger, Snapshot, StateTransition, SubmitOutcome};

use crate::error::{ClientError, Result};
use crate::tree::LocalTree;

/// A caller's view of one registry.
///
/// Holds the caller's keypair and a materialized copy of both trees. Every
/// operation syncs first, proposes against the snapshot it read, and submits
/// exactly once. Local trees advance only when the ledger applies the
/// proposal.
pub struct RegistryClient<L> {
    ledger: Arc<L>,
    keypair: Keypair,
    identities: LocalTree,
    messages: LocalTree,
    synced_version: u64,
}

impl<L: Ledger> RegistryClient<L> {
    /// Create a client for `keypair`. Call [`Self::sync`] before reading
    /// the trees.
    pub fn new(ledger: Arc<L>, keypair: Keypair) -> Self {
        Self {
            ledger,
            keypair,
            identities: LocalTree::new(),
            messages: LocalTree::new(),
            synced_version: 0,
        }
    }

    /// The caller's public identity.
    pub fn identity(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// The last ledger version replayed into the local trees.
    pub fn synced_version(&self) -> u64 {
        self.synced_version
    }

    pub fn identity_tree(&self) -> &LocalTree {
        &self.identities
    }

    pub fn message_tree(&self) -> &LocalTree {
        &self.messages
    }

    /// The slot bound to this caller, if registered as of the last sync.
    pub fn slot(&self) -> Option<u32> {
        self.identities.position(&identity_digest(&self.identity()))
    }

    /// Replay committed transitions and check the local roots.
    pub async fn sync(&mut self) -> Result<Snapshot> {
        let snapshot = self.ledger.read_state().await?;

        if snapshot.version > self.synced_version {
            let history = self
                .ledger
                .history(self.synced_version, snapshot.version)
                .await?;
            for applied in history {
                let expected = self.synced_version + 1;
                if applied.version != expected {
                    return Err(ClientError::HistoryGap {
                        expected,
                        got: applied.version,
                    });
                }
                self.apply_update(applied.update())?;
                self.synced_version = applied.version;
            }
            if self.synced_version != snapshot.version {
                return Err(ClientError::HistoryGap {
                    expected: snapshot.version,
                    got: self.synced_version,
                });
            }
            tracing::debug!(version = self.synced_version, "client synced");
        }

        self.check_roots(&snapshot.state)?;
        Ok(snapshot)
    }

    /// Admit `candidate` at the next identity slot. Admin only.
    ///
    /// Returns the slot the candidate now occupies.
    pub async fn register_identity(&mut self, candidate: &Ed25519PublicKey) -> Result<u32> {
        let snapshot = self.sync().await?;
        let state = &snapshot.state;

        // Past capacity the controller refuses before it looks at the
        // witness, so any in-range slot will do.
        let slot = (state.next_identity_index() as u32).min(TREE_LEAVES - 1);
        let witness = self.identities.witness(slot)?;

        let request = Request::RegisterIdentity {
            candidate: *candidate,
            witness,
        };
        let transition = controller::register_identity(state, &self.identity(), candidate, &witness)?;
        self.submit(&snapshot, request, transition).await?;
        Ok(slot)
    }

    /// Deposit `message` into the slot bound to this caller.
    ///
    /// Returns the message count after the deposit.
    pub async fn deposit_message(&mut self, message: Message) -> Result<u64> {
        let snapshot = self.sync().await?;
        let slot = self.slot().ok_or(RegistryError::NotEligible)?;

        let identity_witness = self.identities.witness(slot)?;
        let message_witness = self.messages.witness(slot)?;

        let request = Request::DepositMessage {
            identity_witness,
            message,
            message_witness,
        };
        let transition = controller::deposit_message(
            &snapshot.state,
            &self.identity(),
            &identity_witness,
            message,
            &message_witness,
        )?;
        let count = transition.state.message_count;
        self.submit(&snapshot, request, transition).await?;
        Ok(count)
    }

    async fn submit(
        &mut self,
        base: &Snapshot,
        request: Request,
        transition: Transition,
    ) -> Result<()> {
        let name = request.name();
        let update = transition.update;
        let proposal = StateTransition {
            request: SignedRequest::sign(&self.keypair, request),
            proposed: transition.state,
        };

        match self.ledger.submit(proposal).await? {
            SubmitOutcome::Applied { version, .. } if version == base.version + 1 => {
                self.apply_update(update)?;
                self.synced_version = version;
                tracing::debug!(version, request = name, "proposal applied");
                Ok(())
            }
            SubmitOutcome::Applied { version, .. } => {
                // Applied on top of transitions we have not seen; replay them.
                tracing::debug!(version, request = name, "proposal applied, catching up");
                self.sync().await.map(|_| ())
            }
            SubmitOutcome::Rejected(rejection) => {
                tracing::warn!(request = name, %rejection, "proposal rejected");
                Err(ClientError::Rejected(rejection))
            }
        }
    }

    fn apply_update(&mut self, update: LeafUpdate) -> Result<()> {
        let tree = match update.log {
            LogKind::Identity => &mut self.identities,
            LogKind::Message => &mut self.messages,
        };
        tree.insert(update.index, update.value)?;
        Ok(())
    }

    fn check_roots(&self, state: &RegistryState) -> Result<()> {
        let checks = [
            (LogKind::Identity, self.identities.root(), state.identity_commitment),
            (LogKind::Message, self.messages.root(), state.message_commitment),
        ];
        for (log, local, committed) in checks {
            if local != committed {
                return Err(ClientError::Diverged {
                    log,
                    local,
                    committed,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindreg_core::RegistryParams;
    use bindreg_ledger::{MemoryLedger, Rejection};

    fn admin() -> Keypair {
        Keypair::from_seed(&[1; 32])
    }

    fn ledger() -> Arc<MemoryLedger> {
        Arc::new(MemoryLedger::deploy(&admin().public_key(), RegistryParams::default()).unwrap())
    }

    #[tokio::test]
    async fn test_register_then_deposit() {
        let ledger = ledger();
        let alice = Keypair::from_seed(&[2; 32]);

        let mut admin_client = RegistryClient::new(ledger.clone(), admin());
        assert_eq!(admin_client.register_identity(&alice.public_key()).await.unwrap(), 0);
        assert_eq!(admin_client.synced_version(), 1);

        let mut alice_client = RegistryClient::new(ledger.clone(), alice);
        alice_client.sync().await.unwrap();
        assert_eq!(alice_client.slot(), Some(0));

        let count = alice_client
            .deposit_message(Message::new(123_423_432_423_423_434_100_000))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            alice_client.message_tree().root(),
            ledger.read_state().await.unwrap().state.message_commitment
        );
    }

    #[tokio::test]
    async fn test_unregistered_caller_refused_locally() {
        let mut client = RegistryClient::new(ledger(), Keypair::from_seed(&[9; 32]));
        let err = client.deposit_message(Message::new(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::Registry(RegistryError::NotEligible)));
    }

    #[tokio::test]
    async fn test_non_admin_register_refused_locally() {
        let mut client = RegistryClient::new(ledger(), Keypair::from_seed(&[9; 32]));
        let err = client
            .register_identity(&Keypair::from_seed(&[3; 32]).public_key())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Registry(RegistryError::NotAdmin)));
    }

    #[tokio::test]
    async fn test_stale_client_rejected_by_ledger() {
        let ledger = ledger();
        let alice = Keypair::from_seed(&[2; 32]);
        let mut admin_client = RegistryClient::new(ledger.clone(), admin());
        admin_client.register_identity(&alice.public_key()).await.unwrap();

        let mut alice_client = RegistryClient::new(ledger.clone(), alice.clone());
        alice_client.sync().await.unwrap();

        // Build a proposal from alice's snapshot, then let another deposit win.
        let snapshot = ledger.read_state().await.unwrap();
        let witness = alice_client.identity_tree().witness(0).unwrap();
        let message_witness = alice_client.message_tree().witness(0).unwrap();
        let request = Request::DepositMessage {
            identity_witness: witness,
            message: Message::new(110),
            message_witness,
        };
        let stale = controller::apply(&snapshot.state, &alice.public_key(), &request).unwrap();

        alice_client.deposit_message(Message::new(100_000)).await.unwrap();

        let outcome = ledger
            .submit(StateTransition {
                request: SignedRequest::sign(&alice, request),
                proposed: stale.state,
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(Rejection::Registry(RegistryError::MessageSlotFull {
                index: 0
            }))
        );
    }

    #[tokio::test]
    async fn test_second_deposit_rejected() {
        let ledger = ledger();
        let alice = Keypair::from_seed(&[2; 32]);
        RegistryClient::new(ledger.clone(), admin())
            .register_identity(&alice.public_key())
            .await
            .unwrap();

        let mut client = RegistryClient::new(ledger, alice);
        client.deposit_message(Message::new(100_000)).await.unwrap();
        let err = client.deposit_message(Message::new(110)).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Registry(RegistryError::MessageSlotFull { index: 0 })
        ));
    }
}

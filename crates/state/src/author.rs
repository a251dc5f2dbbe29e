//! Authoring signed transactions for the local agent's own sessions.

use crate::verified::VerifiedState;
use lattice_crypto::hash::blake3_chain;
use lattice_crypto::sign::Ed25519KeyPair;
use lattice_types::error::TransactionError;
use lattice_types::session::{
    AgentId, ChainLink, SessionId, SignatureBytes, Transaction,
};

/// Derives the agent identifier for a key pair.
pub fn agent_id(keypair: &Ed25519KeyPair) -> AgentId {
    AgentId(keypair.public_key().to_bytes())
}

/// A writer handle for one session: the signing key plus the session it
/// authors. Produces transactions that verify against the session's agent
/// identifier.
pub struct SessionAuthor {
    keypair: Ed25519KeyPair,
    session: SessionId,
}

impl SessionAuthor {
    /// Creates an author for `keypair`'s session number `counter`.
    pub fn new(keypair: Ed25519KeyPair, counter: u64) -> Self {
        let session = SessionId::new(agent_id(&keypair), counter);
        Self { keypair, session }
    }

    /// Generates a fresh key pair and wraps it as session `counter`.
    pub fn generate(counter: u64) -> Self {
        Self::new(Ed25519KeyPair::generate(), counter)
    }

    /// The session this author writes to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Builds the signed transaction that would extend `state`'s log for
    /// this session by one entry, without applying it.
    pub fn transaction_after(&self, state: &VerifiedState, payload: Vec<u8>) -> Transaction {
        let prev = state.expected_prev_link(&self.session);
        let link = ChainLink(blake3_chain(&prev, &payload));
        let signature = SignatureBytes(self.keypair.sign(&link.0).to_bytes().to_vec());
        Transaction {
            payload,
            link,
            signature,
        }
    }

    /// Signs `payload` and appends it to `state`'s log for this session.
    pub fn append_to(
        &self,
        state: &mut VerifiedState,
        payload: Vec<u8>,
    ) -> Result<(), TransactionError> {
        let starting_at = state
            .known_state()
            .sessions
            .get(&self.session)
            .copied()
            .unwrap_or(0);
        let tx = self.transaction_after(state, payload);
        state.try_add_transactions(self.session, starting_at, &[tx], true)
    }
}

//! The process-wide node coordinator.

use lattice_crypto::sign::Ed25519KeyPair;
use lattice_state::author::{agent_id, SessionAuthor};
use lattice_sync::{CoValueCore, LoadResult, PeerId, PeerRole, PeerTransport, SyncManager};
use lattice_types::config::SyncConfig;
use lattice_types::covalue::{CoValueHeader, CoValueId};
use lattice_types::error::CoValueError;
use lattice_types::session::AgentId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One node: the cryptographic identity, the peer set, and the registry
/// guaranteeing exactly one [`CoValueCore`] per identifier for the node's
/// lifetime.
///
/// Lifecycle: construct, attach peers, operate, [`LocalNode::shutdown`].
/// There is no ambient global; everything hangs off this value.
pub struct LocalNode {
    agent: Ed25519KeyPair,
    agent_id: AgentId,
    sync: Arc<SyncManager>,
    session_counter: AtomicU64,
}

impl LocalNode {
    /// Creates a node with a freshly generated identity.
    pub fn new(config: SyncConfig) -> Arc<Self> {
        Self::with_identity(Ed25519KeyPair::generate(), config)
    }

    /// Creates a node around an existing identity key pair.
    pub fn with_identity(agent: Ed25519KeyPair, config: SyncConfig) -> Arc<Self> {
        let agent_id = agent_id(&agent);
        let sync = SyncManager::new(config);
        tracing::info!(target: "node", agent = %agent_id, "node_created");
        Arc::new(Self {
            agent,
            agent_id,
            sync,
            session_counter: AtomicU64::new(0),
        })
    }

    /// The node's writer identity.
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// The sync manager owning peers and the core registry.
    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    /// Attaches a peer and returns its transport-facing half.
    pub fn attach_peer(&self, id: PeerId, role: PeerRole) -> PeerTransport {
        self.sync.attach_peer(id, role)
    }

    /// Returns the core for `id`, creating one in `unknown` if absent.
    pub fn get_or_create(&self, id: CoValueId) -> Arc<CoValueCore> {
        self.sync.get_or_create(id)
    }

    /// Creates a CoValue locally: derives the identifier from `header` and
    /// installs it as available. Calling this twice with the same header
    /// returns the same core.
    pub fn create_covalue(&self, header: CoValueHeader) -> Result<Arc<CoValueCore>, CoValueError> {
        let id = lattice_state::verified::id_for_header(&header)?;
        let core = self.sync.get_or_create(id);
        core.provide_header(header)?;
        Ok(core)
    }

    /// Starts a fresh session of this node's agent, for authoring
    /// transactions.
    pub fn new_session(&self) -> SessionAuthor {
        let counter = self.session_counter.fetch_add(1, Ordering::Relaxed);
        SessionAuthor::new(self.agent.clone(), counter)
    }

    /// Loads `id` from the attached peers and resolves with the outcome.
    pub async fn load(&self, id: CoValueId) -> LoadResult {
        self.sync.load_covalue(id).await
    }

    /// Closes every peer; in-flight loads settle as if each peer answered
    /// not-found.
    pub fn shutdown(&self) {
        tracing::info!(target: "node", agent = %self.agent_id, "node_shutdown");
        self.sync.shutdown();
    }
}

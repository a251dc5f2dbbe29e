//! Orchestrates loads across peers and routes inbound messages to the
//! owning CoValue cores.

use crate::core::{ContentOutcome, CoValueCore, LoadResult};
use crate::message::{NewContentMessage, SessionNewContent, SyncMessage};
use crate::metrics::metrics;
use crate::peer::{Peer, PeerId, PeerRole, PeerState, PeerTransport};
use lattice_state::verified::VerifiedState;
use lattice_telemetry::http::{EngineStatus, StatusSource};
use lattice_telemetry::time::LoadTimer;
use lattice_types::config::SyncConfig;
use lattice_types::covalue::CoValueId;
use lattice_types::known::CoValueKnownState;
use lattice_types::session::SessionId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Routes inbound messages to CoValue cores, serves remote load requests,
/// and bounds the number of in-flight load attempts.
///
/// The manager owns the peer set and the core registry; cores reach peers
/// only through the solicited handles the manager passed them, never
/// through each other (the registry is the only shared structure, and its
/// updates are serialized).
pub struct SyncManager {
    config: SyncConfig,
    peers: Mutex<HashMap<PeerId, Arc<dyn Peer>>>,
    registry: Mutex<HashMap<CoValueId, Arc<CoValueCore>>>,
    load_permits: Arc<Semaphore>,
    shutting_down: AtomicBool,
}

impl SyncManager {
    /// Creates a manager with no peers and an empty registry.
    pub fn new(config: SyncConfig) -> Arc<Self> {
        let load_permits = Arc::new(Semaphore::new(config.max_in_flight_loads));
        Arc::new(Self {
            config,
            peers: Mutex::new(HashMap::new()),
            registry: Mutex::new(HashMap::new()),
            load_permits,
            shutting_down: AtomicBool::new(false),
        })
    }

    /// The configuration this manager (and every core it creates) runs with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the core for `id`, creating one in `unknown` if absent.
    /// Atomic: concurrent callers observe the same core.
    pub fn get_or_create(&self, id: CoValueId) -> Arc<CoValueCore> {
        self.registry
            .lock()
            .entry(id)
            .or_insert_with(|| CoValueCore::from_id(id, self.config.clone()))
            .clone()
    }

    /// Returns the core for `id` if one exists.
    pub fn get(&self, id: &CoValueId) -> Option<Arc<CoValueCore>> {
        self.registry.lock().get(id).cloned()
    }

    /// The number of live cores in the registry.
    pub fn covalue_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// The peer handle for `id`, if attached and not yet removed.
    pub fn peer(&self, id: &PeerId) -> Option<Arc<dyn Peer>> {
        self.peers.lock().get(id).cloned()
    }

    /// All attached peers, in identifier order.
    pub fn connected_peers(&self) -> Vec<Arc<dyn Peer>> {
        let peers = self.peers.lock();
        let mut all: Vec<Arc<dyn Peer>> = peers.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Attaches a new peer and spawns its dispatch loop. Returns the
    /// transport-facing half: the wire adapter reads outbound messages
    /// from it and feeds inbound messages into it.
    pub fn attach_peer(self: &Arc<Self>, id: PeerId, role: PeerRole) -> PeerTransport {
        let (peer, incoming, transport) =
            PeerState::new(id.clone(), role, self.config.outbound_queue_high_water);
        self.peers
            .lock()
            .insert(id.clone(), Arc::clone(&peer) as Arc<dyn Peer>);
        metrics().inc_connected_peers();
        tracing::info!(target: "sync", peer = %id, role = ?role, "peer_attached");
        tokio::spawn(Arc::clone(self).run_peer_dispatch(peer, incoming));
        transport
    }

    /// Reads one peer's inbound stream until it closes, then settles every
    /// core that was still waiting on the peer.
    async fn run_peer_dispatch(
        self: Arc<Self>,
        peer: Arc<PeerState>,
        mut incoming: mpsc::Receiver<SyncMessage>,
    ) {
        let mut closed = peer.closed_watch();
        if *closed.borrow() {
            peer.close();
            self.handle_peer_closed(peer.id());
            return;
        }
        loop {
            tokio::select! {
                changed = closed.changed() => {
                    match changed {
                        Ok(()) => {
                            if *closed.borrow() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                },
                message = incoming.recv() => match message {
                    Some(message) => self.handle_incoming(peer.id(), message).await,
                    None => break,
                }
            }
        }
        peer.close();
        self.handle_peer_closed(peer.id());
    }

    /// Removes a closed peer and treats it as not-found for every core
    /// with a pending solicitation on it.
    fn handle_peer_closed(&self, id: &PeerId) {
        if self.peers.lock().remove(id).is_some() {
            metrics().dec_connected_peers();
            tracing::info!(target: "sync", peer = %id, "peer_removed");
        }
        let cores: Vec<Arc<CoValueCore>> = self.registry.lock().values().cloned().collect();
        for core in cores {
            core.handle_peer_closed(id);
        }
    }

    /// Routes one inbound message from `from` to the core it concerns,
    /// creating the core in `unknown` if absent.
    pub async fn handle_incoming(self: &Arc<Self>, from: &PeerId, message: SyncMessage) {
        metrics().inc_messages_received(message.action());
        tracing::trace!(target: "sync", peer = %from, action = message.action(), id = %message.id(), "message_received");
        match message {
            SyncMessage::Load(known) => self.handle_load(from, known).await,
            SyncMessage::Known(known) => self.reconcile(from, known).await,
            SyncMessage::Content(content) => self.handle_content(from, content).await,
            SyncMessage::Done { id } => {
                self.get_or_create(id).mark_not_found_in_peer(from);
            }
        }
    }

    /// Serves a remote load request: a content delta when we hold the
    /// value, `done` when we do not, plus a load of our own if the
    /// requester's known state reveals content we lack.
    async fn handle_load(&self, from: &PeerId, known: CoValueKnownState) {
        let core = self.get_or_create(known.id);
        let Some(peer) = self.peer(from) else {
            return;
        };
        match core.verified() {
            Some(verified) => {
                match content_reply(&verified, &known) {
                    Some(content) => {
                        self.push_to(&peer, SyncMessage::Content(content)).await;
                    }
                    None => {
                        // The requester is fully caught up; acknowledge
                        // with our summary so it can stop waiting.
                        self.push_to(&peer, SyncMessage::Known(verified.known_state()))
                            .await;
                    }
                }
                let diff = verified.known_state().diff(&known);
                if !diff.missing.is_empty() {
                    self.push_to(&peer, SyncMessage::Load(verified.known_state()))
                        .await;
                }
            }
            None => {
                self.push_to(&peer, SyncMessage::Done { id: known.id }).await;
            }
        }
    }

    /// Applies a remote known-state advertisement: push what the remote
    /// lacks, pull what we lack, and count an empty advertisement from a
    /// solicited peer as not-found.
    async fn reconcile(&self, from: &PeerId, remote: CoValueKnownState) {
        let core = self.get_or_create(remote.id);
        let Some(peer) = self.peer(from) else {
            return;
        };
        match core.verified() {
            Some(verified) => {
                if let Some(content) = content_reply(&verified, &remote) {
                    self.push_to(&peer, SyncMessage::Content(content)).await;
                }
                let diff = verified.known_state().diff(&remote);
                if !diff.missing.is_empty() {
                    self.push_to(&peer, SyncMessage::Load(verified.known_state()))
                        .await;
                }
            }
            None => {
                if remote.header {
                    self.push_to(&peer, SyncMessage::Load(core.known_state()))
                        .await;
                } else {
                    core.mark_not_found_in_peer(from);
                }
            }
        }
    }

    /// Applies a content message, attributing verification failures to the
    /// sending peer only.
    async fn handle_content(&self, from: &PeerId, content: NewContentMessage) {
        let core = self.get_or_create(content.id);
        match core.apply_content_from_peer(&content, from, self.config.verify_signatures) {
            Ok(ContentOutcome::Applied) => {}
            Ok(ContentOutcome::MissingHeader) => {
                tracing::warn!(target: "sync", peer = %from, id = %content.id, "content_without_header");
                if let Some(peer) = self.peer(from) {
                    self.push_to(&peer, SyncMessage::Known(core.known_state()))
                        .await;
                }
            }
            Err(err) => core.mark_errored(from, err),
        }
    }

    /// Loads `id` from every attached peer, bounded by the global
    /// in-flight limit, and resolves with the attempt's outcome.
    pub async fn load_covalue(self: &Arc<Self>, id: CoValueId) -> LoadResult {
        let _permit = Arc::clone(&self.load_permits).acquire_owned().await.ok();
        let _timer = LoadTimer::new(metrics());
        let core = self.get_or_create(id);
        let peers = self.connected_peers();
        core.load_from_peers(peers).await
    }

    /// True once [`SyncManager::shutdown`] has been called; readiness
    /// probes flip to draining.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Begins draining: marks the manager as shutting down and closes
    /// every attached peer. Dispatch loops terminate and settle their
    /// cores; in-flight loads resolve as if every peer answered not-found.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let peers: Vec<Arc<dyn Peer>> = self.peers.lock().values().cloned().collect();
        for peer in peers {
            peer.close();
        }
    }

    async fn push_to(&self, peer: &Arc<dyn Peer>, message: SyncMessage) {
        let action = message.action();
        if let Err(e) = peer.push_outgoing_message(message).await {
            tracing::debug!(target: "sync", peer = %peer.id(), action, error = %e, "push_failed");
        }
    }
}

impl StatusSource for SyncManager {
    fn status(&self) -> EngineStatus {
        EngineStatus {
            connected_peers: self.peers.lock().len(),
            covalues: self.covalue_count(),
            accepting: !self.is_shutting_down(),
        }
    }
}

/// Builds the content message covering everything `remote` lacks, or
/// `None` when it is fully caught up.
fn content_reply(
    verified: &VerifiedState,
    remote: &CoValueKnownState,
) -> Option<NewContentMessage> {
    let header = if remote.header {
        None
    } else {
        Some(verified.header().clone())
    };
    let new: BTreeMap<SessionId, SessionNewContent> = verified
        .sessions_after(remote)
        .into_iter()
        .map(|(session, (after, transactions))| {
            (
                session,
                SessionNewContent {
                    after,
                    transactions,
                },
            )
        })
        .collect();
    if header.is_none() && new.is_empty() {
        return None;
    }
    Some(NewContentMessage {
        id: verified.id(),
        header,
        new,
    })
}

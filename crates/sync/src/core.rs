//! The per-CoValue load/sync state machine.

use crate::message::{NewContentMessage, SyncMessage};
use crate::metrics::metrics;
use crate::peer::{Peer, PeerId, PeerRole};
use lattice_state::author::SessionAuthor;
use lattice_state::verified::{id_for_header, VerifiedState};
use lattice_telemetry::error_metrics;
use lattice_types::config::SyncConfig;
use lattice_types::covalue::{CoValueHeader, CoValueId};
use lattice_types::error::{CoValueError, ErrorCode, SyncError};
use lattice_types::known::CoValueKnownState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// The externally visible lifecycle state of a CoValue core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingState {
    /// Created, never loaded; nothing is known about the content.
    Unknown,
    /// A load attempt is in flight.
    Loading,
    /// The header (and possibly content) is present and verified.
    Available,
    /// The last load attempt exhausted every peer without finding the value.
    Unavailable,
    /// The last load attempt saw every contacted peer fail verification.
    Errored,
}

impl LoadingState {
    /// The metrics/logging label for this state.
    pub fn label(&self) -> &'static str {
        match self {
            LoadingState::Unknown => "unknown",
            LoadingState::Loading => "loading",
            LoadingState::Available => "available",
            LoadingState::Unavailable => "unavailable",
            LoadingState::Errored => "errored",
        }
    }
}

/// The resolved outcome of a load attempt, handed to every observer.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// The verified content; `None` when the value was unavailable.
    pub verified: Option<VerifiedState>,
}

/// What a content message did when applied to a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    /// Header and transactions were verified and installed.
    Applied,
    /// The message carried no header and the core has none; nothing could
    /// be verified. The sender should be told what we hold.
    MissingHeader,
}

/// Per-peer outcome within the current load attempt. Also drives the skip
/// policy for later broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerOutcome {
    Pending,
    NotFound,
    Errored,
    ProvidedContent,
}

struct SolicitedPeer {
    handle: Arc<dyn Peer>,
    outcome: PeerOutcome,
}

enum CoreState {
    Unknown,
    Loading,
    Available(VerifiedState),
    Unavailable,
    Errored,
}

impl CoreState {
    fn loading_state(&self) -> LoadingState {
        match self {
            CoreState::Unknown => LoadingState::Unknown,
            CoreState::Loading => LoadingState::Loading,
            CoreState::Available(_) => LoadingState::Available,
            CoreState::Unavailable => LoadingState::Unavailable,
            CoreState::Errored => LoadingState::Errored,
        }
    }
}

struct CoreInner {
    state: CoreState,
    /// Peers solicited for this CoValue, with their per-attempt outcome.
    /// Entries persist across attempts so broadcasts can skip peers that
    /// errored or came up empty.
    solicited: HashMap<PeerId, SolicitedPeer>,
    /// One-shot observers awaiting resolution, in registration order.
    waiters: Vec<oneshot::Sender<LoadResult>>,
    /// Monotonic load-attempt counter; stale deadline timers check it.
    attempt: u64,
}

/// The state machine owning the load lifecycle and observers of one
/// CoValue.
///
/// All transitions happen under one internal lock, which is never held
/// across an await; cross-peer work (pushes, deadline timers) is spawned
/// onto the runtime.
pub struct CoValueCore {
    id: CoValueId,
    config: SyncConfig,
    inner: Mutex<CoreInner>,
}

impl CoValueCore {
    /// Creates a core in the `unknown` state for `id`.
    pub fn from_id(id: CoValueId, config: SyncConfig) -> Arc<Self> {
        metrics().inc_covalue_state(LoadingState::Unknown.label());
        Arc::new(Self {
            id,
            config,
            inner: Mutex::new(CoreInner {
                state: CoreState::Unknown,
                solicited: HashMap::new(),
                waiters: Vec::new(),
                attempt: 0,
            }),
        })
    }

    /// The CoValue this core manages.
    pub fn id(&self) -> CoValueId {
        self.id
    }

    /// The current lifecycle state.
    pub fn loading_state(&self) -> LoadingState {
        self.inner.lock().state.loading_state()
    }

    /// A clone of the verified content, if the core is available.
    pub fn verified(&self) -> Option<VerifiedState> {
        match &self.inner.lock().state {
            CoreState::Available(verified) => Some(verified.clone()),
            _ => None,
        }
    }

    /// Our current known state: the verified summary when available,
    /// otherwise the empty summary.
    pub fn known_state(&self) -> CoValueKnownState {
        match &self.inner.lock().state {
            CoreState::Available(verified) => verified.known_state(),
            _ => CoValueKnownState::empty(self.id),
        }
    }

    fn set_state(&self, inner: &mut CoreInner, new: CoreState) {
        let from = inner.state.loading_state();
        let to = new.loading_state();
        metrics().dec_covalue_state(from.label());
        metrics().inc_covalue_state(to.label());
        tracing::debug!(target: "sync", id = %self.id, from = from.label(), to = to.label(), "state_transition");
        inner.state = new;
    }

    /// Resolves once the core reaches `available` or exhausts a load
    /// attempt. Observers registered before resolution are completed
    /// exactly once, in registration order; observers registered after
    /// resolution read the current outcome synchronously.
    pub async fn wait_for_available_or_unavailable(&self) -> LoadResult {
        let receiver = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match &inner.state {
                CoreState::Available(verified) => {
                    return LoadResult {
                        verified: Some(verified.clone()),
                    }
                }
                CoreState::Unavailable | CoreState::Errored => {
                    return LoadResult { verified: None }
                }
                CoreState::Unknown | CoreState::Loading => {
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push(tx);
                    rx
                }
            }
        };
        receiver
            .await
            .unwrap_or(LoadResult { verified: None })
    }

    /// Starts a load attempt against `peers` and resolves when the core
    /// leaves `loading`.
    ///
    /// Closed peers are never contacted. Storage-role peers are contacted
    /// first when the configuration asks for it. Calling this on an
    /// `available` core is a no-op; calling it while a load is in flight
    /// joins that attempt.
    pub async fn load_from_peers(self: &Arc<Self>, peers: Vec<Arc<dyn Peer>>) -> LoadResult {
        let mut to_contact: Vec<Arc<dyn Peer>> = Vec::new();
        let mut started = false;
        let attempt;
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if let CoreState::Available(verified) = &inner.state {
                return LoadResult {
                    verified: Some(verified.clone()),
                };
            }
            if !matches!(inner.state, CoreState::Loading) {
                started = true;
                inner.attempt += 1;
                self.set_state(inner, CoreState::Loading);
                let mut ordered = peers;
                if self.config.storage_first {
                    ordered.sort_by_key(|peer| match peer.role() {
                        PeerRole::Storage => 0u8,
                        PeerRole::Server => 1,
                        PeerRole::Client => 2,
                    });
                }
                for peer in ordered {
                    if peer.closed() {
                        tracing::trace!(target: "sync", id = %self.id, peer = %peer.id(), "skip_closed_peer");
                        continue;
                    }
                    inner.solicited.insert(
                        peer.id().clone(),
                        SolicitedPeer {
                            handle: Arc::clone(&peer),
                            outcome: PeerOutcome::Pending,
                        },
                    );
                    to_contact.push(peer);
                }
            }
            attempt = inner.attempt;
        }

        if started {
            let known = self.known_state();
            for peer in &to_contact {
                if peer
                    .push_outgoing_message(SyncMessage::Load(known.clone()))
                    .await
                    .is_err()
                {
                    self.settle_peer(peer.id(), PeerOutcome::NotFound, "push_failed");
                    continue;
                }
                let core = Arc::clone(self);
                let peer_id = peer.id().clone();
                let deadline = self.config.load_deadline();
                tokio::spawn(async move {
                    tokio::time::sleep(deadline).await;
                    core.deadline_elapsed(&peer_id, attempt);
                });
            }
            if to_contact.is_empty() {
                // Nothing to wait for; terminate the attempt right away.
                let mut inner = self.inner.lock();
                self.check_termination(&mut inner);
            }
        }

        self.wait_for_available_or_unavailable().await
    }

    /// Records that `peer` answered it does not hold this CoValue.
    pub fn mark_not_found_in_peer(&self, peer: &PeerId) {
        self.settle_peer(peer, PeerOutcome::NotFound, "not_found");
    }

    /// Records that `peer` supplied content that failed verification. The
    /// peer is excluded from the rest of this attempt and from later
    /// broadcasts for this CoValue; the core's state is otherwise
    /// unchanged.
    pub fn mark_errored(&self, peer: &PeerId, err: SyncError) {
        tracing::warn!(target: "sync", id = %self.id, peer = %peer, code = err.code(), error = %err, "peer_errored");
        error_metrics().inc_error("sync", err.code());
        self.settle_peer(peer, PeerOutcome::Errored, "errored");
    }

    /// Treats a closed peer as not-found for any pending solicitation.
    pub fn handle_peer_closed(&self, peer: &PeerId) {
        self.settle_peer(peer, PeerOutcome::NotFound, "peer_closed");
    }

    fn deadline_elapsed(&self, peer: &PeerId, attempt: u64) {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt {
            return;
        }
        self.settle_peer_locked(&mut inner, peer, PeerOutcome::NotFound, "deadline");
    }

    fn settle_peer(&self, peer: &PeerId, outcome: PeerOutcome, reason: &'static str) {
        let mut inner = self.inner.lock();
        self.settle_peer_locked(&mut inner, peer, outcome, reason);
    }

    fn settle_peer_locked(
        &self,
        inner: &mut CoreInner,
        peer: &PeerId,
        outcome: PeerOutcome,
        reason: &'static str,
    ) {
        let Some(entry) = inner.solicited.get_mut(peer) else {
            return;
        };
        if entry.outcome != PeerOutcome::Pending {
            return;
        }
        entry.outcome = outcome;
        tracing::debug!(target: "sync", id = %self.id, peer = %peer, reason, "peer_settled");
        self.check_termination(inner);
    }

    /// The termination rule: a loading core resolves `unavailable` (or
    /// `errored`, when every contacted peer errored) once no solicited
    /// peer is still pending.
    fn check_termination(&self, inner: &mut CoreInner) {
        if !matches!(inner.state, CoreState::Loading) {
            return;
        }
        let mut contacted = 0usize;
        let mut errored = 0usize;
        for entry in inner.solicited.values() {
            match entry.outcome {
                PeerOutcome::Pending => return,
                PeerOutcome::Errored => {
                    contacted += 1;
                    errored += 1;
                }
                PeerOutcome::NotFound | PeerOutcome::ProvidedContent => contacted += 1,
            }
        }
        let next = if contacted > 0 && contacted == errored {
            CoreState::Errored
        } else {
            CoreState::Unavailable
        };
        self.set_state(inner, next);
        let waiters = std::mem::take(&mut inner.waiters);
        for waiter in waiters {
            let _ = waiter.send(LoadResult { verified: None });
        }
    }

    /// Installs a header whose hash matches this core's identifier,
    /// transitioning to `available` and resolving observers.
    ///
    /// Idempotent for a repeated identical header. A header that hashes to
    /// a different identifier fails with `HeaderMismatch` and changes
    /// nothing; a different header hashing to the same identifier is a
    /// `RegistryCollision`.
    pub fn provide_header(&self, header: CoValueHeader) -> Result<(), CoValueError> {
        self.provide_header_inner(header, None)
    }

    /// [`CoValueCore::provide_header`], attributed to the peer that
    /// supplied the content so the availability broadcast excludes it.
    pub fn provide_header_from_peer(
        &self,
        header: CoValueHeader,
        supplier: &PeerId,
    ) -> Result<(), CoValueError> {
        self.provide_header_inner(header, Some(supplier))
    }

    fn provide_header_inner(
        &self,
        header: CoValueHeader,
        supplier: Option<&PeerId>,
    ) -> Result<(), CoValueError> {
        let got = id_for_header(&header)?;
        if got != self.id {
            return Err(CoValueError::HeaderMismatch {
                expected: self.id,
                got,
            });
        }

        let (waiters, broadcast_to, verified) = {
            let mut inner = self.inner.lock();
            if let CoreState::Available(existing) = &inner.state {
                return if existing.header() == &header {
                    Ok(())
                } else {
                    Err(CoValueError::RegistryCollision(self.id))
                };
            }
            let was_loading = matches!(inner.state, CoreState::Loading);
            if let Some(supplier) = supplier {
                if let Some(entry) = inner.solicited.get_mut(supplier) {
                    entry.outcome = PeerOutcome::ProvidedContent;
                }
            }
            let verified = VerifiedState::from_header(header)?;
            self.set_state(&mut inner, CoreState::Available(verified.clone()));
            let waiters = std::mem::take(&mut inner.waiters);
            // On leaving `loading`, tell the peers that were solicited but
            // did not supply the content what we now hold, so they can
            // push their deltas. Errored and closed peers are excluded.
            let broadcast_to: Vec<Arc<dyn Peer>> = if was_loading {
                inner
                    .solicited
                    .iter()
                    .filter(|(peer_id, entry)| {
                        Some(*peer_id) != supplier
                            && entry.outcome != PeerOutcome::Errored
                            && entry.outcome != PeerOutcome::ProvidedContent
                            && !entry.handle.closed()
                    })
                    .map(|(_, entry)| Arc::clone(&entry.handle))
                    .collect()
            } else {
                Vec::new()
            };
            (waiters, broadcast_to, verified)
        };

        let result = LoadResult {
            verified: Some(verified.clone()),
        };
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        if !broadcast_to.is_empty() {
            let known = verified.known_state();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    for peer in broadcast_to {
                        let known = known.clone();
                        handle.spawn(async move {
                            if let Err(e) =
                                peer.push_outgoing_message(SyncMessage::Load(known)).await
                            {
                                tracing::debug!(target: "sync", peer = %peer.id(), error = %e, "broadcast_push_failed");
                            }
                        });
                    }
                }
                Err(_) => {
                    tracing::debug!(target: "sync", id = %self.id, "no_runtime_for_broadcast");
                }
            }
        }
        Ok(())
    }

    /// Applies a `content` message from `peer`: installs the header if one
    /// is carried, then appends the new transactions session by session.
    ///
    /// Each session append is atomic; a verification failure surfaces as an
    /// error for the caller to attribute to `peer`, and the core keeps its
    /// current state and everything applied so far.
    pub fn apply_content_from_peer(
        &self,
        content: &NewContentMessage,
        peer: &PeerId,
        verify_signatures: bool,
    ) -> Result<ContentOutcome, SyncError> {
        if let Some(header) = &content.header {
            self.provide_header_from_peer(header.clone(), peer)?;
        }
        let mut inner = self.inner.lock();
        let CoreState::Available(verified) = &mut inner.state else {
            return Ok(ContentOutcome::MissingHeader);
        };
        for (session, new_content) in &content.new {
            verified.try_add_transactions(
                *session,
                new_content.after,
                &new_content.transactions,
                verify_signatures,
            )?;
        }
        Ok(ContentOutcome::Applied)
    }

    /// Appends a locally authored transaction to this core's verified
    /// content. Fails with `NotAvailable` when the content has not been
    /// installed yet.
    pub fn append_transaction(
        &self,
        author: &SessionAuthor,
        payload: Vec<u8>,
    ) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let CoreState::Available(verified) = &mut inner.state else {
            return Err(CoValueError::NotAvailable(self.id).into());
        };
        author
            .append_to(verified, payload)
            .map_err(SyncError::Transaction)
    }
}

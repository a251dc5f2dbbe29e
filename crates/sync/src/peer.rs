//! Per-peer transport adapter: bounded outbound queue, liveness, close
//! semantics.

use crate::message::SyncMessage;
use crate::metrics::metrics;
use async_trait::async_trait;
use lattice_types::error::PeerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{mpsc, watch};

/// A peer identifier, unique within one node's peer set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    /// Builds a peer identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The role a remote peer plays for this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// A well-connected peer expected to hold or relay most CoValues.
    Server,
    /// A consumer peer; solicited last, never storage-prioritized.
    Client,
    /// A persistence peer; consulted first when loading.
    Storage,
}

/// The capability set the sync machinery needs from a peer.
///
/// Production peers ([`PeerState`]) and test doubles both satisfy this;
/// everything above the transport is written against it.
#[async_trait]
pub trait Peer: Send + Sync {
    /// The peer's identifier.
    fn id(&self) -> &PeerId;
    /// The peer's role.
    fn role(&self) -> PeerRole;
    /// True once the peer has been closed.
    fn closed(&self) -> bool;
    /// Enqueues an outbound message, awaiting queue space if the peer is
    /// at its high watermark. Returns `Ok(())` immediately (dropping the
    /// message) if the peer is already closed; fails with
    /// [`PeerError::Closed`] if the peer closes while the push is waiting.
    async fn push_outgoing_message(&self, message: SyncMessage) -> Result<(), PeerError>;
    /// Closes the peer. Idempotent; fails any awaiting pushers.
    fn close(&self);
}

/// The transport-facing half of a peer: where outbound messages surface
/// and inbound messages are fed in. Held by the wire transport in
/// production and by the test harness in tests.
pub struct PeerTransport {
    /// Messages the engine wants delivered to the remote peer, in FIFO
    /// order.
    pub outgoing: mpsc::Receiver<SyncMessage>,
    /// Hand inbound messages from the remote peer to the dispatch loop.
    pub incoming: mpsc::Sender<SyncMessage>,
}

/// The engine-side state of one remote peer.
///
/// The outbound queue is a bounded channel sized at the configured high
/// watermark; a full queue back-pressures pushers instead of buffering
/// without bound.
pub struct PeerState {
    id: PeerId,
    role: PeerRole,
    outgoing: mpsc::Sender<SyncMessage>,
    closed: watch::Sender<bool>,
}

impl PeerState {
    /// Creates a peer with a bounded outbound queue.
    ///
    /// Returns the engine-side handle, the inbound receiver for the
    /// dispatch loop, and the transport-facing half.
    pub fn new(
        id: PeerId,
        role: PeerRole,
        queue_high_water: usize,
    ) -> (std::sync::Arc<Self>, mpsc::Receiver<SyncMessage>, PeerTransport) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(queue_high_water.max(1));
        let (incoming_tx, incoming_rx) = mpsc::channel(queue_high_water.max(1));
        let (closed_tx, _) = watch::channel(false);
        let peer = std::sync::Arc::new(Self {
            id,
            role,
            outgoing: outgoing_tx,
            closed: closed_tx,
        });
        let transport = PeerTransport {
            outgoing: outgoing_rx,
            incoming: incoming_tx,
        };
        (peer, incoming_rx, transport)
    }

    /// A watch receiver that flips to `true` when the peer closes.
    pub fn closed_watch(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

#[async_trait]
impl Peer for PeerState {
    fn id(&self) -> &PeerId {
        &self.id
    }

    fn role(&self) -> PeerRole {
        self.role
    }

    fn closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn push_outgoing_message(&self, message: SyncMessage) -> Result<(), PeerError> {
        if self.closed() {
            // Late pushes to a closed peer are dropped, not failed: the
            // message would never be delivered anyway and the pusher has
            // nothing to handle.
            tracing::trace!(target: "sync", peer = %self.id, action = message.action(), "drop_push_closed");
            return Ok(());
        }
        let action = message.action();
        let mut closed_rx = self.closed.subscribe();
        tokio::select! {
            result = self.outgoing.send(message) => match result {
                Ok(()) => {
                    metrics().inc_messages_sent(action);
                    Ok(())
                }
                // The transport dropped its receiver without a close().
                Err(_) => {
                    self.close();
                    Err(PeerError::Closed)
                }
            },
            _ = closed_rx.wait_for(|closed| *closed) => Err(PeerError::Closed),
        }
    }

    fn close(&self) {
        if !self.closed.send_replace(true) {
            tracing::debug!(target: "sync", peer = %self.id, "peer_closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::covalue::CoValueId;
    use lattice_types::known::CoValueKnownState;

    fn load_message(n: u8) -> SyncMessage {
        SyncMessage::Load(CoValueKnownState::empty(CoValueId([n; 32])))
    }

    #[tokio::test]
    async fn outbound_is_fifo() {
        let (peer, _incoming, mut transport) = PeerState::new("p1".into(), PeerRole::Server, 8);
        peer.push_outgoing_message(load_message(1)).await.unwrap();
        peer.push_outgoing_message(load_message(2)).await.unwrap();
        assert_eq!(transport.outgoing.recv().await.unwrap(), load_message(1));
        assert_eq!(transport.outgoing.recv().await.unwrap(), load_message(2));
    }

    #[tokio::test]
    async fn push_to_closed_peer_is_a_silent_drop() {
        let (peer, _incoming, mut transport) = PeerState::new("p1".into(), PeerRole::Server, 8);
        peer.close();
        peer.close(); // idempotent
        assert!(peer.closed());
        peer.push_outgoing_message(load_message(1)).await.unwrap();
        assert!(transport.outgoing.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_fails_blocked_pushers() {
        let (peer, _incoming, transport) = PeerState::new("p1".into(), PeerRole::Server, 1);
        peer.push_outgoing_message(load_message(1)).await.unwrap();

        // The queue is at its high watermark; this push blocks.
        let blocked = {
            let peer = peer.clone();
            tokio::spawn(async move { peer.push_outgoing_message(load_message(2)).await })
        };
        tokio::task::yield_now().await;
        peer.close();
        assert_eq!(blocked.await.unwrap(), Err(PeerError::Closed));
        drop(transport);
    }

    #[tokio::test]
    async fn dropped_transport_counts_as_closed() {
        let (peer, _incoming, transport) = PeerState::new("p1".into(), PeerRole::Server, 1);
        drop(transport);
        // First push hits the dropped receiver and marks the peer closed.
        assert_eq!(
            peer.push_outgoing_message(load_message(1)).await,
            Err(PeerError::Closed)
        );
        assert!(peer.closed());
        // Subsequent pushes drop silently.
        peer.push_outgoing_message(load_message(2)).await.unwrap();
    }
}

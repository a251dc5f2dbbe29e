//! In-process duplex wiring between two nodes.
//!
//! Useful for tests and for embedding several nodes in one process (for
//! example a storage node next to an application node). Each side sees the
//! other as an ordinary peer; a pair of pump tasks forwards messages
//! between the transport halves.

use crate::node::LocalNode;
use lattice_sync::{PeerId, PeerRole, SyncMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connects `client` to `server` in-process.
///
/// The client sees the server as a `Server`-role peer (and will solicit it
/// on loads); the server sees the client as a `Client`-role peer. Both
/// directions stay connected until either node shuts down, which ends the
/// pump tasks.
pub fn connect_nodes(client: &Arc<LocalNode>, server: &Arc<LocalNode>) {
    let server_peer = PeerId::new(format!("server-{}", server.agent_id()));
    let client_peer = PeerId::new(format!("client-{}", client.agent_id()));

    let client_side = client.attach_peer(server_peer, PeerRole::Server);
    let server_side = server.attach_peer(client_peer, PeerRole::Client);

    tokio::spawn(pump(client_side.outgoing, server_side.incoming));
    tokio::spawn(pump(server_side.outgoing, client_side.incoming));
}

async fn pump(mut from: mpsc::Receiver<SyncMessage>, to: mpsc::Sender<SyncMessage>) {
    while let Some(message) = from.recv().await {
        if to.send(message).await.is_err() {
            break;
        }
    }
}

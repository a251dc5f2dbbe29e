//! Two-node convergence over an in-process duplex.

use lattice_node::{connect_nodes, LocalNode};
use lattice_sync::LoadingState;
use lattice_types::config::SyncConfig;
use lattice_types::covalue::{CoValueHeader, CoValueId, CoValueKind, Ruleset};
use std::sync::Arc;

fn test_config() -> SyncConfig {
    SyncConfig {
        load_deadline_ms: 2_000,
        ..SyncConfig::default()
    }
}

fn test_header(nonce: &str) -> CoValueHeader {
    CoValueHeader::new(CoValueKind::CoMap, Ruleset::UnsafeAllowAll).with_uniqueness(nonce)
}

#[tokio::test]
async fn a_client_loads_a_covalue_its_server_holds() {
    let server = LocalNode::new(test_config());
    let client = LocalNode::new(test_config());

    let core = server.create_covalue(test_header("doc-1")).unwrap();
    let session = server.new_session();
    core.append_transaction(&session, b"title: shopping".to_vec())
        .unwrap();
    core.append_transaction(&session, b"item: eggs".to_vec())
        .unwrap();

    connect_nodes(&client, &server);

    let result = client.load(core.id()).await;
    let verified = result.verified.expect("covalue should be available");
    assert_eq!(verified.id(), core.id());
    assert_eq!(verified.known_state(), core.known_state());
    assert_eq!(
        verified
            .sessions()
            .get(&session.session())
            .map(|log| log.len()),
        Some(2)
    );
}

#[tokio::test]
async fn a_later_client_sees_content_appended_after_the_first_load() {
    let server = LocalNode::new(test_config());
    let first_client = LocalNode::new(test_config());
    let second_client = LocalNode::new(test_config());
    connect_nodes(&first_client, &server);
    connect_nodes(&second_client, &server);

    let core = server.create_covalue(test_header("doc-2")).unwrap();
    let session = server.new_session();
    core.append_transaction(&session, b"v1".to_vec()).unwrap();

    let first = first_client.load(core.id()).await;
    let first_log_len = first
        .verified
        .unwrap()
        .sessions()
        .get(&session.session())
        .map(|log| log.len());
    assert_eq!(first_log_len, Some(1));

    // The server moves on; a load started afterwards sees everything.
    core.append_transaction(&session, b"v2".to_vec()).unwrap();
    core.append_transaction(&session, b"v3".to_vec()).unwrap();

    let second = second_client.load(core.id()).await;
    let second_log_len = second
        .verified
        .unwrap()
        .sessions()
        .get(&session.session())
        .map(|log| log.len());
    assert_eq!(second_log_len, Some(3));
}

#[tokio::test]
async fn loading_an_id_nobody_holds_resolves_unavailable() {
    let server = LocalNode::new(test_config());
    let client = LocalNode::new(test_config());
    connect_nodes(&client, &server);

    let missing = CoValueId([99u8; 32]);
    let result = client.load(missing).await;
    assert!(result.verified.is_none());
    assert_eq!(
        client.get_or_create(missing).loading_state(),
        LoadingState::Unavailable
    );
}

#[tokio::test]
async fn create_covalue_is_idempotent_per_header() {
    let node = LocalNode::new(test_config());
    let a = node.create_covalue(test_header("doc-3")).unwrap();
    let b = node.create_covalue(test_header("doc-3")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.loading_state(), LoadingState::Available);
}

#[tokio::test]
async fn shutdown_settles_in_flight_loads() {
    // Long deadline: the shutdown, not the timer, must settle the load.
    let client = LocalNode::new(SyncConfig {
        load_deadline_ms: 60_000,
        ..SyncConfig::default()
    });
    // A peer whose transport never answers.
    let mut transport = client.attach_peer("silent".into(), lattice_sync::PeerRole::Server);

    let missing = CoValueId([123u8; 32]);
    let load = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.load(missing).await })
    };
    // The load is in flight once the peer has been solicited.
    let solicited = transport.outgoing.recv().await.unwrap();
    assert!(matches!(solicited, lattice_sync::SyncMessage::Load(_)));

    client.shutdown();
    let result = load.await.unwrap();
    assert!(result.verified.is_none());
}

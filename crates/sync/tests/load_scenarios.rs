//! End-to-end scenarios for the CoValue load state machine.

use lattice_state::verified::id_for_header;
use lattice_sync::{
    CoValueCore, LoadingState, Peer, PeerRole, PeerState, PeerTransport, SyncMessage,
};
use lattice_types::config::SyncConfig;
use lattice_types::covalue::{CoValueHeader, CoValueId, CoValueKind, Ruleset};
use lattice_types::error::{SyncError, TransactionError};
use lattice_types::session::{AgentId, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn test_config() -> SyncConfig {
    SyncConfig {
        load_deadline_ms: 1_000,
        ..SyncConfig::default()
    }
}

fn test_header() -> CoValueHeader {
    CoValueHeader::new(CoValueKind::CoMap, Ruleset::UnsafeAllowAll)
}

fn new_peer(
    name: &str,
    role: PeerRole,
) -> (
    Arc<PeerState>,
    mpsc::Receiver<SyncMessage>,
    PeerTransport,
) {
    PeerState::new(name.into(), role, 8)
}

fn spawn_load(core: &Arc<CoValueCore>, peers: &[Arc<PeerState>]) -> JoinHandle<lattice_sync::LoadResult> {
    let core = Arc::clone(core);
    let peers: Vec<Arc<dyn Peer>> = peers.iter().map(|p| Arc::clone(p) as Arc<dyn Peer>).collect();
    tokio::spawn(async move { core.load_from_peers(peers).await })
}

fn verification_error() -> SyncError {
    SyncError::Transaction(TransactionError::BadSignature {
        session: SessionId::new(AgentId([1u8; 32]), 0),
        index: 0,
    })
}

#[tokio::test]
async fn load_with_error_and_not_found_resolves_unavailable() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);
    let (p2, _in2, mut t2) = new_peer("p2", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone(), p2.clone()]);

    let m1 = t1.outgoing.recv().await.unwrap();
    let m2 = t2.outgoing.recv().await.unwrap();
    assert!(matches!(m1, SyncMessage::Load(ref known) if known.id == id && !known.header));
    assert!(matches!(m2, SyncMessage::Load(ref known) if known.id == id && !known.header));

    core.mark_errored(&"p1".into(), verification_error());
    assert_eq!(core.loading_state(), LoadingState::Loading);
    core.mark_not_found_in_peer(&"p2".into());

    let result = load.await.unwrap();
    assert!(result.verified.is_none());
    assert_eq!(core.loading_state(), LoadingState::Unavailable);

    // Exactly one outbound message per peer.
    assert!(t1.outgoing.try_recv().is_err());
    assert!(t2.outgoing.try_recv().is_err());

    // A late observer reads the same outcome synchronously.
    let late = core.wait_for_available_or_unavailable().await;
    assert!(late.verified.is_none());
}

#[tokio::test]
async fn late_provide_header_after_unavailable_recovers() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);
    let (p2, _in2, mut t2) = new_peer("p2", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone(), p2.clone()]);
    t1.outgoing.recv().await.unwrap();
    t2.outgoing.recv().await.unwrap();
    core.mark_errored(&"p1".into(), verification_error());
    core.mark_not_found_in_peer(&"p2".into());
    assert!(load.await.unwrap().verified.is_none());

    core.provide_header(header.clone()).unwrap();
    assert_eq!(core.loading_state(), LoadingState::Available);
    let result = core.wait_for_available_or_unavailable().await;
    assert_eq!(result.verified.unwrap().header(), &header);
}

#[tokio::test]
async fn becoming_available_broadcasts_to_peers_without_content() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);
    let (p2, _in2, mut t2) = new_peer("p2", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone(), p2.clone()]);
    t1.outgoing.recv().await.unwrap();
    t2.outgoing.recv().await.unwrap();

    core.mark_not_found_in_peer(&"p2".into());
    core.provide_header_from_peer(header, &"p1".into()).unwrap();
    assert_eq!(core.loading_state(), LoadingState::Available);
    assert!(load.await.unwrap().verified.is_some());

    // p2 is told what we now hold so it can push deltas; the supplier is
    // not.
    let broadcast = t2.outgoing.recv().await.unwrap();
    match broadcast {
        SyncMessage::Load(known) => {
            assert_eq!(known.id, id);
            assert!(known.header);
            assert!(known.sessions.is_empty());
        }
        other => panic!("expected load broadcast, got {other:?}"),
    }
    tokio::task::yield_now().await;
    assert!(t1.outgoing.try_recv().is_err());
}

#[tokio::test]
async fn closed_peer_is_never_contacted() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);
    let (p2, _in2, mut t2) = new_peer("p2", PeerRole::Server);
    p1.close();

    let load = spawn_load(&core, &[p1.clone(), p2.clone()]);
    let m2 = t2.outgoing.recv().await.unwrap();
    assert!(matches!(m2, SyncMessage::Load(_)));

    core.provide_header_from_peer(header, &"p2".into()).unwrap();
    assert!(load.await.unwrap().verified.is_some());
    assert_eq!(core.loading_state(), LoadingState::Available);
    assert!(t1.outgoing.try_recv().is_err());
    assert!(t2.outgoing.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn silent_peer_times_out_to_unavailable() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone()]);
    let m1 = t1.outgoing.recv().await.unwrap();
    assert!(matches!(m1, SyncMessage::Load(_)));

    // No response arrives; the paused clock advances past the deadline.
    let result = load.await.unwrap();
    assert!(result.verified.is_none());
    assert_eq!(core.loading_state(), LoadingState::Unavailable);
}

#[tokio::test]
async fn duplicate_provide_header_is_idempotent() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);
    let (p2, _in2, mut t2) = new_peer("p2", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone(), p2.clone()]);
    t1.outgoing.recv().await.unwrap();
    t2.outgoing.recv().await.unwrap();

    core.provide_header_from_peer(header.clone(), &"p1".into())
        .unwrap();
    core.provide_header_from_peer(header, &"p1".into()).unwrap();
    assert!(load.await.unwrap().verified.is_some());

    // One broadcast to p2, not two.
    assert!(matches!(
        t2.outgoing.recv().await.unwrap(),
        SyncMessage::Load(_)
    ));
    tokio::task::yield_now().await;
    assert!(t2.outgoing.try_recv().is_err());
}

#[tokio::test]
async fn mismatched_header_is_rejected_without_transition() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());

    let wrong = test_header().with_uniqueness("different");
    assert!(core.provide_header(wrong).is_err());
    assert_eq!(core.loading_state(), LoadingState::Unknown);

    core.provide_header(header).unwrap();
    assert_eq!(core.loading_state(), LoadingState::Available);
}

#[tokio::test]
async fn all_peers_errored_lands_in_errored_and_recovers() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone()]);
    t1.outgoing.recv().await.unwrap();
    core.mark_errored(&"p1".into(), verification_error());

    assert!(load.await.unwrap().verified.is_none());
    assert_eq!(core.loading_state(), LoadingState::Errored);

    // Errored is transient: a later header still lands.
    core.provide_header(header).unwrap();
    assert_eq!(core.loading_state(), LoadingState::Available);
}

#[tokio::test]
async fn observers_before_resolution_see_one_outcome_in_order() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());

    let observers: Vec<_> = (0..3)
        .map(|_| {
            let core = Arc::clone(&core);
            tokio::spawn(async move { core.wait_for_available_or_unavailable().await })
        })
        .collect();
    tokio::task::yield_now().await;

    core.provide_header(header.clone()).unwrap();
    for observer in observers {
        let result = observer.await.unwrap();
        assert_eq!(result.verified.unwrap().header(), &header);
    }
}

#[tokio::test]
async fn closing_a_peer_mid_load_counts_as_not_found() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (p1, _in1, mut t1) = new_peer("p1", PeerRole::Server);

    let load = spawn_load(&core, &[p1.clone()]);
    t1.outgoing.recv().await.unwrap();

    p1.close();
    core.handle_peer_closed(&"p1".into());

    let result = load.await.unwrap();
    assert!(result.verified.is_none());
    assert_eq!(core.loading_state(), LoadingState::Unavailable);
}

#[tokio::test]
async fn load_with_no_contactable_peers_is_immediately_unavailable() {
    let id = CoValueId([9u8; 32]);
    let core = CoValueCore::from_id(id, test_config());
    let result = core.load_from_peers(Vec::new()).await;
    assert!(result.verified.is_none());
    assert_eq!(core.loading_state(), LoadingState::Unavailable);
}

#[tokio::test]
async fn storage_peers_are_contacted_first() {
    let header = test_header();
    let id = id_for_header(&header).unwrap();
    let core = CoValueCore::from_id(id, test_config());
    let (server, _in1, mut t_server) = new_peer("server", PeerRole::Server);
    let (storage, _in2, mut t_storage) = new_peer("storage", PeerRole::Storage);

    // Server listed first; storage must still be solicited first.
    let load = spawn_load(&core, &[server.clone(), storage.clone()]);
    t_storage.outgoing.recv().await.unwrap();
    t_server.outgoing.recv().await.unwrap();
    core.mark_not_found_in_peer(&"storage".into());
    core.mark_not_found_in_peer(&"server".into());
    assert!(load.await.unwrap().verified.is_none());
}

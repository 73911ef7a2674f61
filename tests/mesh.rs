use std::{net::SocketAddr, sync::Arc, time::Duration};

use peerlink::{
    config::PeerConfig,
    memnet::{MemoryNetwork, MemoryNode},
    node::PeerStatus,
    types::{Endpoint, NodePublic, PathKind, RelayId},
};

const CONVERGE_WITHIN: Duration = Duration::from_secs(120);

fn spawn(net: &MemoryNetwork, index: u8) -> MemoryNode {
    net.spawn_node(
        NodePublic::random(),
        vec![SocketAddr::from(([192, 0, 2, index], 41641))],
        RelayId(1),
        Arc::new(PeerConfig::default()),
    )
}

async fn wait_established(node: &MemoryNode, peer: &NodePublic) -> PeerStatus {
    let mut status = node.registry().watch(peer).expect("peer registered");
    let settled = tokio::time::timeout(CONVERGE_WITHIN, status.wait_for(PeerStatus::is_established))
        .await
        .expect("path negotiated in time")
        .expect("actor alive")
        .clone();
    settled
}

#[tokio::test(start_paused = true)]
async fn two_nodes_settle_on_a_direct_path() {
    let net = MemoryNetwork::new();
    let a = spawn(&net, 1);
    let b = spawn(&net, 2);
    a.connect(&b);
    b.connect(&a);

    let a_view = wait_established(&a, b.key()).await;
    let b_view = wait_established(&b, a.key()).await;

    assert_eq!(a_view.endpoint, Some(Endpoint::Direct(b.addrs()[0])));
    assert_eq!(b_view.endpoint, Some(Endpoint::Direct(a.addrs()[0])));
    assert_eq!(a.sessions().get(b.key()), a_view.endpoint);
    assert_eq!(b.sessions().get(a.key()), b_view.endpoint);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn blocked_direct_paths_fall_back_to_relay() {
    let net = MemoryNetwork::new();
    net.block_direct(true);
    let a = spawn(&net, 1);
    let b = spawn(&net, 2);
    a.connect(&b);
    b.connect(&a);

    let a_view = wait_established(&a, b.key()).await;
    let b_view = wait_established(&b, a.key()).await;
    assert_eq!(a_view.endpoint.map(|e| e.kind()), Some(PathKind::Relay));
    assert_eq!(b_view.endpoint.map(|e| e.kind()), Some(PathKind::Relay));

    // Keepalives over the relay hold the path open well past the idle timeout.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(a.registry().status(b.key()).is_some_and(|s| s.is_established()));
    assert!(b.registry().status(a.key()).is_some_and(|s| s.is_established()));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn late_peer_is_picked_up_after_backoff() {
    let net = MemoryNetwork::new();
    let a = spawn(&net, 1);
    let b = spawn(&net, 2);
    a.connect(&b);

    // b does not know a yet; a's probes go unanswered and it backs off.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!a.registry().status(b.key()).is_some_and(|s| s.is_established()));

    b.connect(&a);
    let a_view = wait_established(&a, b.key()).await;
    assert_eq!(a_view.endpoint.map(|e| e.kind()), Some(PathKind::Direct));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn removing_a_peer_releases_its_path() {
    let net = MemoryNetwork::new();
    let a = spawn(&net, 1);
    let b = spawn(&net, 2);
    a.connect(&b);
    b.connect(&a);
    wait_established(&a, b.key()).await;

    a.registry()
        .remove_peer(b.key())
        .await
        .expect("peer registered");
    assert_eq!(a.sessions().get(b.key()), None);
    assert!(a.registry().peers().is_empty());

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn three_node_mesh_converges() {
    let net = MemoryNetwork::new();
    let nodes: Vec<_> = (1..=3).map(|i| spawn(&net, i)).collect();
    for node in &nodes {
        for other in &nodes {
            if node.key() != other.key() {
                node.connect(other);
            }
        }
    }
    for node in &nodes {
        for other in &nodes {
            if node.key() != other.key() {
                let status = wait_established(node, other.key()).await;
                assert_eq!(status.endpoint.map(|e| e.kind()), Some(PathKind::Direct));
            }
        }
    }
    for node in nodes {
        node.shutdown().await;
    }
}

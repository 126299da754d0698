//! In-process GossipSub propagation test: two `P2pNetwork` instances talk
//! over real loopback TCP sockets, no spawned node process and no RPC
//! surface to drive — node B bootstraps off node A's listen address and
//! must observe an event node A published.

use std::time::Duration;

use clawnet_p2p::{P2pConfig, P2pMessage, P2pNetwork};

async fn wait_for_local_addr(handle: &mut clawnet_p2p::P2pHandle) {
    // `P2pNetwork::new` already calls `listen_on`; give the swarm a tick to
    // bind before the peer on the other end tries to dial it.
    let _ = handle;
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn gossip_propagates_new_event_between_peers() {
    let config_a = P2pConfig {
        listen_addrs: vec!["/ip4/127.0.0.1/tcp/17801".to_string()],
        bootstrap_peers: Vec::new(),
        ..P2pConfig::default()
    };
    let (network_a, mut handle_a) = P2pNetwork::new(&config_a).expect("build node A");
    tokio::spawn(network_a.run());
    wait_for_local_addr(&mut handle_a).await;

    let bootstrap_addr = format!("/ip4/127.0.0.1/tcp/17801/p2p/{}", handle_a.local_peer_id);
    let config_b = P2pConfig {
        listen_addrs: vec!["/ip4/127.0.0.1/tcp/17802".to_string()],
        bootstrap_peers: vec![bootstrap_addr],
        ..P2pConfig::default()
    };
    let (network_b, mut handle_b) = P2pNetwork::new(&config_b).expect("build node B");
    tokio::spawn(network_b.run());

    // Allow the TCP dial and GossipSub mesh heartbeat (1s interval) to settle.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let sent = P2pMessage::NewEvent { bytes: b"a signed event envelope".to_vec() };
    handle_a.outbound_tx.send(sent.clone()).await.expect("send from node A");

    let received = tokio::time::timeout(Duration::from_secs(10), handle_b.inbound_rx.recv())
        .await
        .expect("node B did not receive the gossiped event in time")
        .expect("inbound channel closed");

    match received.1 {
        P2pMessage::NewEvent { bytes } => assert_eq!(bytes, b"a signed event envelope"),
        other => panic!("expected NewEvent, got {other:?}"),
    }
}

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use futures::StreamExt;
use libp2p::{
    gossipsub, identify, kad, noise, ping, tcp, yamux,
    swarm::SwarmEvent,
    Multiaddr, PeerId, Swarm,
};
use libp2p_swarm::NetworkBehaviour;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use clawnet_core::constants::{TOPIC_EVENTS, TOPIC_REQUESTS, TOPIC_RESPONSES};
use clawnet_core::types::WirePeerId;

use crate::config::P2pConfig;
use crate::message::P2pMessage;

/// Combined libp2p network behaviour for a ClawNet node.
///
/// The `#[derive(NetworkBehaviour)]` macro auto-generates a
/// `ClawNetBehaviourEvent` enum with one variant per field.
#[derive(NetworkBehaviour)]
pub struct ClawNetBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}

/// Application-facing handle returned from `P2pNetwork::new()`.
pub struct P2pHandle {
    /// Send here to broadcast a message; it is routed to the topic its
    /// variant belongs on (spec.md §6 "events"/"requests"/"responses").
    pub outbound_tx: mpsc::Sender<P2pMessage>,
    /// Receive here to consume messages arriving from peers, tagged with
    /// the sending peer's id.
    pub inbound_rx: mpsc::Receiver<(WirePeerId, P2pMessage)>,
    /// Local libp2p peer identity.
    pub local_peer_id: PeerId,
}

/// Owns the libp2p Swarm. Pass to `tokio::spawn(network.run())`.
pub struct P2pNetwork {
    swarm: Swarm<ClawNetBehaviour>,
    topic_events: gossipsub::IdentTopic,
    topic_requests: gossipsub::IdentTopic,
    topic_responses: gossipsub::IdentTopic,
    outbound_rx: mpsc::Receiver<P2pMessage>,
    inbound_tx: mpsc::Sender<(WirePeerId, P2pMessage)>,
}

impl P2pNetwork {
    /// Build the network and return `(P2pNetwork, P2pHandle)`.
    pub fn new(
        config: &P2pConfig,
    ) -> Result<(Self, P2pHandle), Box<dyn std::error::Error + Send + Sync>> {
        let topic_events = gossipsub::IdentTopic::new(format!("{}/{TOPIC_EVENTS}", config.protocol_version));
        let topic_requests = gossipsub::IdentTopic::new(format!("{}/{TOPIC_REQUESTS}", config.protocol_version));
        let topic_responses = gossipsub::IdentTopic::new(format!("{}/{TOPIC_RESPONSES}", config.protocol_version));

        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )?
            .with_behaviour(|key: &libp2p::identity::Keypair| {
                let message_id_fn = |msg: &gossipsub::Message| {
                    let mut s = DefaultHasher::new();
                    msg.data.hash(&mut s);
                    gossipsub::MessageId::from(s.finish().to_string())
                };

                let gossipsub_config = gossipsub::ConfigBuilder::default()
                    .heartbeat_interval(Duration::from_secs(1))
                    .validation_mode(gossipsub::ValidationMode::Strict)
                    .message_id_fn(message_id_fn)
                    .max_transmit_size(crate::MAX_ENVELOPE_BYTES)
                    .build()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let gossipsub = gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let store = kad::store::MemoryStore::new(key.public().to_peer_id());
                let kademlia = kad::Behaviour::new(key.public().to_peer_id(), store);

                let identify = identify::Behaviour::new(identify::Config::new(
                    config.protocol_version.clone(),
                    key.public(),
                ));

                let ping = ping::Behaviour::default();

                Ok(ClawNetBehaviour { gossipsub, kademlia, identify, ping })
            })?
            .build();

        for topic in [&topic_events, &topic_requests, &topic_responses] {
            swarm.behaviour_mut().gossipsub.subscribe(topic)?;
        }

        for addr_str in &config.listen_addrs {
            let listen_addr: Multiaddr = addr_str.parse()?;
            swarm.listen_on(listen_addr)?;
        }

        for addr_str in &config.bootstrap_peers {
            if let Ok(addr) = addr_str.parse::<Multiaddr>() {
                if let Some(libp2p::multiaddr::Protocol::P2p(peer_id)) = addr.iter().last() {
                    swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
                    debug!(peer = %peer_id, "added bootstrap peer");
                }
                if let Err(e) = swarm.dial(addr.clone()) {
                    warn!(addr = %addr, error = %e, "failed to dial bootstrap peer");
                }
            }
        }

        let local_peer_id = *swarm.local_peer_id();
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let (inbound_tx, inbound_rx) = mpsc::channel(256);

        let network = P2pNetwork { swarm, topic_events, topic_requests, topic_responses, outbound_rx, inbound_tx };
        let handle = P2pHandle { outbound_tx, inbound_rx, local_peer_id };

        Ok((network, handle))
    }

    fn topic_for(&self, msg: &P2pMessage) -> gossipsub::IdentTopic {
        match msg.topic() {
            t if t == TOPIC_EVENTS => self.topic_events.clone(),
            t if t == TOPIC_REQUESTS => self.topic_requests.clone(),
            _ => self.topic_responses.clone(),
        }
    }

    /// Drive the P2P event loop. Run in a dedicated tokio task.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(msg) = self.outbound_rx.recv() => {
                    let topic = self.topic_for(&msg);
                    let data = msg.to_bytes();
                    if let Err(e) = self.swarm
                        .behaviour_mut()
                        .gossipsub
                        .publish(topic, data)
                    {
                        warn!(error = %e, "gossipsub publish failed");
                    }
                }

                event = self.swarm.select_next_some() => {
                    match event {
                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "P2P listening on");
                        }
                        SwarmEvent::Behaviour(ClawNetBehaviourEvent::Gossipsub(
                            gossipsub::Event::Message { message, propagation_source, .. },
                        )) => {
                            match P2pMessage::from_bytes(&message.data) {
                                Ok(msg) => {
                                    let peer = WirePeerId(propagation_source.to_string());
                                    let _ = self.inbound_tx.send((peer, msg)).await;
                                }
                                Err(e) => debug!(error = %e, "failed to decode gossip message"),
                            }
                        }
                        SwarmEvent::Behaviour(ClawNetBehaviourEvent::Identify(
                            identify::Event::Received { peer_id, info, .. },
                        )) => {
                            for addr in info.listen_addrs {
                                self.swarm
                                    .behaviour_mut()
                                    .kademlia
                                    .add_address(&peer_id, addr);
                            }
                        }
                        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                            debug!(peer = %peer_id, "connection established");
                        }
                        SwarmEvent::ConnectionClosed { peer_id, .. } => {
                            debug!(peer = %peer_id, "connection closed");
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

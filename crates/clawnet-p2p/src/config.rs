use clawnet_core::constants::TOPIC_PREFIX;

/// Configuration for the ClawNet P2P network (spec.md §6 "p2p.listen",
/// "p2p.bootstrap").
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Local listen multiaddresses.
    pub listen_addrs: Vec<String>,
    /// Bootstrap peer multiaddresses.
    pub bootstrap_peers: Vec<String>,
    /// Protocol version string advertised to peers, e.g. `/clawtoken/1.0.0`.
    pub protocol_version: String,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec!["/ip4/0.0.0.0/tcp/7780".into()],
            bootstrap_peers: Vec::new(),
            protocol_version: TOPIC_PREFIX.to_string(),
        }
    }
}

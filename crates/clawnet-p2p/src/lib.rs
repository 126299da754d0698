//! clawnet-p2p
//!
//! libp2p networking layer for ClawNet nodes.
//!
//! GossipSub broadcasts events and sync traffic over three topics (spec.md
//! §6): `events`, `requests`, `responses`. Kademlia handles peer discovery
//! and bootstrap. Identify and Ping maintain connection metadata and
//! liveness. `eligibility` tracks which peers the local sybil policy
//! currently trusts.

pub mod config;
pub mod eligibility;
pub mod message;
pub mod network;

pub use config::P2pConfig;
pub use eligibility::PeerEligibility;
pub use message::{P2pMessage, PeerRotate, PowTicket, StakeProof};
pub use network::{P2pHandle, P2pNetwork};

/// Max gossip envelope size (spec.md §6 "Topics").
pub const MAX_ENVELOPE_BYTES: usize = 1_048_576;

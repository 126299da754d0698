use serde::{Deserialize, Serialize};

use clawnet_core::constants::{TOPIC_EVENTS, TOPIC_REQUESTS, TOPIC_RESPONSES};
use clawnet_core::types::{Balance, Did, EventHash, SignatureBytes, Timestamp, WirePeerId};
use clawnet_snapshot::ManifestSignature;

/// Everything exchanged over the gossip network (spec.md §6): event
/// propagation, range-request backfill, chunked snapshot sync, and the
/// sybil-policy announcements peers use to prove eligibility. Exactly one
/// variant is ever in flight per message, matching the wire's tagged-union
/// framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum P2pMessage {
    /// A locally-accepted event, re-broadcast for peers that haven't seen it.
    /// `bytes` is the canonical JSON of the signed event envelope.
    NewEvent { bytes: Vec<u8> },

    /// "Send me everything after `from`" (`None` means from genesis).
    RangeRequest { from: Option<EventHash>, limit: usize },

    /// `events` in log order; `cursor` is the hash of the last one sent, or
    /// `None` if the responder had nothing past `from`.
    RangeResponse { events: Vec<Vec<u8>>, cursor: Option<EventHash> },

    /// "Send me your latest snapshot, if you have one newer than `from_hash`."
    SnapshotRequest { from_hash: Option<EventHash> },

    /// One chunk of a snapshot transfer, identified by the snapshot's
    /// manifest hash so chunks from different responders can be
    /// interleaved and still reassembled correctly. `manifest` is the
    /// bincode-serialized manifest, carried alongside every chunk so a
    /// requester can start reassembling from whichever chunk arrives first.
    /// `signatures` carries the sender's own attestation (and any others it
    /// has collected) so a requester can accumulate distinct-signer trust
    /// before acting on the reassembled snapshot.
    SnapshotResponse {
        hash: EventHash,
        chunk_index: usize,
        chunk_count: usize,
        total_bytes: u64,
        manifest: Vec<u8>,
        snapshot: Vec<u8>,
        signatures: Vec<ManifestSignature>,
    },

    /// Proof of work announced by a peer under `sybilPolicy = pow`.
    PowTicket(PowTicket),

    /// Proof of stake announced by a peer under `sybilPolicy = stake`.
    StakeProof(StakeProof),

    /// A peer announcing it has rotated its P2P identity key.
    PeerRotate(PeerRotate),
}

impl P2pMessage {
    /// Which of the three gossip topics this message belongs on.
    pub fn topic(&self) -> &'static str {
        match self {
            P2pMessage::NewEvent { .. } => TOPIC_EVENTS,
            P2pMessage::RangeRequest { .. } | P2pMessage::SnapshotRequest { .. } | P2pMessage::PowTicket(_) | P2pMessage::StakeProof(_) | P2pMessage::PeerRotate(_) => TOPIC_REQUESTS,
            P2pMessage::RangeResponse { .. } | P2pMessage::SnapshotResponse { .. } => TOPIC_RESPONSES,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("P2pMessage serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowTicket {
    pub peer: WirePeerId,
    pub ts: Timestamp,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: EventHash,
    pub sig: SignatureBytes,
}

impl PowTicket {
    /// The fields that must hash to `self.hash` and be signed by `peer`.
    pub fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(&self.peer, self.ts, self.nonce, self.difficulty)).expect("PowTicket fields always serialize")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeProof {
    pub peer: WirePeerId,
    pub controller: Did,
    pub stake_event: EventHash,
    pub min_stake: Balance,
    /// Signed by the peer key over `signing_bytes()`.
    pub sig: SignatureBytes,
    /// Signed by the controller's issuer key over `signing_bytes()`, proving
    /// the controller endorses this peer.
    pub sig_controller: SignatureBytes,
}

impl StakeProof {
    pub fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(&self.peer, &self.controller, self.stake_event, self.min_stake)).expect("StakeProof fields always serialize")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRotate {
    pub old: WirePeerId,
    pub new: WirePeerId,
    pub ts: Timestamp,
    /// Signed by the old peer key, authorizing the rotation.
    pub sig: SignatureBytes,
    /// Signed by the new peer key, accepting it.
    pub sig_new: SignatureBytes,
}

impl PeerRotate {
    pub fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(&self.old, &self.new, self.ts)).expect("PeerRotate fields always serialize")
    }
}

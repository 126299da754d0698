use serde::{Deserialize, Serialize};

use clawnet_codec::hash::sha256;
use clawnet_core::types::{EventHash, Timestamp};

/// Describes a built snapshot without carrying its payload: the chunk plan
/// a requester needs before fetching any bytes (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub last_event_hash: EventHash,
    pub event_count: u64,
    pub created_at: Timestamp,
    pub chunk_size: usize,
    pub total_bytes: u64,
    pub chunk_hashes: Vec<EventHash>,
}

impl SnapshotManifest {
    /// Canonical bytes a signer signs over — bincode is fine here since the
    /// manifest never crosses into JCS territory (it isn't an event).
    pub fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("manifest always serializes")
    }

    pub fn manifest_hash(&self) -> EventHash {
        EventHash::from_bytes(sha256(&self.signing_bytes()))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_hashes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_hash_is_stable_for_identical_content() {
        let m1 = SnapshotManifest {
            last_event_hash: EventHash::from_bytes([1; 32]),
            event_count: 10,
            created_at: 1000,
            chunk_size: 512,
            total_bytes: 1024,
            chunk_hashes: vec![EventHash::from_bytes([2; 32]), EventHash::from_bytes([3; 32])],
        };
        let m2 = SnapshotManifest { ..clone_m(&m1) };
        assert_eq!(m1.manifest_hash(), m2.manifest_hash());
    }

    fn clone_m(m: &SnapshotManifest) -> SnapshotManifest {
        SnapshotManifest {
            last_event_hash: m.last_event_hash,
            event_count: m.event_count,
            created_at: m.created_at,
            chunk_size: m.chunk_size,
            total_bytes: m.total_bytes,
            chunk_hashes: m.chunk_hashes.clone(),
        }
    }
}

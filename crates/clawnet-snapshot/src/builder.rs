use serde::{Deserialize, Serialize};

use clawnet_codec::hash::sha256;
use clawnet_core::error::ClawError;
use clawnet_core::types::{EventHash, Timestamp};
use clawnet_state::DerivedDb;
use clawnet_store::EventStore;

use crate::manifest::SnapshotManifest;

type TreeDump = (String, Vec<(Vec<u8>, Vec<u8>)>);

/// Everything a snapshot carries: the full derived-state dump plus the
/// per-issuer/per-resource indexes a cold-started node needs to resume
/// ordinary validation without replaying the whole log (spec.md §4.7).
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub state: Vec<TreeDump>,
    pub indexes: Vec<TreeDump>,
}

/// Builds a snapshot from the current local state: serializes the payload,
/// splits it into `chunk_size`-byte chunks, and produces the manifest a
/// peer can use to decide whether to fetch it before downloading anything.
pub fn build_snapshot(db: &DerivedDb, events: &EventStore, chunk_size: usize, created_at: Timestamp) -> Result<(SnapshotManifest, Vec<Vec<u8>>), ClawError> {
    let last_event_hash = events
        .latest_hash()?
        .ok_or_else(|| ClawError::Other("cannot snapshot an empty log".to_string()))?;

    let payload = SnapshotPayload {
        state: db.dump()?,
        indexes: events.dump_indexes()?,
    };
    let bytes = bincode::serialize(&payload).map_err(|e| ClawError::MalformedValue(e.to_string()))?;

    let chunks: Vec<Vec<u8>> = bytes.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect();
    let chunk_hashes = chunks.iter().map(|c| EventHash::from_bytes(sha256(c))).collect();

    let manifest = SnapshotManifest {
        last_event_hash,
        event_count: events.len() as u64,
        created_at,
        chunk_size,
        total_bytes: bytes.len() as u64,
        chunk_hashes,
    };
    Ok((manifest, chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawnet_core::types::{Address, Did};
    use clawnet_state::Account;

    #[test]
    fn build_snapshot_chunks_and_hashes_match() {
        let db = DerivedDb::temporary().unwrap();
        db.put_account(&Account { address: Address("addrA".to_string()), balance: 100 }).unwrap();
        let events = EventStore::temporary().unwrap();
        let hash = EventHash::from_bytes([7; 32]);
        events.append(&hash, b"event-bytes").unwrap();
        events.set_committed_nonce(&Did("did:claw:zalice".to_string()), 1).unwrap();

        let (manifest, chunks) = build_snapshot(&db, &events, 8, 1_000).unwrap();
        assert_eq!(manifest.last_event_hash, hash);
        assert_eq!(manifest.event_count, 1);
        assert_eq!(manifest.chunk_count(), chunks.len());
        for (chunk, expected_hash) in chunks.iter().zip(manifest.chunk_hashes.iter()) {
            assert_eq!(EventHash::from_bytes(sha256(chunk)), *expected_hash);
        }
    }

    #[test]
    fn build_snapshot_rejects_empty_log() {
        let db = DerivedDb::temporary().unwrap();
        let events = EventStore::temporary().unwrap();
        assert!(build_snapshot(&db, &events, 512, 0).is_err());
    }
}

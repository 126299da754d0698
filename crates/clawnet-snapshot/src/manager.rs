use tracing::info;

use clawnet_codec::sign::KeyPair;
use clawnet_core::config::SnapshotConfig;
use clawnet_core::error::ClawError;
use clawnet_core::types::Timestamp;
use clawnet_state::DerivedDb;
use clawnet_store::EventStore;

use crate::builder::build_snapshot;
use crate::manifest::SnapshotManifest;
use crate::signatures::{sign_manifest, ManifestSignature};

/// Decides when a node should build and re-publish a snapshot, and holds
/// the bookkeeping needed to make that decision (spec.md §4.7: interval-
/// or count-triggered, whichever comes first).
pub struct SnapshotManager {
    config: SnapshotConfig,
    events_at_last_snapshot: u64,
    last_snapshot_at: Timestamp,
}

impl SnapshotManager {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            events_at_last_snapshot: 0,
            last_snapshot_at: 0,
        }
    }

    /// True once either the event-count or time threshold has been crossed
    /// since the last snapshot.
    pub fn should_snapshot(&self, current_event_count: u64, now: Timestamp) -> bool {
        let events_since = current_event_count.saturating_sub(self.events_at_last_snapshot);
        let elapsed = now.saturating_sub(self.last_snapshot_at);
        events_since >= self.config.min_events || elapsed >= self.config.min_interval_ms
    }

    /// Builds a snapshot, signs it with the local key, and records the
    /// bookkeeping used by the next `should_snapshot` check.
    pub fn build_and_sign(&mut self, db: &DerivedDb, events: &EventStore, key_pair: &KeyPair, now: Timestamp) -> Result<(SnapshotManifest, Vec<Vec<u8>>, ManifestSignature), ClawError> {
        let chunk_size = self.config.max_chunk_bytes.max(1);
        let (manifest, chunks) = build_snapshot(db, events, chunk_size, now)?;
        if manifest.total_bytes > self.config.max_bytes {
            return Err(ClawError::Other(format!(
                "snapshot size {} exceeds configured max_bytes {}",
                manifest.total_bytes, self.config.max_bytes
            )));
        }
        let signature = sign_manifest(&manifest, key_pair);

        self.events_at_last_snapshot = manifest.event_count;
        self.last_snapshot_at = now;
        info!(event_count = manifest.event_count, total_bytes = manifest.total_bytes, "built snapshot");

        Ok((manifest, chunks, signature))
    }
}

use std::path::Path;

use clawnet_core::error::ClawError;
use clawnet_core::types::{Did, EventHash, Nonce, ResourceId};

/// Append-only, content-addressed event log plus the indexes the validation
/// pipeline and sync engine read (spec.md §4.2).
///
/// Named trees:
///   log              — event hash    → raw envelope bytes
///   log_order         — u64 be seq     → event hash   (log order, for `logRange`)
///   log_order_rev     — event hash    → u64 be seq    (hash → its position)
///   issuer_last       — issuer DID    → event hash     (`lastByIssuer`)
///   issuer_nonce      — issuer DID    → u64 be committed nonce
///   resource_last     — resource id   → event hash     (`lastByResource`)
///   nonce_window      — issuer‖nonce  → raw envelope bytes (buffered, out-of-order)
///   skew_buffer       — event hash    → raw envelope bytes (held for one clock-skew retry)
///   meta              — utf8 key      → raw bytes (e.g. `latest_hash`)
pub struct EventStore {
    _db: sled::Db,
    log: sled::Tree,
    log_order: sled::Tree,
    log_order_rev: sled::Tree,
    issuer_last: sled::Tree,
    issuer_nonce: sled::Tree,
    resource_last: sled::Tree,
    nonce_window: sled::Tree,
    skew_buffer: sled::Tree,
    meta: sled::Tree,
}

const KEY_LATEST_HASH: &str = "latest_hash";
const KEY_LOG_SEQ: &str = "log_seq";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    AlreadyExists,
}

fn storage_err(e: impl std::fmt::Display) -> ClawError {
    ClawError::Storage(e.to_string())
}

impl EventStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ClawError> {
        let db = sled::open(path).map_err(storage_err)?;
        let log = db.open_tree("log").map_err(storage_err)?;
        let log_order = db.open_tree("log_order").map_err(storage_err)?;
        let log_order_rev = db.open_tree("log_order_rev").map_err(storage_err)?;
        let issuer_last = db.open_tree("issuer_last").map_err(storage_err)?;
        let issuer_nonce = db.open_tree("issuer_nonce").map_err(storage_err)?;
        let resource_last = db.open_tree("resource_last").map_err(storage_err)?;
        let nonce_window = db.open_tree("nonce_window").map_err(storage_err)?;
        let skew_buffer = db.open_tree("skew_buffer").map_err(storage_err)?;
        let meta = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            log,
            log_order,
            log_order_rev,
            issuer_last,
            issuer_nonce,
            resource_last,
            nonce_window,
            skew_buffer,
            meta,
        })
    }

    pub fn temporary() -> Result<Self, ClawError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage_err)?;
        let log = db.open_tree("log").map_err(storage_err)?;
        let log_order = db.open_tree("log_order").map_err(storage_err)?;
        let log_order_rev = db.open_tree("log_order_rev").map_err(storage_err)?;
        let issuer_last = db.open_tree("issuer_last").map_err(storage_err)?;
        let issuer_nonce = db.open_tree("issuer_nonce").map_err(storage_err)?;
        let resource_last = db.open_tree("resource_last").map_err(storage_err)?;
        let nonce_window = db.open_tree("nonce_window").map_err(storage_err)?;
        let skew_buffer = db.open_tree("skew_buffer").map_err(storage_err)?;
        let meta = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            log,
            log_order,
            log_order_rev,
            issuer_last,
            issuer_nonce,
            resource_last,
            nonce_window,
            skew_buffer,
            meta,
        })
    }

    /// Removes a committed event's log entry and order-index pointers.
    /// Used only when fork resolution (spec.md §4.3 tie-break) supersedes an
    /// already-committed event with a lower-hash sibling; the caller is
    /// responsible for rolling the issuer/resource pointers back to what
    /// they were before this event committed. Returns the retracted event's
    /// raw bytes so the caller can read its `prev`/`resourcePrev` pointers.
    pub fn retract(&self, hash: &EventHash) -> Result<Option<Vec<u8>>, ClawError> {
        let bytes = self.log.remove(hash.as_bytes()).map_err(storage_err)?.map(|v| v.to_vec());
        if bytes.is_none() {
            return Ok(None);
        }
        if let Some(seq_bytes) = self.log_order_rev.remove(hash.as_bytes()).map_err(storage_err)? {
            self.log_order.remove(seq_bytes.as_ref()).map_err(storage_err)?;
        }
        Ok(bytes)
    }

    // ── Log ──────────────────────────────────────────────────────────────────

    /// Idempotent on duplicate hash; durable (via sled's own fsync policy)
    /// before returning (spec.md §4.2 contract).
    pub fn append(&self, hash: &EventHash, bytes: &[u8]) -> Result<AppendOutcome, ClawError> {
        if self.log.contains_key(hash.as_bytes()).map_err(storage_err)? {
            return Ok(AppendOutcome::AlreadyExists);
        }
        let seq = self.next_seq()?;
        self.log.insert(hash.as_bytes(), bytes).map_err(storage_err)?;
        self.log_order.insert(seq.to_be_bytes(), hash.as_bytes()).map_err(storage_err)?;
        self.log_order_rev.insert(hash.as_bytes(), seq.to_be_bytes()).map_err(storage_err)?;
        self.meta.insert(KEY_LATEST_HASH, hash.as_bytes()).map_err(storage_err)?;
        self.log.flush().map_err(storage_err)?;
        Ok(AppendOutcome::Appended)
    }

    pub fn get_by_hash(&self, hash: &EventHash) -> Result<Option<Vec<u8>>, ClawError> {
        Ok(self.log.get(hash.as_bytes()).map_err(storage_err)?.map(|v| v.to_vec()))
    }

    pub fn contains(&self, hash: &EventHash) -> bool {
        self.log.contains_key(hash.as_bytes()).unwrap_or(false)
    }

    /// Events strictly after `after_hash` (or from origin if absent), in log
    /// order, up to `limit`. Cursor is the hash of the last returned event,
    /// or `None` at end-of-log (spec.md §4.2 contract).
    pub fn log_range(
        &self,
        after_hash: Option<&EventHash>,
        limit: usize,
    ) -> Result<(Vec<(EventHash, Vec<u8>)>, Option<EventHash>), ClawError> {
        let start_seq = match after_hash {
            None => 0u64,
            Some(h) => match self.log_order_rev.get(h.as_bytes()).map_err(storage_err)? {
                Some(seq_bytes) => u64::from_be_bytes(seq_bytes.as_ref().try_into().unwrap()) + 1,
                None => return Ok((Vec::new(), None)),
            },
        };

        let mut out = Vec::new();
        let mut cursor = None;
        for item in self.log_order.range(start_seq.to_be_bytes()..).take(limit) {
            let (_, hash_bytes) = item.map_err(storage_err)?;
            let mut h = [0u8; 32];
            h.copy_from_slice(&hash_bytes);
            let hash = EventHash::from_bytes(h);
            let bytes = self
                .log
                .get(hash.as_bytes())
                .map_err(storage_err)?
                .ok_or_else(|| ClawError::StorageCorruption(format!("log_order points at missing hash {hash}")))?
                .to_vec();
            cursor = Some(hash.clone());
            out.push((hash, bytes));
        }
        Ok((out, cursor))
    }

    /// Number of events in the log.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn latest_hash(&self) -> Result<Option<EventHash>, ClawError> {
        match self.meta.get(KEY_LATEST_HASH).map_err(storage_err)? {
            Some(bytes) => {
                let mut h = [0u8; 32];
                h.copy_from_slice(&bytes);
                Ok(Some(EventHash::from_bytes(h)))
            }
            None => Ok(None),
        }
    }

    fn next_seq(&self) -> Result<u64, ClawError> {
        let current = match self.meta.get(KEY_LOG_SEQ).map_err(storage_err)? {
            Some(bytes) => u64::from_be_bytes(bytes.as_ref().try_into().unwrap()),
            None => 0,
        };
        self.meta.insert(KEY_LOG_SEQ, (current + 1).to_be_bytes().to_vec()).map_err(storage_err)?;
        Ok(current)
    }

    // ── Per-issuer index ─────────────────────────────────────────────────────

    pub fn last_by_issuer(&self, issuer: &Did) -> Result<Option<EventHash>, ClawError> {
        match self.issuer_last.get(issuer.as_str()).map_err(storage_err)? {
            Some(bytes) => {
                let mut h = [0u8; 32];
                h.copy_from_slice(&bytes);
                Ok(Some(EventHash::from_bytes(h)))
            }
            None => Ok(None),
        }
    }

    pub fn set_last_by_issuer(&self, issuer: &Did, hash: &EventHash) -> Result<(), ClawError> {
        self.issuer_last
            .insert(issuer.as_str(), hash.as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Rolls `lastByIssuer` back to "no events from this issuer yet". Only
    /// used when retracting a superseded issuer-chain head whose own `prev`
    /// was `None`.
    pub fn clear_last_by_issuer(&self, issuer: &Did) -> Result<(), ClawError> {
        self.issuer_last.remove(issuer.as_str()).map_err(storage_err)?;
        Ok(())
    }

    pub fn committed_nonce(&self, issuer: &Did) -> Result<Nonce, ClawError> {
        match self.issuer_nonce.get(issuer.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(u64::from_be_bytes(bytes.as_ref().try_into().unwrap())),
            None => Ok(0),
        }
    }

    pub fn set_committed_nonce(&self, issuer: &Did, nonce: Nonce) -> Result<(), ClawError> {
        self.issuer_nonce
            .insert(issuer.as_str(), nonce.to_be_bytes().to_vec())
            .map_err(storage_err)?;
        Ok(())
    }

    // ── Per-resource index ───────────────────────────────────────────────────

    pub fn last_by_resource(&self, resource: &ResourceId) -> Result<Option<EventHash>, ClawError> {
        match self.resource_last.get(resource.0.as_str()).map_err(storage_err)? {
            Some(bytes) => {
                let mut h = [0u8; 32];
                h.copy_from_slice(&bytes);
                Ok(Some(EventHash::from_bytes(h)))
            }
            None => Ok(None),
        }
    }

    pub fn set_last_by_resource(&self, resource: &ResourceId, hash: &EventHash) -> Result<(), ClawError> {
        self.resource_last
            .insert(resource.0.as_str(), hash.as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Rolls `lastByResource` back to "resource has no accepted events yet".
    /// Only used when retracting a superseded resource-chain head whose own
    /// `resourcePrev` was `None` (a creation event).
    pub fn clear_last_by_resource(&self, resource: &ResourceId) -> Result<(), ClawError> {
        self.resource_last.remove(resource.0.as_str()).map_err(storage_err)?;
        Ok(())
    }

    // ── Nonce window (out-of-order buffer, spec.md §3.2) ────────────────────

    fn window_key(issuer: &Did, nonce: Nonce) -> Vec<u8> {
        let mut k = issuer.as_str().as_bytes().to_vec();
        k.push(0);
        k.extend_from_slice(&nonce.to_be_bytes());
        k
    }

    pub fn buffer_event(&self, issuer: &Did, nonce: Nonce, bytes: &[u8]) -> Result<(), ClawError> {
        self.nonce_window
            .insert(Self::window_key(issuer, nonce), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn take_buffered(&self, issuer: &Did, nonce: Nonce) -> Result<Option<Vec<u8>>, ClawError> {
        Ok(self
            .nonce_window
            .remove(Self::window_key(issuer, nonce))
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    pub fn buffered_nonces(&self, issuer: &Did) -> Result<Vec<Nonce>, ClawError> {
        let prefix = {
            let mut p = issuer.as_str().as_bytes().to_vec();
            p.push(0);
            p
        };
        let mut out = Vec::new();
        for item in self.nonce_window.scan_prefix(&prefix) {
            let (k, _) = item.map_err(storage_err)?;
            let nonce_bytes = &k[prefix.len()..];
            out.push(u64::from_be_bytes(nonce_bytes.try_into().unwrap()));
        }
        out.sort_unstable();
        Ok(out)
    }

    // ── Clock-skew retry buffer (spec.md §7: hold briefly, retry once, drop) ─

    /// Holds a clock-skew-quarantined envelope for exactly one retry on the
    /// next backfill tick, keyed by its own event hash.
    pub fn buffer_skewed(&self, hash: &EventHash, bytes: &[u8]) -> Result<(), ClawError> {
        self.skew_buffer.insert(hash.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    /// Drains the entire clock-skew buffer. The caller resubmits each entry
    /// once; whatever the outcome, it is not held a second time.
    pub fn take_all_skewed(&self) -> Result<Vec<(EventHash, Vec<u8>)>, ClawError> {
        let mut out = Vec::new();
        for item in self.skew_buffer.iter() {
            let (k, v) = item.map_err(storage_err)?;
            let mut h = [0u8; 32];
            h.copy_from_slice(&k);
            out.push((EventHash::from_bytes(h), v.to_vec()));
        }
        for (hash, _) in &out {
            self.skew_buffer.remove(hash.as_bytes()).map_err(storage_err)?;
        }
        Ok(out)
    }

    pub fn flush(&self) -> Result<(), ClawError> {
        self.log.flush().map_err(storage_err)?;
        Ok(())
    }

    // ── Snapshot dump / load (spec.md §4.7, §3.5) ────────────────────────────

    /// Dumps the per-issuer and per-resource indexes only — never the log
    /// itself, since avoiding a full-log download is the entire point of a
    /// snapshot. A node that loads this still has an empty log; it replays
    /// forward from `cursor` via ordinary range-request backfill.
    pub fn dump_indexes(&self) -> Result<Vec<(String, Vec<(Vec<u8>, Vec<u8>)>)>, ClawError> {
        let trees: [(&str, &sled::Tree); 2] = [("issuer_nonce", &self.issuer_nonce), ("resource_last", &self.resource_last)];
        let mut out = Vec::with_capacity(trees.len());
        for (name, tree) in trees {
            let mut entries = Vec::new();
            for item in tree.iter() {
                let (k, v) = item.map_err(storage_err)?;
                entries.push((k.to_vec(), v.to_vec()));
            }
            out.push((name.to_string(), entries));
        }
        Ok(out)
    }

    pub fn load_indexes(&self, dumps: &[(String, Vec<(Vec<u8>, Vec<u8>)>)]) -> Result<(), ClawError> {
        for (name, entries) in dumps {
            let tree = match name.as_str() {
                "issuer_nonce" => &self.issuer_nonce,
                "resource_last" => &self.resource_last,
                _ => continue,
            };
            for (k, v) in entries {
                tree.insert(k.as_slice(), v.as_slice()).map_err(storage_err)?;
            }
        }
        Ok(())
    }

    /// Sets the backfill starting point after a cold-start snapshot load.
    /// The local log stays empty; `log_range` against a peer's store (which
    /// does have this hash indexed) continues from here.
    pub fn set_cold_start_cursor(&self, hash: &EventHash) -> Result<(), ClawError> {
        self.meta.insert(KEY_LATEST_HASH, hash.as_bytes()).map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(n: u8) -> EventHash {
        EventHash::from_bytes([n; 32])
    }

    #[test]
    fn append_is_idempotent_on_duplicate_hash() {
        let store = EventStore::temporary().unwrap();
        let h = hash_of(1);
        assert_eq!(store.append(&h, b"one").unwrap(), AppendOutcome::Appended);
        assert_eq!(store.append(&h, b"one-again").unwrap(), AppendOutcome::AlreadyExists);
        assert_eq!(store.get_by_hash(&h).unwrap().unwrap(), b"one");
    }

    #[test]
    fn log_range_returns_strictly_after_cursor() {
        let store = EventStore::temporary().unwrap();
        let h1 = hash_of(1);
        let h2 = hash_of(2);
        let h3 = hash_of(3);
        store.append(&h1, b"1").unwrap();
        store.append(&h2, b"2").unwrap();
        store.append(&h3, b"3").unwrap();

        let (events, cursor) = store.log_range(Some(&h1), 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, h2);
        assert_eq!(events[1].0, h3);
        assert_eq!(cursor, Some(h3));
    }

    #[test]
    fn latest_hash_tracks_last_append() {
        let store = EventStore::temporary().unwrap();
        assert!(store.latest_hash().unwrap().is_none());
        let h1 = hash_of(9);
        store.append(&h1, b"x").unwrap();
        assert_eq!(store.latest_hash().unwrap(), Some(h1));
    }

    #[test]
    fn nonce_window_buffers_and_drains() {
        let store = EventStore::temporary().unwrap();
        let issuer = Did("did:claw:zAAA".to_string());
        store.buffer_event(&issuer, 3, b"three").unwrap();
        store.buffer_event(&issuer, 5, b"five").unwrap();
        assert_eq!(store.buffered_nonces(&issuer).unwrap(), vec![3, 5]);
        assert_eq!(store.take_buffered(&issuer, 3).unwrap().unwrap(), b"three");
        assert_eq!(store.buffered_nonces(&issuer).unwrap(), vec![5]);
    }

    #[test]
    fn retract_removes_log_and_order_entries() {
        let store = EventStore::temporary().unwrap();
        let h1 = hash_of(1);
        let h2 = hash_of(2);
        store.append(&h1, b"one").unwrap();
        store.append(&h2, b"two").unwrap();

        let bytes = store.retract(&h1).unwrap().unwrap();
        assert_eq!(bytes, b"one");
        assert!(!store.contains(&h1));
        assert!(store.contains(&h2));

        let (events, _) = store.log_range(None, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, h2);
        assert!(store.retract(&h1).unwrap().is_none());
    }

    #[test]
    fn skew_buffer_drains_everything_exactly_once() {
        let store = EventStore::temporary().unwrap();
        let h1 = hash_of(1);
        let h2 = hash_of(2);
        store.buffer_skewed(&h1, b"one").unwrap();
        store.buffer_skewed(&h2, b"two").unwrap();

        let drained = store.take_all_skewed().unwrap();
        assert_eq!(drained.len(), 2);
        assert!(store.take_all_skewed().unwrap().is_empty());
    }
}

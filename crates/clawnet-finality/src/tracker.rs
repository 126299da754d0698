use std::collections::{HashMap, HashSet};

use clawnet_core::config::{FinalityConfig, SybilPolicy};
use clawnet_core::types::{EventHash, Timestamp, WirePeerId};
use tracing::{debug, info};

/// Why an event is (or isn't yet) final, per spec.md §4.8: either enough
/// distinct eligible peers echoed it with no conflicting sibling, or enough
/// wall-clock time has passed without one surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalityStatus {
    Pending,
    FinalByPeerCount(u32),
    FinalByTime,
}

struct Record {
    peers: HashSet<WirePeerId>,
    first_seen_at: Timestamp,
    has_conflict: bool,
}

/// Amount-keyed tier lookup (spec.md §4.8): `None` (the event has no
/// amount, e.g. an identity or reputation event) uses the smallest tier.
fn required_peers(tiers: &[(u128, u32)], amount: Option<u128>) -> u32 {
    match amount {
        None => tiers.first().map(|(_, n)| *n).unwrap_or(3),
        Some(a) => tiers
            .iter()
            .find(|(ceiling, _)| a <= *ceiling)
            .map(|(_, n)| *n)
            .unwrap_or_else(|| tiers.last().map(|(_, n)| *n).unwrap_or(7)),
    }
}

/// Tracks, per event hash, which distinct peers have echoed it and whether
/// any of them reported a conflicting sibling on the same `resourcePrev`
/// (spec.md §4.8 — a conflict blocks finality regardless of peer count or
/// elapsed time until it resolves). Mirrors the shape of the teacher's
/// `FinalityTracker`: confirmations accumulate in memory, keyed by the
/// candidate being confirmed, and are dropped once resolved.
pub struct FinalityTracker {
    config: FinalityConfig,
    sybil_policy: SybilPolicy,
    records: HashMap<EventHash, Record>,
}

impl FinalityTracker {
    pub fn new(config: FinalityConfig, sybil_policy: SybilPolicy) -> Self {
        Self {
            config,
            sybil_policy,
            records: HashMap::new(),
        }
    }

    /// Record that `peer` echoed `hash` at `observed_at`. `conflict` marks
    /// that this same peer (or a prior one) reported a sibling event
    /// contesting the same resource; once set it persists for the record's
    /// lifetime. The caller is responsible for the sybil-policy eligibility
    /// check (allowlist membership, PoW ticket, stake proof) before calling
    /// this — an ineligible peer's observation should never reach here.
    pub fn observe(&mut self, hash: EventHash, peer: WirePeerId, observed_at: Timestamp, conflict: bool) {
        let record = self.records.entry(hash).or_insert_with(|| Record {
            peers: HashSet::new(),
            first_seen_at: observed_at,
            has_conflict: false,
        });
        record.peers.insert(peer.clone());
        if conflict && !record.has_conflict {
            record.has_conflict = true;
            debug!(hash = %hash, peer = %peer, "conflicting sibling reported, finality held");
        }
    }

    /// Evaluate whether `hash` is final. `amount` is the event's transfer
    /// amount when it has one, selecting the peer-count tier; `None` for
    /// amount-less event types.
    pub fn evaluate(&self, hash: &EventHash, amount: Option<u128>, now: Timestamp) -> FinalityStatus {
        let Some(record) = self.records.get(hash) else {
            return FinalityStatus::Pending;
        };
        if record.has_conflict {
            return FinalityStatus::Pending;
        }

        if self.sybil_policy != SybilPolicy::None {
            let required = required_peers(&self.config.tiers, amount);
            let seen = record.peers.len() as u32;
            if seen >= required {
                return FinalityStatus::FinalByPeerCount(seen);
            }
        }

        if now.saturating_sub(record.first_seen_at) >= self.config.time_ms {
            return FinalityStatus::FinalByTime;
        }

        FinalityStatus::Pending
    }

    /// Drop tracking state for a resolved (finalized, or permanently
    /// conflicted and abandoned) hash.
    pub fn forget(&mut self, hash: &EventHash) {
        if self.records.remove(hash).is_some() {
            info!(hash = %hash, "finality tracking state cleared");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> EventHash {
        EventHash::from_bytes([n; 32])
    }

    fn peer(n: u8) -> WirePeerId {
        WirePeerId(format!("peer-{n}"))
    }

    #[test]
    fn peer_count_tier_selects_by_amount() {
        let tiers = vec![(100_000_000u128, 3), (1_000_000_000u128, 5), (u128::MAX, 7)];
        assert_eq!(required_peers(&tiers, Some(1)), 3);
        assert_eq!(required_peers(&tiers, Some(500_000_000)), 5);
        assert_eq!(required_peers(&tiers, Some(5_000_000_000)), 7);
        assert_eq!(required_peers(&tiers, None), 3);
    }

    #[test]
    fn finalizes_by_peer_count_once_threshold_reached() {
        let mut tracker = FinalityTracker::new(FinalityConfig::default(), SybilPolicy::Allowlist);
        let h = hash(1);
        tracker.observe(h, peer(1), 1000, false);
        assert_eq!(tracker.evaluate(&h, Some(10), 1000), FinalityStatus::Pending);
        tracker.observe(h, peer(2), 1000, false);
        tracker.observe(h, peer(3), 1000, false);
        assert_eq!(tracker.evaluate(&h, Some(10), 1000), FinalityStatus::FinalByPeerCount(3));
    }

    #[test]
    fn sybil_none_never_finalizes_by_peer_count() {
        let mut tracker = FinalityTracker::new(FinalityConfig::default(), SybilPolicy::None);
        let h = hash(2);
        for i in 0..10 {
            tracker.observe(h, peer(i), 1000, false);
        }
        assert_eq!(tracker.evaluate(&h, Some(10), 1000), FinalityStatus::Pending);
    }

    #[test]
    fn time_based_finality_after_threshold_elapsed() {
        let mut config = FinalityConfig::default();
        config.time_ms = 1000;
        let mut tracker = FinalityTracker::new(config, SybilPolicy::None);
        let h = hash(3);
        tracker.observe(h, peer(1), 0, false);
        assert_eq!(tracker.evaluate(&h, Some(10), 999), FinalityStatus::Pending);
        assert_eq!(tracker.evaluate(&h, Some(10), 1000), FinalityStatus::FinalByTime);
    }

    #[test]
    fn conflict_blocks_finality_regardless_of_peer_count() {
        let mut tracker = FinalityTracker::new(FinalityConfig::default(), SybilPolicy::Pow);
        let h = hash(4);
        tracker.observe(h, peer(1), 1000, false);
        tracker.observe(h, peer(2), 1000, true);
        tracker.observe(h, peer(3), 1000, false);
        assert_eq!(tracker.evaluate(&h, Some(10), 100_000), FinalityStatus::Pending);
    }
}

use clawnet_core::types::EventHash;

/// spec.md §4.3 step 7, tie-break clause: of two events that independently
/// claim the same `resourcePrev`, the one with the lower `eventHash` is
/// canonical. Only meaningful between two candidates neither of which has
/// been applied yet — once one is committed, `resource_last` has moved on
/// and the other is a stale conflict, not a fork. Used by the sync/backfill
/// path (not the single-writer pipeline itself) to decide, deterministically
/// across every node, which of two concurrently-discovered candidates gets
/// fed to the pipeline first.
pub fn tie_break_wins(candidate: &EventHash, other: &EventHash) -> bool {
    candidate.as_bytes() < other.as_bytes()
}

/// Picks the canonical event out of a set of candidates that all claim the
/// same `resourcePrev`. Empty input has no winner.
pub fn resolve_fork<'a>(candidates: &'a [EventHash]) -> Option<&'a EventHash> {
    candidates.iter().min_by_key(|h| *h.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_hash_wins() {
        let a = EventHash::from_bytes([1; 32]);
        let b = EventHash::from_bytes([2; 32]);
        assert!(tie_break_wins(&a, &b));
        assert!(!tie_break_wins(&b, &a));
    }

    #[test]
    fn resolve_fork_picks_minimum() {
        let candidates = vec![EventHash::from_bytes([5; 32]), EventHash::from_bytes([2; 32]), EventHash::from_bytes([9; 32])];
        assert_eq!(resolve_fork(&candidates), Some(&candidates[1]));
    }
}

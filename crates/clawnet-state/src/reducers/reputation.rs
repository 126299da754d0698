use clawnet_core::constants::{REPUTATION_MAX, REPUTATION_MIN, REPUTATION_WEIGHT_DEN, REPUTATION_WEIGHT_NUM};
use clawnet_core::error::ClawError;
use clawnet_core::types::{Did, EventHash};
use clawnet_store::EventStore;
use serde_json::Value;

use crate::db::DerivedDb;
use crate::derived::ReputationScore;
use crate::reducers::helpers::{i64_field, str_field};

/// `reputation.record` (SPEC_FULL.md §12.2): fixed-point EMA,
/// `new = old + (delta - old) / 8`, clamped to `[0, 1000]`. Never touches
/// floating point. `ref` must name an event already present in the log.
pub fn record(payload: &Value, events: &EventStore, db: &DerivedDb) -> Result<(), ClawError> {
    let target = Did(str_field(payload, "target")?.to_string());
    let dimension = str_field(payload, "dimension")?.to_string();
    let delta = i64_field(payload, "delta")?.clamp(REPUTATION_MIN, REPUTATION_MAX);

    let reference = str_field(payload, "ref")?;
    let reference_hash =
        EventHash::from_hex(reference).map_err(|e| ClawError::MalformedValue(e.to_string()))?;
    if !events.contains(&reference_hash) {
        return Err(ClawError::DanglingReference(reference.to_string()));
    }

    let mut score = db
        .get_reputation(&target, &dimension)?
        .unwrap_or_else(|| ReputationScore {
            target: target.clone(),
            dimension: dimension.clone(),
            score: (REPUTATION_MIN + REPUTATION_MAX) / 2,
        });

    let updated = score.score + (delta - score.score) * REPUTATION_WEIGHT_NUM / REPUTATION_WEIGHT_DEN;
    score.score = updated.clamp(REPUTATION_MIN, REPUTATION_MAX);

    db.put_reputation(&score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hash(n: u8) -> EventHash {
        EventHash::from_bytes([n; 32])
    }

    #[test]
    fn record_moves_score_toward_delta_and_is_clamped() {
        let db = DerivedDb::temporary().unwrap();
        let events = EventStore::temporary().unwrap();
        let h1 = hash(1);
        events.append(&h1, b"event").unwrap();

        let target = Did("did:claw:zseller".to_string());
        record(
            &json!({"target": target.as_str(), "dimension": "delivery", "delta": 1000, "ref": h1.to_hex()}),
            &events,
            &db,
        )
        .unwrap();

        let first = db.get_reputation(&target, "delivery").unwrap().unwrap();
        assert!(first.score > 500 && first.score < 1000);

        for _ in 0..50 {
            record(
                &json!({"target": target.as_str(), "dimension": "delivery", "delta": 1000, "ref": h1.to_hex()}),
                &events,
                &db,
            )
            .unwrap();
        }
        let settled = db.get_reputation(&target, "delivery").unwrap().unwrap();
        assert_eq!(settled.score, 1000);
    }

    #[test]
    fn record_rejects_dangling_reference() {
        let db = DerivedDb::temporary().unwrap();
        let events = EventStore::temporary().unwrap();
        let target = Did("did:claw:zseller".to_string());

        let err = record(
            &json!({"target": target.as_str(), "dimension": "delivery", "delta": 10, "ref": hash(9).to_hex()}),
            &events,
            &db,
        )
        .unwrap_err();
        assert!(matches!(err, ClawError::DanglingReference(_)));
    }
}

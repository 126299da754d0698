use std::sync::Arc;

use clawnet_codec::envelope_verify::verify_envelope;
use clawnet_codec::hash::event_hash;
use clawnet_core::config::NodeConfig;
use clawnet_core::constants::PROTOCOL_VERSION;
use clawnet_core::envelope::EventEnvelope;
use clawnet_core::error::ClawError;
use clawnet_core::types::{Did, EventHash, Timestamp};
use clawnet_state::engine::StateEngine;
use clawnet_store::EventStore;
use tracing::{debug, info};

use crate::fork;

enum ReplayDecision {
    Apply,
    Buffer,
}

/// Outcome of successfully feeding an envelope through the pipeline. An
/// out-of-order-but-valid nonce is not a success outcome here: it comes
/// back as `Err(ClawError::Buffered)`, which `ClawError::is_quarantine`
/// distinguishes from a hard rejection for callers that want to retry it
/// later instead of dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Applied immediately; carries its event hash.
    Applied(EventHash),
}

/// The nine-step validation pipeline (spec.md §4.3): schema, timestamp
/// skew, signature, version, authorization, replay, resource-conflict,
/// precondition, apply. Steps 1–7 live here; 8–9 are delegated to
/// `StateEngine::apply`, which fuses precondition-check and mutation per
/// reducer so a failed precondition can never leave a partial effect.
pub struct ValidationPipeline {
    config: NodeConfig,
    events: Arc<EventStore>,
    state: Arc<StateEngine>,
}

impl ValidationPipeline {
    pub fn new(config: NodeConfig, events: Arc<EventStore>, state: Arc<StateEngine>) -> Self {
        Self { config, events, state }
    }

    /// Submit one wire-received envelope. `raw_bytes` is the exact bytes the
    /// envelope was decoded from, stored verbatim in the log on acceptance.
    pub fn submit(&self, envelope: EventEnvelope, raw_bytes: &[u8], now: Timestamp) -> Result<Outcome, ClawError> {
        let hash = self.check_schema(&envelope, raw_bytes)?;
        self.check_timestamp(envelope.ts, now)?;
        self.check_signature(&envelope)?;
        self.check_version(&envelope)?;
        self.check_authorization(&envelope)?;

        match self.check_replay(&envelope, &hash)? {
            ReplayDecision::Apply => {
                self.check_resource_conflict(&envelope, &hash)?;
                self.commit(&envelope, &hash, raw_bytes, now)?;
                self.drain_buffered(&envelope.issuer, now)?;
                Ok(Outcome::Applied(hash))
            }
            ReplayDecision::Buffer => {
                self.events.buffer_event(&envelope.issuer, envelope.nonce, raw_bytes)?;
                debug!(issuer = %envelope.issuer, nonce = envelope.nonce, "event buffered awaiting nonce gap");
                Err(ClawError::Buffered {
                    issuer: envelope.issuer.to_string(),
                    nonce: envelope.nonce,
                })
            }
        }
    }

    // ── Step 1: schema ───────────────────────────────────────────────────────

    fn check_schema(&self, envelope: &EventEnvelope, raw_bytes: &[u8]) -> Result<EventHash, ClawError> {
        if raw_bytes.len() > self.config.max_event_bytes {
            return Err(ClawError::SizeExceeded {
                max: self.config.max_event_bytes,
                got: raw_bytes.len(),
            });
        }
        let recomputed = event_hash(envelope).map_err(|e| ClawError::MalformedValue(e.to_string()))?;
        match &envelope.hash {
            Some(h) if *h == recomputed => Ok(recomputed),
            Some(_) => Err(ClawError::MalformedValue("declared hash does not match recomputed hash".to_string())),
            None => Err(ClawError::MissingField("hash")),
        }
    }

    // ── Step 2: timestamp skew ───────────────────────────────────────────────

    fn check_timestamp(&self, ts: Timestamp, now: Timestamp) -> Result<(), ClawError> {
        let skew = (ts - now).abs();
        if skew > self.config.max_clock_skew_ms {
            return Err(ClawError::ClockSkew {
                ts,
                now,
                max_skew_ms: self.config.max_clock_skew_ms,
            });
        }
        Ok(())
    }

    // ── Step 3: signature ────────────────────────────────────────────────────

    fn check_signature(&self, envelope: &EventEnvelope) -> Result<(), ClawError> {
        if !verify_envelope(envelope) {
            return Err(ClawError::SignatureInvalid);
        }
        Ok(())
    }

    // ── Step 4: version ──────────────────────────────────────────────────────

    fn check_version(&self, envelope: &EventEnvelope) -> Result<(), ClawError> {
        if envelope.v != PROTOCOL_VERSION {
            return Err(ClawError::UnknownVersion(envelope.v));
        }
        Ok(())
    }

    // ── Step 5: authorization ────────────────────────────────────────────────

    /// Generic issuer-identity authorization: a registered, non-revoked DID
    /// must sign with its currently active key. Event-type-specific
    /// authorization (treasury-only mint, escrow party rules, ...) is a
    /// precondition of the individual reducer, not a generic pipeline step,
    /// since spec.md phrases those rules per event type rather than
    /// uniformly.
    fn check_authorization(&self, envelope: &EventEnvelope) -> Result<(), ClawError> {
        if let Some(record) = self.state.db.get_did(&envelope.issuer)? {
            if record.revoked {
                return Err(ClawError::DidRevoked(envelope.issuer.to_string()));
            }
            if record.active_public_key != envelope.pub_key.0 {
                return Err(ClawError::KeyMismatch);
            }
        }
        Ok(())
    }

    // ── Step 6: replay ───────────────────────────────────────────────────────

    /// `expected - 1` is the issuer's current chain tip: a second event
    /// claiming that same nonce is a sibling race, not a stale replay, and
    /// gets the tie-break rather than an outright rejection (spec.md §4.3:
    /// "if two events share an (issuer, nonce) ..., the one with the
    /// numerically smaller hash is kept"). Anything older than that has
    /// already been superseded by a committed descendant and can no longer
    /// be contested without a cascading reorg, so it stays a hard replay.
    fn check_replay(&self, envelope: &EventEnvelope, incoming_hash: &EventHash) -> Result<ReplayDecision, ClawError> {
        let expected = self.events.committed_nonce(&envelope.issuer)?;
        if envelope.nonce < expected {
            if envelope.nonce + 1 == expected {
                if let Some(committed_hash) = self.events.last_by_issuer(&envelope.issuer)? {
                    if self.try_supersede(&committed_hash, incoming_hash)? {
                        return Ok(ReplayDecision::Apply);
                    }
                }
            }
            return Err(ClawError::Replay {
                issuer: envelope.issuer.to_string(),
                nonce: envelope.nonce,
            });
        }
        if envelope.nonce == expected {
            return Ok(ReplayDecision::Apply);
        }
        let gap = envelope.nonce - expected;
        if gap > self.config.nonce_window {
            return Err(ClawError::NonceWindowExceeded {
                issuer: envelope.issuer.to_string(),
                committed: expected,
                nonce: envelope.nonce,
            });
        }
        Ok(ReplayDecision::Buffer)
    }

    // ── Step 7: resource conflict ────────────────────────────────────────────

    /// Same tie-break rule as `check_replay`, applied to `resourcePrev`
    /// siblings: two events racing to extend the same resource tip resolve
    /// to whichever has the smaller hash rather than whichever committed
    /// first.
    fn check_resource_conflict(&self, envelope: &EventEnvelope, incoming_hash: &EventHash) -> Result<(), ClawError> {
        let Some(resource_id) = envelope.resource_id() else {
            return Ok(());
        };
        let claimed_prev = envelope.resource_prev();
        let committed = self.events.last_by_resource(&resource_id)?;
        match (committed, claimed_prev) {
            (None, None) => Ok(()),
            (None, Some(p)) => Err(ClawError::ResourceConflict {
                resource: resource_id.to_string(),
                expected: "none".to_string(),
                got: p.to_hex(),
            }),
            (Some(c), None) => Err(ClawError::ResourceConflict {
                resource: resource_id.to_string(),
                expected: c.to_hex(),
                got: "none".to_string(),
            }),
            (Some(c), Some(p)) if c == p => Ok(()),
            (Some(c), Some(p)) => {
                if self.try_supersede(&c, incoming_hash)? {
                    Ok(())
                } else {
                    Err(ClawError::ResourceConflict {
                        resource: resource_id.to_string(),
                        expected: c.to_hex(),
                        got: p.to_hex(),
                    })
                }
            }
        }
    }

    /// Resolves a sibling conflict against an already-committed event
    /// (spec.md §4.3 tie-break). If `incoming_hash` is numerically smaller,
    /// retracts the committed event — rolling its issuer/resource pointers
    /// back to its own `prev`/`resourcePrev` and rebuilding derived state
    /// from the log to undo its effects — and returns `true` so the caller
    /// proceeds to commit the incoming event in its place. Returns `false`
    /// (no change made) if the committed event wins the tie-break.
    fn try_supersede(&self, committed_hash: &EventHash, incoming_hash: &EventHash) -> Result<bool, ClawError> {
        if committed_hash == incoming_hash || !fork::tie_break_wins(incoming_hash, committed_hash) {
            return Ok(false);
        }
        let Some(bytes) = self.events.retract(committed_hash)? else {
            return Ok(false);
        };
        let loser: EventEnvelope = serde_json::from_slice(&bytes).map_err(|e| ClawError::MalformedValue(e.to_string()))?;

        match loser.prev {
            Some(prev) => self.events.set_last_by_issuer(&loser.issuer, &prev)?,
            None => self.events.clear_last_by_issuer(&loser.issuer)?,
        }
        self.events.set_committed_nonce(&loser.issuer, loser.nonce)?;
        if let Some(resource_id) = loser.resource_id() {
            match loser.resource_prev() {
                Some(prev) => self.events.set_last_by_resource(&resource_id, &prev)?,
                None => self.events.clear_last_by_resource(&resource_id)?,
            }
        }

        self.state.rebuild_from_log()?;
        info!(retracted = %committed_hash, superseded_by = %incoming_hash, "fork tie-break: retracted committed event for a lower-hash sibling");
        Ok(true)
    }

    // ── Steps 8–9: precondition + apply, then log commit ─────────────────────

    fn commit(&self, envelope: &EventEnvelope, hash: &EventHash, raw_bytes: &[u8], now: Timestamp) -> Result<(), ClawError> {
        self.state.apply(envelope, hash, now)?;

        self.events.append(hash, raw_bytes)?;
        self.events.set_last_by_issuer(&envelope.issuer, hash)?;
        self.events.set_committed_nonce(&envelope.issuer, envelope.nonce + 1)?;
        if let Some(resource_id) = envelope.resource_id() {
            self.events.set_last_by_resource(&resource_id, hash)?;
        }
        info!(event_type = %envelope.event_type, issuer = %envelope.issuer, hash = %hash, "event committed");
        Ok(())
    }

    /// After committing nonce N for `issuer`, replay any contiguously
    /// buffered successors (spec.md §3.2 nonce window drain).
    fn drain_buffered(&self, issuer: &Did, now: Timestamp) -> Result<(), ClawError> {
        loop {
            let expected = self.events.committed_nonce(issuer)?;
            let Some(bytes) = self.events.take_buffered(issuer, expected)? else {
                return Ok(());
            };
            let envelope: EventEnvelope = serde_json::from_slice(&bytes).map_err(|e| ClawError::MalformedValue(e.to_string()))?;
            let hash = event_hash(&envelope).map_err(|e| ClawError::MalformedValue(e.to_string()))?;
            self.check_resource_conflict(&envelope, &hash)?;
            self.commit(&envelope, &hash, &bytes, now)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawnet_codec::identity::derive_did;
    use clawnet_codec::sign::KeyPair;
    use serde_json::json;

    fn make_pipeline() -> (ValidationPipeline, KeyPair) {
        let kp = KeyPair::generate();
        let events = Arc::new(EventStore::temporary().unwrap());
        let db = Arc::new(clawnet_state::db::DerivedDb::temporary().unwrap());
        let state = Arc::new(StateEngine::new(db, events.clone()));
        let pipeline = ValidationPipeline::new(NodeConfig::default(), events, state);
        (pipeline, kp)
    }

    fn sign_envelope(kp: &KeyPair, event_type: &str, nonce: u64, payload: serde_json::Value, ts: i64) -> (EventEnvelope, Vec<u8>) {
        let mut env = EventEnvelope {
            v: 1,
            event_type: event_type.to_string(),
            issuer: derive_did(&kp.public_key()),
            ts,
            nonce,
            payload,
            prev: None,
            pub_key: kp.public_key(),
            sig: None,
            hash: None,
        };
        let sign_bytes = clawnet_codec::hash::event_sign_bytes(&env).unwrap();
        env.sig = Some(kp.sign(&sign_bytes));
        env.hash = Some(event_hash(&env).unwrap());
        let raw = serde_json::to_vec(&env).unwrap();
        (env, raw)
    }

    #[test]
    fn accepts_and_applies_identity_create() {
        let (pipeline, kp) = make_pipeline();
        let (env, raw) = sign_envelope(
            &kp,
            "identity.create",
            0,
            json!({"docHash": EventHash::from_bytes([1; 32]).to_hex(), "publicKey": hex::encode(&kp.public_key().0)}),
            1_700_000_000_000,
        );
        let outcome = pipeline.submit(env, &raw, 1_700_000_000_000).unwrap();
        assert!(matches!(outcome, Outcome::Applied(_)));
    }

    #[test]
    fn out_of_order_nonce_is_buffered_then_drained() {
        let (pipeline, kp) = make_pipeline();
        let did = derive_did(&kp.public_key());
        let (env0, raw0) = sign_envelope(
            &kp,
            "identity.create",
            0,
            json!({"docHash": EventHash::from_bytes([1; 32]).to_hex(), "publicKey": hex::encode(&kp.public_key().0)}),
            1_700_000_000_000,
        );
        let (env1, raw1) = sign_envelope(
            &kp,
            "identity.update",
            1,
            json!({"prevDocHash": EventHash::from_bytes([1; 32]).to_hex(), "docHash": EventHash::from_bytes([2; 32]).to_hex()}),
            1_700_000_000_000,
        );

        let err = pipeline.submit(env1, &raw1, 1_700_000_000_000).unwrap_err();
        assert!(matches!(err, ClawError::Buffered { .. }));

        let outcome = pipeline.submit(env0, &raw0, 1_700_000_000_000).unwrap();
        assert!(matches!(outcome, Outcome::Applied(_)));
        assert_eq!(pipeline.events.committed_nonce(&did).unwrap(), 2);
    }

    #[test]
    fn stale_nonce_is_replay() {
        let (pipeline, kp) = make_pipeline();
        let (env0, raw0) = sign_envelope(
            &kp,
            "identity.create",
            0,
            json!({"docHash": EventHash::from_bytes([1; 32]).to_hex(), "publicKey": hex::encode(&kp.public_key().0)}),
            1_700_000_000_000,
        );
        pipeline.submit(env0.clone(), &raw0, 1_700_000_000_000).unwrap();

        let err = pipeline.submit(env0, &raw0, 1_700_000_000_000).unwrap_err();
        assert!(matches!(err, ClawError::Replay { .. }));
    }

    #[test]
    fn lower_hash_sibling_supersedes_committed_tip_on_nonce_conflict() {
        let (pipeline, kp) = make_pipeline();
        let did = derive_did(&kp.public_key());
        let (env0, raw0) = sign_envelope(
            &kp,
            "identity.create",
            0,
            json!({"docHash": EventHash::from_bytes([1; 32]).to_hex(), "publicKey": "00"}),
            1_700_000_000_000,
        );
        pipeline.submit(env0, &raw0, 1_700_000_000_000).unwrap();

        let (env_a, raw_a) = sign_envelope(
            &kp,
            "identity.update",
            1,
            json!({"prevDocHash": EventHash::from_bytes([1; 32]).to_hex(), "docHash": EventHash::from_bytes([2; 32]).to_hex()}),
            1_700_000_000_000,
        );
        let (env_b, raw_b) = sign_envelope(
            &kp,
            "identity.update",
            1,
            json!({"prevDocHash": EventHash::from_bytes([1; 32]).to_hex(), "docHash": EventHash::from_bytes([3; 32]).to_hex()}),
            1_700_000_000_000,
        );
        let hash_a = env_a.hash.unwrap();
        let hash_b = env_b.hash.unwrap();

        // Submit the numerically larger hash first so it commits and
        // advances the chain; the smaller-hash sibling arrives second and
        // must still win the tie-break, regardless of arrival order.
        let (loser_first, loser_raw, winner_second, winner_raw, winner_hash) = if hash_a > hash_b {
            (env_a, raw_a, env_b, raw_b, hash_b)
        } else {
            (env_b, raw_b, env_a, raw_a, hash_a)
        };

        pipeline.submit(loser_first, &loser_raw, 1_700_000_000_000).unwrap();
        pipeline.submit(winner_second, &winner_raw, 1_700_000_000_000).unwrap();

        assert_eq!(pipeline.events.last_by_issuer(&did).unwrap(), Some(winner_hash));
        assert_eq!(pipeline.events.committed_nonce(&did).unwrap(), 2);
        assert!(pipeline.events.contains(&winner_hash));
    }

    #[test]
    fn lower_hash_sibling_supersedes_committed_tip_on_resource_conflict() {
        let (pipeline, kp) = make_pipeline();
        let (env0, raw0) = sign_envelope(&kp, "market.listing", 0, json!({"resourceId": "l1", "price": 1}), 1_700_000_000_000);
        let hash0 = env0.hash.unwrap();
        pipeline.submit(env0, &raw0, 1_700_000_000_000).unwrap();

        let (env_a, raw_a) = sign_envelope(&kp, "market.listing", 1, json!({"resourceId": "l1", "resourcePrev": hash0.to_hex(), "price": 2}), 1_700_000_000_000);
        let (env_b, raw_b) = sign_envelope(&kp, "market.listing", 2, json!({"resourceId": "l1", "resourcePrev": hash0.to_hex(), "price": 3}), 1_700_000_000_000);
        let hash_a = env_a.hash.unwrap();
        let hash_b = env_b.hash.unwrap();

        let (loser_first, loser_raw, winner_second, winner_raw, winner_hash) = if hash_a > hash_b {
            (env_a, raw_a, env_b, raw_b, hash_b)
        } else {
            (env_b, raw_b, env_a, raw_a, hash_a)
        };

        pipeline.submit(loser_first, &loser_raw, 1_700_000_000_000).unwrap();
        pipeline.submit(winner_second, &winner_raw, 1_700_000_000_000).unwrap();

        assert_eq!(pipeline.events.last_by_resource(&clawnet_core::types::ResourceId("l1".to_string())).unwrap(), Some(winner_hash));
    }

    #[test]
    fn tampered_signature_rejected() {
        let (pipeline, kp) = make_pipeline();
        let (mut env, _) = sign_envelope(&kp, "identity.create", 0, json!({"docHash": EventHash::from_bytes([1;32]).to_hex(), "publicKey": "00"}), 1_700_000_000_000);
        env.payload = json!({"docHash": EventHash::from_bytes([9;32]).to_hex(), "publicKey": "00"});
        let raw = serde_json::to_vec(&env).unwrap();
        let err = pipeline.submit(env, &raw, 1_700_000_000_000).unwrap_err();
        assert!(matches!(err, ClawError::MalformedValue(_)));
    }

    #[test]
    fn clock_skew_beyond_threshold_rejected() {
        let (pipeline, kp) = make_pipeline();
        let (env, raw) = sign_envelope(&kp, "identity.create", 0, json!({"docHash": EventHash::from_bytes([1;32]).to_hex(), "publicKey": "00"}), 0);
        let err = pipeline.submit(env, &raw, 1_700_000_000_000).unwrap_err();
        assert!(matches!(err, ClawError::ClockSkew { .. }));
    }
}

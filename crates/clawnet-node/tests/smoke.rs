//! In-process smoke test: drives the event log, derived state, and
//! validation pipeline directly, the way a node's main loop would feed
//! them gossip-received events. No process spawning, no RPC — there is no
//! externally-reachable surface to drive from outside the library.

use std::sync::Arc;

use clawnet_codec::hash::{event_hash, event_sign_bytes};
use clawnet_codec::identity::derive_did;
use clawnet_codec::sign::KeyPair;
use clawnet_core::config::NodeConfig;
use clawnet_core::constants::TREASURY_DID;
use clawnet_core::envelope::EventEnvelope;
use clawnet_core::types::{Address, Did};
use clawnet_state::db::DerivedDb;
use clawnet_state::engine::StateEngine;
use clawnet_store::EventStore;
use clawnet_validate::{Outcome, ValidationPipeline};
use serde_json::{json, Value};

fn sign_envelope(kp: &KeyPair, issuer: &Did, event_type: &str, nonce: u64, payload: Value, ts: i64) -> (EventEnvelope, Vec<u8>) {
    let mut env = EventEnvelope {
        v: 1,
        event_type: event_type.to_string(),
        issuer: issuer.clone(),
        ts,
        nonce,
        payload,
        prev: None,
        pub_key: kp.public_key(),
        sig: None,
        hash: None,
    };
    let sign_bytes = event_sign_bytes(&env).unwrap();
    env.sig = Some(kp.sign(&sign_bytes));
    env.hash = Some(event_hash(&env).unwrap());
    let raw = serde_json::to_vec(&env).unwrap();
    (env, raw)
}

struct Harness {
    pipeline: ValidationPipeline,
    db: Arc<DerivedDb>,
}

fn harness() -> Harness {
    let events = Arc::new(EventStore::temporary().unwrap());
    let db = Arc::new(DerivedDb::temporary().unwrap());
    let state = Arc::new(StateEngine::new(Arc::clone(&db), Arc::clone(&events)));
    let pipeline = ValidationPipeline::new(NodeConfig::default(), events, state);
    Harness { pipeline, db }
}

fn balance_of(db: &DerivedDb, addr: &str) -> u128 {
    db.get_account(&Address(addr.to_string())).unwrap().map(|a| a.balance).unwrap_or(0)
}

const TS: i64 = 1_700_000_000_000;

#[test]
fn smoke_identity_mint_transfer_and_escrow() {
    let h = harness();

    // ── 1. Register an identity for the payer ─────────────────────────────────
    let payer_kp = KeyPair::generate();
    let payer_did = derive_did(&payer_kp.public_key());
    let (env, raw) = sign_envelope(
        &payer_kp,
        &payer_did,
        "identity.create",
        0,
        json!({"docHash": "00".repeat(32), "publicKey": hex::encode(&payer_kp.public_key().0)}),
        TS,
    );
    let outcome = h.pipeline.submit(env, &raw, TS).unwrap();
    assert!(matches!(outcome, Outcome::Applied(_)));

    // ── 2. Treasury mints into the payer's balance ─────────────────────────────
    let treasury_kp = KeyPair::generate();
    let treasury_did = Did(TREASURY_DID.to_string());
    let (env, raw) = sign_envelope(
        &treasury_kp,
        &treasury_did,
        "wallet.mint",
        0,
        json!({"to": payer_did.as_str(), "amount": 10_000u64}),
        TS,
    );
    let outcome = h.pipeline.submit(env, &raw, TS).unwrap();
    assert!(matches!(outcome, Outcome::Applied(_)));
    assert_eq!(balance_of(&h.db, payer_did.as_str()), 10_000);

    // ── 3. Payer transfers to bob, with a treasury fee ──────────────────────────
    let bob_kp = KeyPair::generate();
    let bob_did = derive_did(&bob_kp.public_key());
    let (env, raw) = sign_envelope(
        &payer_kp,
        &payer_did,
        "wallet.transfer",
        1,
        json!({"from": payer_did.as_str(), "to": bob_did.as_str(), "amount": 1_000u64, "fee": 10u64}),
        TS,
    );
    let outcome = h.pipeline.submit(env, &raw, TS).unwrap();
    assert!(matches!(outcome, Outcome::Applied(_)));

    assert_eq!(balance_of(&h.db, payer_did.as_str()), 10_000 - 1_000 - 10);
    assert_eq!(balance_of(&h.db, bob_did.as_str()), 1_000);
    assert_eq!(balance_of(&h.db, TREASURY_DID), 10);

    // ── 4. Payer escrows funds for bob ──────────────────────────────────────────
    let (env, raw) = sign_envelope(
        &payer_kp,
        &payer_did,
        "wallet.escrow.create",
        2,
        json!({"resourceId": "escrow-1", "beneficiary": bob_did.as_str(), "amount": "500"}),
        TS,
    );
    let outcome = h.pipeline.submit(env, &raw, TS).unwrap();
    assert!(matches!(outcome, Outcome::Applied(_)));

    assert_eq!(balance_of(&h.db, payer_did.as_str()), 10_000 - 1_000 - 10 - 500);
    assert_eq!(balance_of(&h.db, "escrow:escrow-1"), 500);
}

#[test]
fn replayed_nonce_is_rejected() {
    let h = harness();
    let kp = KeyPair::generate();
    let did = derive_did(&kp.public_key());
    let (env, raw) = sign_envelope(&kp, &did, "identity.create", 0, json!({"docHash": "11".repeat(32), "publicKey": hex::encode(&kp.public_key().0)}), TS);
    h.pipeline.submit(env.clone(), &raw, TS).unwrap();

    let err = h.pipeline.submit(env, &raw, TS).unwrap_err();
    assert!(matches!(err, clawnet_core::error::ClawError::Replay { .. }));
}

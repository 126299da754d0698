use clawnet_core::error::ClawError;
use clawnet_core::types::{Did, EventHash};
use serde_json::Value;

use crate::db::DerivedDb;
use crate::derived::DidRecord;
use crate::reducers::helpers::str_field;

/// `identity.create` (spec.md §4.4): register a fresh DID document.
pub fn create(issuer: &Did, payload: &Value, event_hash: &EventHash, db: &DerivedDb) -> Result<(), ClawError> {
    let doc_hash = EventHash::from_hex(str_field(payload, "docHash")?)
        .map_err(|e| ClawError::MalformedValue(e.to_string()))?;
    let public_key = hex::decode(str_field(payload, "publicKey")?)
        .map_err(|e| ClawError::MalformedValue(e.to_string()))?;

    db.put_did(&DidRecord {
        did: issuer.clone(),
        doc_hash,
        active_public_key: public_key,
        revoked: false,
    })?;
    let _ = event_hash;
    Ok(())
}

/// `identity.update` (spec.md §4.4): requires `prevDocHash` to match the
/// currently recorded document hash.
pub fn update(issuer: &Did, payload: &Value, _event_hash: &EventHash, db: &DerivedDb) -> Result<(), ClawError> {
    let mut record = db
        .get_did(issuer)?
        .ok_or_else(|| ClawError::UnknownDid(issuer.to_string()))?;
    if record.revoked {
        return Err(ClawError::DidRevoked(issuer.to_string()));
    }

    let prev_doc_hash = EventHash::from_hex(str_field(payload, "prevDocHash")?)
        .map_err(|e| ClawError::MalformedValue(e.to_string()))?;
    if prev_doc_hash != record.doc_hash {
        return Err(ClawError::DocHashMismatch);
    }

    record.doc_hash = EventHash::from_hex(str_field(payload, "docHash")?)
        .map_err(|e| ClawError::MalformedValue(e.to_string()))?;
    if let Some(pk) = payload.get("publicKey").and_then(|v| v.as_str()) {
        record.active_public_key = hex::decode(pk).map_err(|e| ClawError::MalformedValue(e.to_string()))?;
    }
    if let Some(revoked) = payload.get("revoke").and_then(|v| v.as_bool()) {
        record.revoked = revoked;
    }

    db.put_did(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hash(n: u8) -> EventHash {
        EventHash::from_bytes([n; 32])
    }

    #[test]
    fn create_then_update_requires_matching_prev_hash() {
        let db = DerivedDb::temporary().unwrap();
        let did = Did("did:claw:zalice".to_string());
        let h1 = hash(1);
        create(
            &did,
            &json!({"docHash": h1.to_hex(), "publicKey": "00"}),
            &h1,
            &db,
        )
        .unwrap();

        let h2 = hash(2);
        update(
            &did,
            &json!({"prevDocHash": h1.to_hex(), "docHash": h2.to_hex()}),
            &h2,
            &db,
        )
        .unwrap();

        let rec = db.get_did(&did).unwrap().unwrap();
        assert_eq!(rec.doc_hash, h2);
    }

    #[test]
    fn update_rejects_stale_prev_hash() {
        let db = DerivedDb::temporary().unwrap();
        let did = Did("did:claw:zbob".to_string());
        let h1 = hash(1);
        create(&did, &json!({"docHash": h1.to_hex(), "publicKey": "00"}), &h1, &db).unwrap();

        let wrong = hash(9);
        let h2 = hash(2);
        let err = update(
            &did,
            &json!({"prevDocHash": wrong.to_hex(), "docHash": h2.to_hex()}),
            &h2,
            &db,
        )
        .unwrap_err();
        assert!(matches!(err, ClawError::DocHashMismatch));
    }
}

use clawnet_core::envelope::EventEnvelope;

use crate::hash::event_sign_bytes;
use crate::identity::derive_did;
use crate::sign::verify as verify_sig;

/// spec.md §4.1 operation 4, in full: re-derive signing bytes, verify `sig`
/// against `pub`, and check the DID embedded in `issuer` matches `pub`.
pub fn verify_envelope(envelope: &EventEnvelope) -> bool {
    let Some(sig) = &envelope.sig else {
        return false;
    };
    let Ok(bytes) = event_sign_bytes(envelope) else {
        return false;
    };
    if verify_sig(&envelope.pub_key, &bytes, sig).is_err() {
        return false;
    }
    derive_did(&envelope.pub_key) == envelope.issuer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::KeyPair;
    use clawnet_core::types::SignatureBytes;
    use serde_json::json;

    fn sample_envelope(kp: &KeyPair) -> EventEnvelope {
        let mut env = EventEnvelope {
            v: 1,
            event_type: "wallet.transfer".to_string(),
            issuer: derive_did(&kp.public_key()),
            ts: 1_700_000_000_000,
            nonce: 1,
            payload: json!({"to": "did:claw:zXYZ", "amount": 10}),
            prev: None,
            pub_key: kp.public_key(),
            sig: None,
            hash: None,
        };
        let bytes = event_sign_bytes(&env).unwrap();
        env.sig = Some(kp.sign(&bytes));
        env
    }

    #[test]
    fn valid_envelope_verifies() {
        let kp = KeyPair::generate();
        let env = sample_envelope(&kp);
        assert!(verify_envelope(&env));
    }

    #[test]
    fn mismatched_issuer_fails() {
        let kp = KeyPair::generate();
        let mut env = sample_envelope(&kp);
        env.issuer = clawnet_core::types::Did("did:claw:zSOMEONEELSE".to_string());
        assert!(!verify_envelope(&env));
    }

    #[test]
    fn missing_signature_fails() {
        let kp = KeyPair::generate();
        let mut env = sample_envelope(&kp);
        env.sig = None;
        assert!(!verify_envelope(&env));
    }

    #[test]
    fn corrupted_signature_fails() {
        let kp = KeyPair::generate();
        let mut env = sample_envelope(&kp);
        env.sig = Some(SignatureBytes(vec![0u8; 64]));
        assert!(!verify_envelope(&env));
    }
}

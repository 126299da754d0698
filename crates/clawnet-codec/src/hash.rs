use clawnet_core::constants::{EVENT_SIGNING_DOMAIN, P2P_SIGNING_DOMAIN};
use clawnet_core::envelope::{EventEnvelope, P2pEnvelope};
use clawnet_core::types::EventHash;
use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize, CanonicalError};

/// spec.md §4.1 operation 2: SHA-256 of `canonicalize(envelope - {sig, hash})`.
pub fn event_hash(envelope: &EventEnvelope) -> Result<EventHash, CanonicalError> {
    let bytes = canonicalize(&envelope.signed_part())?;
    Ok(EventHash::from_bytes(sha256(&bytes)))
}

/// spec.md §4.1 operation 3: domain-separated signing bytes for an event.
pub fn event_sign_bytes(envelope: &EventEnvelope) -> Result<Vec<u8>, CanonicalError> {
    let canon = canonicalize(&envelope.signed_part())?;
    let mut out = Vec::with_capacity(EVENT_SIGNING_DOMAIN.len() + canon.len());
    out.extend_from_slice(EVENT_SIGNING_DOMAIN.as_bytes());
    out.extend_from_slice(&canon);
    Ok(out)
}

/// spec.md §4.6: domain-separated signing bytes for a P2P transport envelope.
pub fn p2p_sign_bytes(envelope: &P2pEnvelope) -> Result<Vec<u8>, CanonicalError> {
    let canon = canonicalize(&envelope.signed_part())?;
    let mut out = Vec::with_capacity(P2P_SIGNING_DOMAIN.len() + canon.len());
    out.extend_from_slice(P2P_SIGNING_DOMAIN.as_bytes());
    out.extend_from_slice(&canon);
    Ok(out)
}

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

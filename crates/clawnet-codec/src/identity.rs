use clawnet_core::types::{Address, Did, PublicKeyBytes};

use crate::hash::sha256;

/// SPEC_FULL.md §12.3: `did:claw:` followed by multibase (`z` + base58btc)
/// of the raw public key.
pub fn derive_did(pub_key: &PublicKeyBytes) -> Did {
    Did(format!("did:claw:z{}", bs58::encode(&pub_key.0).into_string()))
}

/// Recover the raw public key bytes carried inside a DID string, for
/// cross-checking against the envelope's `pub` field (spec.md §4.1 op 4).
pub fn pubkey_from_did(did: &Did) -> Option<Vec<u8>> {
    let body = did.as_str().strip_prefix("did:claw:z")?;
    bs58::decode(body).into_vec().ok()
}

const ADDRESS_VERSION_BYTE: u8 = 0x1c;

/// SPEC_FULL.md §12.3: base58check(version_byte ‖ pubkey ‖ checksum), where
/// checksum is the first 4 bytes of double-SHA-256.
pub fn derive_address(pub_key: &PublicKeyBytes) -> Address {
    let mut payload = Vec::with_capacity(1 + pub_key.0.len());
    payload.push(ADDRESS_VERSION_BYTE);
    payload.extend_from_slice(&pub_key.0);

    let checksum = sha256(&sha256(&payload));
    payload.extend_from_slice(&checksum[..4]);

    Address(bs58::encode(&payload).into_string())
}

/// Validate an address's embedded checksum.
pub fn verify_address(address: &Address) -> bool {
    let Ok(decoded) = bs58::decode(&address.0).into_vec() else {
        return false;
    };
    if decoded.len() < 5 {
        return false;
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    let expected = sha256(&sha256(payload));
    checksum == &expected[..4]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_round_trips_pubkey() {
        let pk = PublicKeyBytes(vec![1u8; 32]);
        let did = derive_did(&pk);
        assert!(did.as_str().starts_with("did:claw:z"));
        assert_eq!(pubkey_from_did(&did).unwrap(), pk.0);
    }

    #[test]
    fn address_checksum_validates() {
        let pk = PublicKeyBytes(vec![7u8; 32]);
        let addr = derive_address(&pk);
        assert!(verify_address(&addr));
    }

    #[test]
    fn corrupted_address_fails_checksum() {
        let pk = PublicKeyBytes(vec![7u8; 32]);
        let mut addr = derive_address(&pk);
        addr.0.push('x');
        assert!(!verify_address(&addr));
    }
}

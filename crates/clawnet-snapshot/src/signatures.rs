use std::collections::HashMap;

use clawnet_codec::sign::{verify, KeyPair};
use clawnet_core::types::{PublicKeyBytes, SignatureBytes};
use serde::{Deserialize, Serialize};

use crate::manifest::SnapshotManifest;

/// One peer's attestation that it independently built (or re-derived and
/// agrees with) a given manifest (spec.md §3.5: "multi-peer signature
/// aggregation on receipt").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSignature {
    pub signer: PublicKeyBytes,
    pub sig: SignatureBytes,
}

pub fn sign_manifest(manifest: &SnapshotManifest, key_pair: &KeyPair) -> ManifestSignature {
    ManifestSignature {
        signer: key_pair.public_key(),
        sig: key_pair.sign(&manifest.signing_bytes()),
    }
}

pub fn verify_manifest_signature(manifest: &SnapshotManifest, signature: &ManifestSignature) -> bool {
    verify(&signature.signer, &manifest.signing_bytes(), &signature.sig).is_ok()
}

/// Accumulates distinct-signer attestations for a manifest until it clears
/// `min_signatures` (spec.md §3.5), at which point the snapshot is eligible
/// to be trusted for cold start.
pub struct SignatureAggregator {
    min_signatures: usize,
    by_signer: HashMap<Vec<u8>, ManifestSignature>,
}

impl SignatureAggregator {
    pub fn new(min_signatures: usize) -> Self {
        Self {
            min_signatures,
            by_signer: HashMap::new(),
        }
    }

    /// Verifies and records `signature` against `manifest`. Returns `true`
    /// if it was valid and newly recorded (invalid or duplicate-signer
    /// attestations are dropped silently).
    pub fn add(&mut self, manifest: &SnapshotManifest, signature: ManifestSignature) -> bool {
        if !verify_manifest_signature(manifest, &signature) {
            return false;
        }
        self.by_signer.insert(signature.signer.0.clone(), signature);
        true
    }

    pub fn count(&self) -> usize {
        self.by_signer.len()
    }

    pub fn satisfied(&self) -> bool {
        self.by_signer.len() >= self.min_signatures
    }

    pub fn signatures(&self) -> Vec<ManifestSignature> {
        self.by_signer.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> SnapshotManifest {
        SnapshotManifest {
            last_event_hash: clawnet_core::types::EventHash::from_bytes([1; 32]),
            event_count: 1,
            created_at: 0,
            chunk_size: 512,
            total_bytes: 10,
            chunk_hashes: vec![clawnet_core::types::EventHash::from_bytes([2; 32])],
        }
    }

    #[test]
    fn aggregator_requires_distinct_signers() {
        let manifest = sample_manifest();
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let mut agg = SignatureAggregator::new(2);

        assert!(agg.add(&manifest, sign_manifest(&manifest, &kp1)));
        assert!(!agg.satisfied());
        // Same signer again: recorded but doesn't add a new distinct signer.
        assert!(agg.add(&manifest, sign_manifest(&manifest, &kp1)));
        assert_eq!(agg.count(), 1);
        assert!(!agg.satisfied());

        assert!(agg.add(&manifest, sign_manifest(&manifest, &kp2)));
        assert!(agg.satisfied());
    }

    #[test]
    fn aggregator_rejects_invalid_signature() {
        let manifest = sample_manifest();
        let other_manifest = SnapshotManifest { event_count: 2, ..clone_m(&manifest) };
        let kp = KeyPair::generate();
        let bad_sig = sign_manifest(&other_manifest, &kp);

        let mut agg = SignatureAggregator::new(1);
        assert!(!agg.add(&manifest, bad_sig));
        assert_eq!(agg.count(), 0);
    }

    fn clone_m(m: &SnapshotManifest) -> SnapshotManifest {
        SnapshotManifest {
            last_event_hash: m.last_event_hash,
            event_count: m.event_count,
            created_at: m.created_at,
            chunk_size: m.chunk_size,
            total_bytes: m.total_bytes,
            chunk_hashes: m.chunk_hashes.clone(),
        }
    }
}

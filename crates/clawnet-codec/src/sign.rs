use clawnet_core::types::{PublicKeyBytes, SignatureBytes};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignatureBytes,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// A local Ed25519 signing identity. Distinct instances back both issuer
/// keys and the P2P peer key — spec.md §4.6 requires these never be shared.
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.verifying_key.to_bytes().to_vec())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn sign(&self, bytes: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(bytes).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair(public={})", hex::encode(self.verifying_key.to_bytes()))
    }
}

/// spec.md §4.1 operation 4, signature half: verify `sig` over `bytes`
/// against `pub`.
pub fn verify(pub_key: &PublicKeyBytes, bytes: &[u8], sig: &SignatureBytes) -> Result<(), SignError> {
    let vk_bytes: [u8; 32] = pub_key
        .0
        .as_slice()
        .try_into()
        .map_err(|_| SignError::InvalidPublicKey)?;
    let verifying_key = VerifyingKey::from_bytes(&vk_bytes).map_err(|_| SignError::InvalidPublicKey)?;

    let sig_bytes: [u8; 64] = sig
        .0
        .as_slice()
        .try_into()
        .map_err(|_| SignError::InvalidSignatureBytes)?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(bytes, &signature)
        .map_err(|_| SignError::VerificationFailed)
}

pub mod canonical;
pub mod envelope_verify;
pub mod hash;
pub mod identity;
pub mod sign;

pub use canonical::{canonicalize, CanonicalError};
pub use envelope_verify::verify_envelope;
pub use hash::{event_hash, event_sign_bytes, p2p_sign_bytes, sha256};
pub use identity::{derive_address, derive_did, pubkey_from_did, verify_address};
pub use sign::{verify, KeyPair, SignError};

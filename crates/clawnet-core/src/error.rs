use thiserror::Error;

/// Error taxonomy for the validation pipeline and everything downstream of
/// it. Each top-level kind maps directly onto the handling spec.md §7
/// prescribes (reject / retry / quarantine / abort); the `reason()` string is
/// what gets surfaced back to a local submitter.
#[derive(Debug, Error)]
pub enum ClawError {
    // ── Malformed: schema/size/serialization violations, reject, no retry ────
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("type mismatch in field {0}")]
    TypeMismatch(&'static str),

    #[error("envelope exceeds maximum size of {max} bytes (got {got})")]
    SizeExceeded { max: usize, got: usize },

    #[error("value cannot be canonicalized: {0}")]
    MalformedValue(String),

    #[error("unknown protocol major version: {0}")]
    UnknownVersion(u16),

    // ── AuthFailure: signature invalid, key/DID mismatch, unauthorized ───────
    #[error("signature invalid")]
    SignatureInvalid,

    #[error("public key does not match issuer DID")]
    KeyMismatch,

    #[error("issuer {issuer} not authorized for {action}")]
    Unauthorized { issuer: String, action: String },

    // ── Replay: nonce <= committed or duplicate, reject silently ─────────────
    #[error("replay: nonce {nonce} already committed for issuer {issuer}")]
    Replay { issuer: String, nonce: u64 },

    #[error("nonce {nonce} exceeds window beyond committed {committed}")]
    NonceWindowExceeded { issuer: String, committed: u64, nonce: u64 },

    // ── Conflict: (issuer, nonce) or resourcePrev collision ──────────────────
    #[error("resource conflict on {resource}: expected prev {expected}, got {got}")]
    ResourceConflict {
        resource: String,
        expected: String,
        got: String,
    },

    // ── Precondition: insufficient balance, wrong state, missing DID ────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: u128, have: u128 },

    #[error("unknown DID: {0}")]
    UnknownDid(String),

    #[error("DID revoked: {0}")]
    DidRevoked(String),

    #[error("escrow {id} not in a state valid for this transition (current: {state})")]
    InvalidEscrowState { id: String, state: String },

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("document hash mismatch on identity update")]
    DocHashMismatch,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("self-transfer not allowed")]
    SelfTransfer,

    #[error("referenced event does not exist: {0}")]
    DanglingReference(String),

    // ── Quarantine: clock skew, nonce gap — hold, retry, then drop ──────────
    #[error("timestamp {ts} skewed beyond {max_skew_ms}ms from now ({now})")]
    ClockSkew { ts: i64, now: i64, max_skew_ms: i64 },

    #[error("nonce {nonce} buffered awaiting gap fill for issuer {issuer}")]
    Buffered { issuer: String, nonce: u64 },

    // ── Transient: network timeout, peer unreachable — retry with backoff ───
    #[error("peer request timed out: {0}")]
    RequestTimeout(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    // ── Fatal: storage corruption, key load failure — abort process ─────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("key load failure: {0}")]
    KeyLoad(String),

    #[error("storage corruption detected: {0}")]
    StorageCorruption(String),

    #[error("{0}")]
    Other(String),
}

impl ClawError {
    /// Stable machine-readable reason string, the form spec.md §7 says a
    /// locally-submitted event's rejection surfaces to the submitter
    /// (e.g. `insufficient_balance`, `resource_conflict`, `invalid_nonce`).
    pub fn reason(&self) -> &'static str {
        match self {
            ClawError::UnknownEventType(_) => "unknown_event_type",
            ClawError::MissingField(_) => "missing_field",
            ClawError::TypeMismatch(_) => "type_mismatch",
            ClawError::SizeExceeded { .. } => "size_exceeded",
            ClawError::MalformedValue(_) => "malformed_value",
            ClawError::UnknownVersion(_) => "unknown_version",
            ClawError::SignatureInvalid => "signature_invalid",
            ClawError::KeyMismatch => "key_mismatch",
            ClawError::Unauthorized { .. } => "unauthorized",
            ClawError::Replay { .. } => "replay",
            ClawError::NonceWindowExceeded { .. } => "invalid_nonce",
            ClawError::ResourceConflict { .. } => "resource_conflict",
            ClawError::InsufficientBalance { .. } => "insufficient_balance",
            ClawError::UnknownDid(_) => "unknown_did",
            ClawError::DidRevoked(_) => "did_revoked",
            ClawError::InvalidEscrowState { .. } => "invalid_escrow_state",
            ClawError::ResourceNotFound(_) => "resource_not_found",
            ClawError::DocHashMismatch => "doc_hash_mismatch",
            ClawError::ZeroAmount => "zero_amount",
            ClawError::SelfTransfer => "self_transfer",
            ClawError::DanglingReference(_) => "dangling_reference",
            ClawError::ClockSkew { .. } => "clock_skew",
            ClawError::Buffered { .. } => "buffered",
            ClawError::RequestTimeout(_) => "request_timeout",
            ClawError::PeerUnreachable(_) => "peer_unreachable",
            ClawError::Storage(_) => "storage",
            ClawError::KeyLoad(_) => "key_load",
            ClawError::StorageCorruption(_) => "storage_corruption",
            ClawError::Other(_) => "other",
        }
    }

    /// True for errors that quarantine rather than reject outright.
    pub fn is_quarantine(&self) -> bool {
        matches!(self, ClawError::ClockSkew { .. } | ClawError::Buffered { .. })
    }

    /// True for errors the sync layer should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClawError::RequestTimeout(_) | ClawError::PeerUnreachable(_)
        )
    }

    /// True for errors that should abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClawError::Storage(_) | ClawError::KeyLoad(_) | ClawError::StorageCorruption(_)
        )
    }
}

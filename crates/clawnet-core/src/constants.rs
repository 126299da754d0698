//! Protocol constants enumerated in spec.md §3, §4.3, §4.7, §6.

/// Out-of-order tolerance per issuer (spec.md GLOSSARY).
pub const NONCE_WINDOW: u64 = 5;

/// DID authorized to issue `wallet.mint`/`wallet.burn`/`wallet.reward`/
/// `wallet.fee` events (spec.md §4.4: "gated by authorization rule, e.g.
/// issuer is the treasury DID"). Fixed at genesis for a given network.
pub const TREASURY_DID: &str = "did:claw:ztreasury0000000000000000000000000000000000000";

/// Envelope size ceiling (spec.md §3.1, §6).
pub const MAX_EVENT_BYTES: usize = 1_048_576;

/// Timestamp-skew quarantine threshold (spec.md §4.3, check 2).
pub const MAX_CLOCK_SKEW_MS: i64 = 10 * 60 * 1000;

/// Signing-bytes domain separation prefix (spec.md §4.1).
pub const EVENT_SIGNING_DOMAIN: &str = "clawtoken:event:v1:";

/// P2P envelope signing-bytes domain separation prefix (spec.md §4.6).
pub const P2P_SIGNING_DOMAIN: &str = "clawtoken:p2p:v1:";

/// Currently-supported protocol major version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default snapshot trigger: every N events (spec.md §4.7).
pub const DEFAULT_SNAPSHOT_MIN_EVENTS: u64 = 10_000;

/// Default snapshot trigger: every N milliseconds (spec.md §4.7).
pub const DEFAULT_SNAPSHOT_MIN_INTERVAL_MS: i64 = 60 * 60 * 1000;

/// Minimum distinct signatures required to accept an externally-sourced
/// snapshot (spec.md §3.5).
pub const DEFAULT_MIN_SNAPSHOT_SIGNATURES: usize = 1;

/// Snapshot chunk size (SPEC_FULL.md §12.6).
pub const DEFAULT_MAX_SNAPSHOT_CHUNK_BYTES: usize = 512 * 1024;

/// Snapshot total-size ceiling before a chunked transfer is rejected.
pub const DEFAULT_MAX_SNAPSHOT_TOTAL_BYTES: u64 = 256 * 1024 * 1024;

/// Default time-based finality threshold (spec.md §4.8).
pub const DEFAULT_FINALITY_TIME_MS: i64 = 30 * 60 * 1000;

/// Tiered peer-count finality thresholds, keyed by amount ceiling
/// (spec.md §4.8): amount <= tier.0 -> N = tier.1, last entry is the
/// no-amount/overflow default.
pub const DEFAULT_FINALITY_TIERS: [(u128, u32); 3] = [
    (100_000_000, 3),
    (1_000_000_000, 5),
    (u128::MAX, 7),
];

/// P2P topic names (spec.md §6), under the versioned prefix.
pub const TOPIC_PREFIX: &str = "/clawtoken/1.0.0";
pub const TOPIC_EVENTS: &str = "events";
pub const TOPIC_REQUESTS: &str = "requests";
pub const TOPIC_RESPONSES: &str = "responses";

/// Reputation EMA weight (SPEC_FULL.md §12.2): new = old + (delta-old)/8.
pub const REPUTATION_WEIGHT_NUM: i64 = 1;
pub const REPUTATION_WEIGHT_DEN: i64 = 8;
pub const REPUTATION_MIN: i64 = 0;
pub const REPUTATION_MAX: i64 = 1000;

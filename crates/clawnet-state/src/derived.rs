use serde::{Deserialize, Serialize};

use clawnet_core::types::{Address, Balance, Did, EventHash, Timestamp};

/// Balance-holding record (spec.md §3.3 "Accounts").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub balance: Balance,
}

/// Escrow lifecycle status (spec.md §4.5). Mirrors the shape of the
/// teacher's `TimeLockStatus` state machine one-for-one: a small closed sum
/// of terminal/non-terminal variants, each carrying only the data that
/// transition produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Active,
    Released { released_at: Timestamp },
    Refunded { refunded_at: Timestamp },
    Expired { expired_at: Timestamp },
    Disputed { disputed_at: Timestamp },
}

impl EscrowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscrowStatus::Released { .. } | EscrowStatus::Refunded { .. } | EscrowStatus::Expired { .. }
        )
    }
}

/// Escrow record (spec.md §3.3). `arbiter` resolves SPEC_FULL.md §12.1: an
/// opaque input, never elected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    pub id: String,
    pub depositor: Did,
    pub beneficiary: Did,
    pub arbiter: Option<Did>,
    pub amount: Balance,
    pub status: EscrowStatus,
    pub rules: serde_json::Value,
    pub expires_at: Option<Timestamp>,
    pub last_event_hash: EventHash,
}

/// DID registry record (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidRecord {
    pub did: Did,
    pub doc_hash: EventHash,
    pub active_public_key: Vec<u8>,
    pub revoked: bool,
}

/// A dimensioned reputation score, fixed-point per SPEC_FULL.md §12.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationScore {
    pub target: Did,
    pub dimension: String,
    pub score: i64,
}

/// Generic market/contract resource record: `market.listing.*`,
/// `market.order.*`, `market.bid.*`, and `contract.*` all chain through
/// `resourcePrev` (spec.md §4.4) without a protocol-level schema beyond
/// that; the reducer stores the latest accepted payload verbatim alongside
/// a tracked `status` string for the contract state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketResource {
    pub id: String,
    pub resource_type: String,
    pub status: String,
    pub data: serde_json::Value,
    pub last_event_hash: EventHash,
}

use clawnet_core::error::ClawError;
use clawnet_core::types::{Did, EventHash, Timestamp};
use serde_json::Value;

use crate::db::DerivedDb;
use crate::derived::{Escrow, EscrowStatus};
use crate::reducers::helpers::{opt_str_field, str_field, u128_field};
use crate::reducers::wallet;

fn authorized(issuer: &Did, allowed: &[&Option<Did>]) -> bool {
    allowed.iter().any(|d| d.as_ref() == Some(issuer))
}

fn load(db: &DerivedDb, id: &str) -> Result<Escrow, ClawError> {
    db.get_escrow(id)?.ok_or_else(|| ClawError::ResourceNotFound(id.to_string()))
}

fn state_name(status: &EscrowStatus) -> &'static str {
    match status {
        EscrowStatus::Active => "active",
        EscrowStatus::Released { .. } => "released",
        EscrowStatus::Refunded { .. } => "refunded",
        EscrowStatus::Expired { .. } => "expired",
        EscrowStatus::Disputed { .. } => "disputed",
    }
}

fn invalid_state(id: &str, status: &EscrowStatus) -> ClawError {
    ClawError::InvalidEscrowState {
        id: id.to_string(),
        state: state_name(status).to_string(),
    }
}

/// `wallet.escrow.create` + implicit fund (spec.md §4.5): initial state is
/// `active`. Funds move from the depositor's account into the escrow at
/// creation, matching "Initial: active on create + fund".
pub fn create(issuer: &Did, payload: &Value, event_hash: &EventHash, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?.to_string();
    if db.get_escrow(&id)?.is_some() {
        return Err(ClawError::ResourceConflict {
            resource: id,
            expected: "none".to_string(),
            got: "exists".to_string(),
        });
    }

    let beneficiary = Did(str_field(payload, "beneficiary")?.to_string());
    let amount = u128_field(payload, "amount")?;
    if amount == 0 {
        return Err(ClawError::ZeroAmount);
    }
    let arbiter = opt_str_field(payload, "arbiter").map(|s| Did(s.to_string()));
    let expires_at = payload.get("expiresAt").and_then(|v| v.as_i64());

    wallet::transfer(
        &serde_json::json!({
            "from": issuer.as_str(),
            "to": format!("escrow:{id}"),
            "amount": amount.to_string(),
        }),
        db,
    )?;

    db.put_escrow(&Escrow {
        id,
        depositor: issuer.clone(),
        beneficiary,
        arbiter,
        amount,
        status: EscrowStatus::Active,
        rules: payload.get("rules").cloned().unwrap_or(Value::Null),
        expires_at,
        last_event_hash: *event_hash,
    })
}

/// `wallet.escrow.release` (spec.md §4.5): `{active, disputed}` -> `released`.
/// Authorized by depositor or arbiter.
pub fn release(issuer: &Did, payload: &Value, event_hash: &EventHash, now: Timestamp, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?;
    let mut escrow = load(db, id)?;
    if !matches!(escrow.status, EscrowStatus::Active | EscrowStatus::Disputed { .. }) {
        return Err(invalid_state(id, &escrow.status));
    }
    if !authorized(issuer, &[&Some(escrow.depositor.clone()), &escrow.arbiter]) {
        return Err(ClawError::Unauthorized {
            issuer: issuer.to_string(),
            action: "wallet.escrow.release".to_string(),
        });
    }

    wallet::transfer(
        &serde_json::json!({
            "from": format!("escrow:{id}"),
            "to": escrow.beneficiary.as_str(),
            "amount": escrow.amount.to_string(),
        }),
        db,
    )?;

    escrow.status = EscrowStatus::Released { released_at: now };
    escrow.last_event_hash = *event_hash;
    db.put_escrow(&escrow)
}

/// `wallet.escrow.refund` (spec.md §4.5): `{active, disputed}` -> `refunded`.
/// Authorized by beneficiary or arbiter.
pub fn refund(issuer: &Did, payload: &Value, event_hash: &EventHash, now: Timestamp, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?;
    let mut escrow = load(db, id)?;
    if !matches!(escrow.status, EscrowStatus::Active | EscrowStatus::Disputed { .. }) {
        return Err(invalid_state(id, &escrow.status));
    }
    if !authorized(issuer, &[&Some(escrow.beneficiary.clone()), &escrow.arbiter]) {
        return Err(ClawError::Unauthorized {
            issuer: issuer.to_string(),
            action: "wallet.escrow.refund".to_string(),
        });
    }

    wallet::transfer(
        &serde_json::json!({
            "from": format!("escrow:{id}"),
            "to": escrow.depositor.as_str(),
            "amount": escrow.amount.to_string(),
        }),
        db,
    )?;

    escrow.status = EscrowStatus::Refunded { refunded_at: now };
    escrow.last_event_hash = *event_hash;
    db.put_escrow(&escrow)
}

/// `wallet.escrow.expire` (spec.md §4.5): `{active}` -> `refunded`, payer
/// recovers, conditioned on `now >= expiresAt`. Authorized: anyone, after
/// the deadline.
pub fn expire(payload: &Value, event_hash: &EventHash, now: Timestamp, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?;
    let mut escrow = load(db, id)?;
    if !matches!(escrow.status, EscrowStatus::Active) {
        return Err(invalid_state(id, &escrow.status));
    }
    let expires_at = escrow
        .expires_at
        .ok_or_else(|| ClawError::InvalidEscrowState { id: id.to_string(), state: "no expiry set".to_string() })?;
    if now < expires_at {
        return Err(ClawError::InvalidEscrowState {
            id: id.to_string(),
            state: "not yet expired".to_string(),
        });
    }

    wallet::transfer(
        &serde_json::json!({
            "from": format!("escrow:{id}"),
            "to": escrow.depositor.as_str(),
            "amount": escrow.amount.to_string(),
        }),
        db,
    )?;

    escrow.status = EscrowStatus::Expired { expired_at: now };
    escrow.last_event_hash = *event_hash;
    db.put_escrow(&escrow)
}

/// `wallet.escrow.dispute` (spec.md §4.5): `{active}` -> `disputed`.
/// Authorized by depositor or beneficiary.
pub fn dispute(issuer: &Did, payload: &Value, event_hash: &EventHash, now: Timestamp, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?;
    let mut escrow = load(db, id)?;
    if !matches!(escrow.status, EscrowStatus::Active) {
        return Err(invalid_state(id, &escrow.status));
    }
    if !authorized(issuer, &[&Some(escrow.depositor.clone()), &Some(escrow.beneficiary.clone())]) {
        return Err(ClawError::Unauthorized {
            issuer: issuer.to_string(),
            action: "wallet.escrow.dispute".to_string(),
        });
    }

    escrow.status = EscrowStatus::Disputed { disputed_at: now };
    escrow.last_event_hash = *event_hash;
    db.put_escrow(&escrow)
}

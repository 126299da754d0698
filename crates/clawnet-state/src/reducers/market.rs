use clawnet_core::error::ClawError;
use clawnet_core::types::EventHash;
use serde_json::Value;

use crate::db::DerivedDb;
use crate::derived::MarketResource;
use crate::reducers::helpers::{opt_str_field, str_field};

/// Allowed `contract.*` status transitions (spec.md §4.4): draft -> signed
/// -> active -> milestone (self-loop) -> {completed, disputed}; disputed ->
/// terminated. `milestone` does not change status.
fn contract_transition(current: &str, event_suffix: &str) -> Option<&'static str> {
    match (current, event_suffix) {
        ("draft", "sign") => Some("signed"),
        ("signed", "activate") => Some("active"),
        ("active", "milestone") => Some("active"),
        ("active", "complete") => Some("completed"),
        ("active", "dispute") => Some("disputed"),
        ("disputed", "escalate") => Some("disputed"),
        ("disputed", "terminate") => Some("terminated"),
        ("disputed", "complete") => Some("completed"),
        _ => None,
    }
}

/// Generic handler for `market.listing.*`, `market.order.*`, and
/// `market.bid.*`: these chain through `resourcePrev` (spec.md §4.4) without
/// a fixed schema beyond the chain pointer, so the reducer just checks the
/// pointer and stores the new payload verbatim.
pub fn generic_resource(resource_type: &str, payload: &Value, event_hash: &EventHash, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?.to_string();
    let existing = db.get_resource(&id)?;

    check_resource_prev(payload, existing.as_ref(), &id)?;

    db.put_resource(&MarketResource {
        id,
        resource_type: resource_type.to_string(),
        status: str_field(payload, "status").unwrap_or("active").to_string(),
        data: payload.clone(),
        last_event_hash: *event_hash,
    })
}

/// `contract.*` (spec.md §4.4): draft -> signed -> active -> milestone ->
/// {completed, disputed} -> terminated, gated by the transition table above.
pub fn contract(event_suffix: &str, payload: &Value, event_hash: &EventHash, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?.to_string();
    let existing = db.get_resource(&id)?;

    if event_suffix == "draft" {
        if existing.is_some() {
            return Err(ClawError::ResourceConflict {
                resource: id,
                expected: "none".to_string(),
                got: "exists".to_string(),
            });
        }
        return db.put_resource(&MarketResource {
            id,
            resource_type: "contract".to_string(),
            status: "draft".to_string(),
            data: payload.clone(),
            last_event_hash: *event_hash,
        });
    }

    let mut resource = existing.ok_or_else(|| ClawError::ResourceNotFound(id.clone()))?;
    check_resource_prev(payload, Some(&resource), &id)?;

    let next = contract_transition(&resource.status, event_suffix).ok_or_else(|| ClawError::InvalidEscrowState {
        id: id.clone(),
        state: resource.status.clone(),
    })?;

    resource.status = next.to_string();
    resource.data = payload.clone();
    resource.last_event_hash = *event_hash;
    db.put_resource(&resource)
}

/// `market.dispute.*` (spec.md §4.4): shares the `contract.*` state machine
/// rather than being a generic catch-all — a dispute is a status transition
/// on the underlying contract resource, not an independently-schemed record.
/// `open` and `escalate` map straight onto `contract_transition`'s
/// `dispute`/`escalate` suffixes; `resolve` carries its target status in
/// `payload.outcome` (`complete` or `terminate`).
pub fn dispute(event_suffix: &str, payload: &Value, event_hash: &EventHash, db: &DerivedDb) -> Result<(), ClawError> {
    let id = str_field(payload, "resourceId")?.to_string();
    let mut resource = db.get_resource(&id)?.ok_or_else(|| ClawError::ResourceNotFound(id.clone()))?;
    check_resource_prev(payload, Some(&resource), &id)?;

    let transition_suffix = match event_suffix {
        "open" => "dispute",
        "resolve" => match str_field(payload, "outcome")? {
            "complete" => "complete",
            "terminate" => "terminate",
            _ => return Err(ClawError::TypeMismatch("outcome")),
        },
        other => other,
    };

    let next = contract_transition(&resource.status, transition_suffix).ok_or_else(|| ClawError::InvalidEscrowState {
        id: id.clone(),
        state: resource.status.clone(),
    })?;

    resource.status = next.to_string();
    resource.data = payload.clone();
    resource.last_event_hash = *event_hash;
    db.put_resource(&resource)
}

fn check_resource_prev(payload: &Value, existing: Option<&MarketResource>, id: &str) -> Result<(), ClawError> {
    let claimed_prev = opt_str_field(payload, "resourcePrev");
    match (existing, claimed_prev) {
        (None, None) => Ok(()),
        (None, Some(prev)) => Err(ClawError::ResourceConflict {
            resource: id.to_string(),
            expected: "none".to_string(),
            got: prev.to_string(),
        }),
        (Some(res), None) => Err(ClawError::ResourceConflict {
            resource: id.to_string(),
            expected: res.last_event_hash.to_hex(),
            got: "none".to_string(),
        }),
        (Some(res), Some(prev)) => {
            if res.last_event_hash.to_hex() != prev {
                return Err(ClawError::ResourceConflict {
                    resource: id.to_string(),
                    expected: res.last_event_hash.to_hex(),
                    got: prev.to_string(),
                });
            }
            Ok(())
        }
    }
}

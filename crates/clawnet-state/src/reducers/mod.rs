pub mod escrow;
pub mod helpers;
pub mod identity;
pub mod market;
pub mod reputation;
pub mod wallet;

use clawnet_core::envelope::EventEnvelope;
use clawnet_core::error::ClawError;
use clawnet_core::types::{EventHash, Timestamp};
use clawnet_store::EventStore;

use crate::db::DerivedDb;

/// Dispatches on `event.event_type` to the reducer that implements it
/// (spec.md §4.4 catalog). This is the "apply" half of the validation
/// pipeline's combined check-then-mutate step (spec.md §4.3, step 9);
/// preconditions live inside each reducer rather than in a separate pass,
/// matching the teacher's `chronx-state::engine::apply` shape.
pub fn apply(event: &EventEnvelope, event_hash: &EventHash, now: Timestamp, events: &EventStore, db: &DerivedDb) -> Result<(), ClawError> {
    match event.event_type.as_str() {
        "identity.create" => identity::create(&event.issuer, &event.payload, event_hash, db),
        "identity.update" => identity::update(&event.issuer, &event.payload, event_hash, db),

        "wallet.transfer" => wallet::transfer(&event.payload, db),
        "wallet.mint" => wallet::mint(&event.issuer, &event.payload, db),
        "wallet.burn" => wallet::burn(&event.issuer, &event.payload, db),
        "wallet.reward" => wallet::reward(&event.issuer, &event.payload, db),
        "wallet.fee" => wallet::fee(&event.issuer, &event.payload, db),

        "wallet.escrow.create" => escrow::create(&event.issuer, &event.payload, event_hash, db),
        "wallet.escrow.release" => escrow::release(&event.issuer, &event.payload, event_hash, now, db),
        "wallet.escrow.refund" => escrow::refund(&event.issuer, &event.payload, event_hash, now, db),
        "wallet.escrow.expire" => escrow::expire(&event.payload, event_hash, now, db),
        "wallet.escrow.dispute" => escrow::dispute(&event.issuer, &event.payload, event_hash, now, db),

        "reputation.record" => reputation::record(&event.payload, events, db),

        "contract.draft" => market::contract("draft", &event.payload, event_hash, db),
        "contract.sign" => market::contract("sign", &event.payload, event_hash, db),
        "contract.activate" => market::contract("activate", &event.payload, event_hash, db),
        "contract.milestone" => market::contract("milestone", &event.payload, event_hash, db),
        "contract.complete" => market::contract("complete", &event.payload, event_hash, db),
        "contract.dispute" => market::contract("dispute", &event.payload, event_hash, db),
        "contract.terminate" => market::contract("terminate", &event.payload, event_hash, db),

        "market.dispute.open" => market::dispute("open", &event.payload, event_hash, db),
        "market.dispute.escalate" => market::dispute("escalate", &event.payload, event_hash, db),
        "market.dispute.resolve" => market::dispute("resolve", &event.payload, event_hash, db),

        t if t.starts_with("market.") => market::generic_resource(t, &event.payload, event_hash, db),

        other => Err(ClawError::UnknownEventType(other.to_string())),
    }
}

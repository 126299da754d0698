pub mod event_store;

pub use event_store::{AppendOutcome, EventStore};

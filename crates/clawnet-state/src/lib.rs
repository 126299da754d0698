pub mod db;
pub mod derived;
pub mod engine;
pub mod reducers;

pub use db::DerivedDb;
pub use derived::{Account, DidRecord, Escrow, EscrowStatus, MarketResource, ReputationScore};
pub use engine::StateEngine;

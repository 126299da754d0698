pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod types;

pub use config::NodeConfig;
pub use envelope::{EventEnvelope, P2pEnvelope};
pub use error::ClawError;
pub use types::*;

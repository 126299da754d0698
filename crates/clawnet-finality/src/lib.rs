pub mod tracker;

pub use tracker::{FinalityStatus, FinalityTracker};

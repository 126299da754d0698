pub mod fork;
pub mod pipeline;

pub use fork::{resolve_fork, tie_break_wins};
pub use pipeline::{Outcome, ValidationPipeline};

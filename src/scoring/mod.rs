pub mod engine;
pub mod finality;
pub mod tally;
pub mod winners;

pub use engine::{ComputeEngine, ComputeError, WeekOutcome};

pub mod draft;
pub mod runner;

pub use draft::{Draft, DraftError, LoadOutcome};
pub use runner::{Runner, RunnerError};

pub mod runner;

pub use runner::{BatchFailure, BatchOutcome, GatePipeline};

pub mod engine;
pub mod trivy;
pub mod executor;

pub use engine::{ScanEngine, TrivyConfig, TrivyEngine};
pub use executor::ScanExecutor;

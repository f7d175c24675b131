pub mod types;
pub mod classification;
pub mod retry;

pub use types::GateError;
pub use classification::ErrorClassification;
pub use retry::{RetryDecision, RetryPolicy, RetryState, with_retry};

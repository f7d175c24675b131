pub mod policy;
pub mod checker;

pub use policy::{ScopeOverride, SeverityPolicy};
pub use checker::evaluate;

pub mod rules;
pub mod manager;

pub use rules::{load_rules, validate_rules, ExceptionRule};
pub use manager::{filter, FilteredScan, SuppressedFinding};

pub mod commands;
pub mod gate;
pub mod rescan;
pub mod schedule;
pub mod exceptions;

pub use commands::{Cli, Commands};

pub mod cli;
pub mod config;
pub mod errors;
pub mod exceptions;
pub mod models;
pub mod pipeline;
pub mod reporting;
pub mod scanner;
pub mod schedule;
pub mod threshold;

pub mod formatter;
pub mod writer;

pub use formatter::{format_gate_line, format_report_markdown, severity_summary};
pub use writer::write_report;

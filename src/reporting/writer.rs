use std::path::Path;

use tracing::info;

use crate::errors::GateError;
use crate::models::GateReport;

use super::formatter::format_report_markdown;

/// Persist a gate report in the requested format. JSON is the lossless
/// canonical form the downstream collaborators consume.
pub async fn write_report(
    report: &GateReport,
    path: &Path,
    format: &str,
) -> Result<(), GateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let content = match format {
        "markdown" => format_report_markdown(report),
        "json" => serde_json::to_string_pretty(report)?,
        other => {
            return Err(GateError::Config(format!(
                "Unsupported output format: {}",
                other
            )))
        }
    };

    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), format = format, "Report written");
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::config::DEFAULT_MAX_PARALLEL;
use crate::errors::GateError;
use crate::models::GateStatus;
use crate::reporting;

use super::commands::RescanArgs;
use super::gate::{build_pipeline, load_config, open_scheduler, resolve_report_dir};

/// Summary of a rescan cycle, for exit-code mapping.
pub struct RescanSummary {
    pub passed: usize,
    pub failed_verdicts: usize,
    pub scan_errors: usize,
    pub skipped: usize,
}

pub async fn handle_rescan(args: RescanArgs) -> Result<RescanSummary, GateError> {
    let config = load_config(args.config.as_deref()).await?;
    let scheduler = Arc::new(open_scheduler(&config)?);
    let pipeline = build_pipeline(&config)?;

    let now = Utc::now();
    let entries = if args.all {
        scheduler.store().list()?
    } else {
        scheduler.due(now, None)?
    };

    if entries.is_empty() {
        println!("No images due for rescan");
        return Ok(RescanSummary {
            passed: 0,
            failed_verdicts: 0,
            scan_errors: 0,
            skipped: 0,
        });
    }
    info!(count = entries.len(), all = args.all, "Starting rescan cycle");

    let rescan_config = config.rescan.clone().unwrap_or_default();
    let max_parallel = args
        .max_parallel
        .or(rescan_config.max_parallel)
        .unwrap_or(DEFAULT_MAX_PARALLEL);
    let deadline = args
        .deadline_secs
        .or(rescan_config.deadline_secs)
        .map(Duration::from_secs);

    let outcome = pipeline
        .run_batch(entries, scheduler.clone(), max_parallel, deadline)
        .await;

    let output_dir = resolve_report_dir(args.output.as_deref(), &config, "./rescan-reports");
    let mut passed = 0usize;
    let mut failed_verdicts = 0usize;
    for report in &outcome.reports {
        match report.verdict.status {
            GateStatus::Pass => passed += 1,
            GateStatus::Fail => failed_verdicts += 1,
        }
        println!("{}", reporting::format_gate_line(report));

        let file_name = format!("{}.json", sanitize(&report.digest));
        reporting::write_report(report, &output_dir.join(file_name), "json").await?;
    }
    for failure in &outcome.failures {
        println!("ERROR {}: {}", failure.image, failure.error);
    }
    for digest in &outcome.skipped {
        println!("SKIPPED {} (deadline elapsed)", digest);
    }

    Ok(RescanSummary {
        passed,
        failed_verdicts,
        scan_errors: outcome.failures.len(),
        skipped: outcome.skipped.len(),
    })
}

fn sanitize(digest: &str) -> String {
    digest
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_digest_for_filenames() {
        assert_eq!(sanitize("sha256:ab/cd"), "sha256_ab_cd");
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{self, GateConfig};
use crate::errors::GateError;
use crate::exceptions;
use crate::models::{GateReport, GateStatus};
use crate::pipeline::GatePipeline;
use crate::reporting;
use crate::scanner::{ScanExecutor, TrivyEngine};
use crate::schedule::{RescanOutcome, RescanScheduler, SqliteStore};

use super::commands::GateArgs;

pub async fn handle_gate(args: GateArgs) -> Result<GateStatus, GateError> {
    info!(image = %args.image, "Starting vulnerability gate");

    let config = load_config(args.config.as_deref()).await?;
    let pipeline = build_pipeline(&config)?;

    let report = pipeline.run_image(&args.image).await?;

    let format = args
        .format
        .clone()
        .or_else(|| config.output.as_ref().and_then(|o| o.format.clone()))
        .unwrap_or_else(|| "json".to_string());
    let report_path = match args.output.as_deref() {
        Some(path) => PathBuf::from(path),
        None => resolve_report_dir(None, &config, ".").join("gate-report.json"),
    };
    reporting::write_report(&report, &report_path, &format).await?;

    info!(
        image = %args.image,
        verdict = ?report.verdict.status,
        findings = %reporting::severity_summary(&report),
        "Gate run complete"
    );

    println!("{}", reporting::format_gate_line(&report));
    for violation in &report.verdict.violations {
        println!(
            "  - {}: {} vulnerabilities (max allowed: {})",
            violation.severity, violation.observed, violation.max_allowed
        );
    }

    if !args.no_track {
        track_scan(&config, &report);
    }

    Ok(report.verdict.status)
}

pub(crate) async fn load_config(path: Option<&str>) -> Result<GateConfig, GateError> {
    match path {
        Some(path) => config::parse_config(&PathBuf::from(path)).await,
        None => Ok(GateConfig::default()),
    }
}

pub(crate) fn build_pipeline(config: &GateConfig) -> Result<GatePipeline, GateError> {
    let scanner_config = config.scanner.clone().unwrap_or_default();

    let engine = Arc::new(TrivyEngine::new(scanner_config.trivy_config()));
    let executor = Arc::new(ScanExecutor::new(engine, scanner_config.retry_policy()));

    let rules = match &config.exceptions {
        Some(exceptions_config) => exceptions::load_rules(&exceptions_config.file)?,
        None => Vec::new(),
    };
    let policy = config.thresholds.clone().unwrap_or_default();

    Ok(GatePipeline::new(executor, rules, policy))
}

/// Directory reports land in when the CLI does not name one: the configured
/// output directory, then `default_dir`.
pub(crate) fn resolve_report_dir(
    cli_dir: Option<&str>,
    config: &GateConfig,
    default_dir: &str,
) -> PathBuf {
    cli_dir
        .map(PathBuf::from)
        .or_else(|| config.output.as_ref().and_then(|o| o.directory.clone()))
        .unwrap_or_else(|| PathBuf::from(default_dir))
}

pub(crate) fn open_scheduler(config: &GateConfig) -> Result<RescanScheduler, GateError> {
    let rescan = config.rescan.clone().unwrap_or_default();
    let store = SqliteStore::new(&rescan.store_path_or_default())?;
    Ok(RescanScheduler::new(
        Arc::new(store),
        rescan.default_interval(),
    ))
}

/// Register the scanned digest and record the outcome. A persistence
/// failure is reported but never fails a gate run that already has its
/// verdict.
fn track_scan(config: &GateConfig, report: &GateReport) {
    let scheduler = match open_scheduler(config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            warn!(error = %e, "Rescan store unavailable, skipping schedule update");
            return;
        }
    };

    if let Err(e) = scheduler.register(&report.digest, &report.image, None) {
        warn!(error = %e, "Failed to register image for rescans");
        return;
    }
    let outcome = match report.verdict.status {
        GateStatus::Pass => RescanOutcome::Pass,
        GateStatus::Fail => RescanOutcome::Fail,
    };
    scheduler.record_outcome_best_effort(&report.digest, report.scanned_at, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;

    fn config_with_directory(dir: &str) -> GateConfig {
        GateConfig {
            output: Some(OutputConfig {
                directory: Some(PathBuf::from(dir)),
                format: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_output_path_wins_over_config() {
        let config = config_with_directory("/reports");
        assert_eq!(
            resolve_report_dir(Some("/tmp/out"), &config, "."),
            PathBuf::from("/tmp/out")
        );
    }

    #[test]
    fn test_configured_directory_is_default_report_home() {
        let config = config_with_directory("/reports");
        assert_eq!(
            resolve_report_dir(None, &config, "."),
            PathBuf::from("/reports")
        );
    }

    #[test]
    fn test_fallback_directory_without_config() {
        assert_eq!(
            resolve_report_dir(None, &GateConfig::default(), "./rescan-reports"),
            PathBuf::from("./rescan-reports")
        );
    }
}

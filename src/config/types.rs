use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::RetryPolicy;
use crate::scanner::TrivyConfig;
use crate::threshold::SeverityPolicy;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GateConfig {
    pub scanner: Option<ScannerConfig>,
    pub exceptions: Option<ExceptionsConfig>,
    pub thresholds: Option<SeverityPolicy>,
    pub rescan: Option<RescanConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScannerConfig {
    /// Scan engine binary; a bare name resolves via PATH.
    pub binary: Option<String>,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Total engine attempts, including the first.
    pub max_attempts: Option<u32>,
    pub backoff_base_secs: Option<u64>,
    pub backoff_max_secs: Option<u64>,
    pub jitter: Option<bool>,
    /// Severity levels to request from the engine, uppercase.
    pub severities: Option<Vec<String>>,
    pub ignore_unfixed: Option<bool>,
}

impl ScannerConfig {
    pub fn trivy_config(&self) -> TrivyConfig {
        let defaults = TrivyConfig::default();
        TrivyConfig {
            binary: self.binary.clone().unwrap_or(defaults.binary),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            severities: self.severities.clone().unwrap_or(defaults.severities),
            ignore_unfixed: self.ignore_unfixed.unwrap_or(defaults.ignore_unfixed),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self
                .backoff_base_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.base_delay),
            max_delay: self
                .backoff_max_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_delay),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExceptionsConfig {
    /// Path to the YAML allowlist file. Missing file means no exceptions.
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RescanConfig {
    /// SQLite file holding the rescan entries.
    pub store_path: Option<PathBuf>,
    pub default_interval_hours: Option<u64>,
    /// Cap on concurrent engine invocations in a batch rescan.
    pub max_parallel: Option<usize>,
    /// Wall-clock bound for a whole batch; pending scans are skipped once
    /// it elapses.
    pub deadline_secs: Option<u64>,
}

pub const DEFAULT_RESCAN_INTERVAL_HOURS: u64 = 24;
pub const DEFAULT_MAX_PARALLEL: usize = 4;

impl RescanConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(
            self.default_interval_hours
                .unwrap_or(DEFAULT_RESCAN_INTERVAL_HOURS)
                * 3600,
        )
    }

    pub fn store_path_or_default(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("./vulngate/rescan.db"))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
    /// "json" or "markdown".
    pub format: Option<String>,
}

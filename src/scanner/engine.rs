use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::GateError;
use crate::models::EngineInfo;

/// One attempt against the external scan engine. Implementations perform a
/// single invocation per call; retry is the executor's job.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Run one scan of `image` and return the engine's raw structured output.
    async fn scan(&self, image: &str) -> Result<String, GateError>;

    /// Engine identity and vulnerability-database metadata for report
    /// headers. Probed best-effort; failures degrade to "unknown".
    async fn info(&self) -> EngineInfo;
}

/// Invocation settings for the Trivy engine.
#[derive(Debug, Clone)]
pub struct TrivyConfig {
    /// Binary to invoke; a bare name resolves via PATH.
    pub binary: String,
    /// Wall-clock bound for one scan attempt.
    pub timeout: Duration,
    /// Severity levels requested from the engine, uppercase.
    pub severities: Vec<String>,
    /// Skip findings with no fixed version available.
    pub ignore_unfixed: bool,
}

impl Default for TrivyConfig {
    fn default() -> Self {
        Self {
            binary: "trivy".to_string(),
            timeout: Duration::from_secs(300),
            severities: ["UNKNOWN", "LOW", "MEDIUM", "HIGH", "CRITICAL"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_unfixed: false,
        }
    }
}

/// Trivy invoked as a subprocess, `trivy image --format json`.
pub struct TrivyEngine {
    config: TrivyConfig,
}

impl TrivyEngine {
    pub fn new(config: TrivyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScanEngine for TrivyEngine {
    async fn scan(&self, image: &str) -> Result<String, GateError> {
        info!(image = %image, "Invoking trivy scan");

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("image")
            .args(["--format", "json"])
            .args(["--severity", &self.config.severities.join(",")])
            .arg("--quiet");
        if self.config.ignore_unfixed {
            cmd.arg("--ignore-unfixed");
        }
        cmd.arg(image);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| {
                GateError::Timeout(format!(
                    "Scan of {} timed out after {}s",
                    image,
                    self.config.timeout.as_secs()
                ))
            })?
            .map_err(|e| spawn_error(&self.config.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(image = %image, status = ?output.status.code(), "Trivy exited nonzero");
            return Err(classify_engine_failure(image, &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn info(&self) -> EngineInfo {
        let result = Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .await;
        let raw = match result {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            _ => String::new(),
        };
        let (version, db_updated_at) = parse_version_output(&raw);
        EngineInfo {
            name: "trivy".to_string(),
            version,
            db_updated_at,
        }
    }
}

/// Parse `trivy --version` output: the engine version from the first line
/// and the vulnerability database's `UpdatedAt` timestamp when present.
pub(crate) fn parse_version_output(raw: &str) -> (String, Option<DateTime<Utc>>) {
    let version = raw
        .lines()
        .next()
        .map(|line| line.trim().trim_start_matches("Version: ").to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    // The first UpdatedAt line belongs to the vulnerability DB section
    let db_updated_at = raw
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("UpdatedAt: "))
        .and_then(parse_db_timestamp);

    (version, db_updated_at)
}

/// Trivy prints Go's timestamp format, e.g.
/// "2026-08-29 12:07:04.1538755 +0000 UTC".
fn parse_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim().trim_end_matches(" UTC");
    DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn spawn_error(binary: &str, e: std::io::Error) -> GateError {
    if e.kind() == std::io::ErrorKind::NotFound {
        // Missing binary will not appear between attempts
        GateError::Config(format!("Scan engine binary not found: {}", binary))
    } else {
        GateError::EngineUnavailable(format!("Failed to launch {}: {}", binary, e))
    }
}

/// Map a failed engine invocation to the error taxonomy by inspecting the
/// engine's stderr. Bad input and auth failures are fatal; registry and
/// database hiccups are transient.
pub(crate) fn classify_engine_failure(image: &str, stderr: &str) -> GateError {
    let lower = stderr.to_ascii_lowercase();

    if lower.contains("unauthorized")
        || lower.contains("authentication required")
        || lower.contains("denied")
    {
        return GateError::EngineAuth(format!("Registry rejected {}: {}", image, stderr.trim()));
    }
    if lower.contains("manifest unknown")
        || lower.contains("not found")
        || lower.contains("invalid reference")
        || lower.contains("unable to parse the image name")
    {
        return GateError::InvalidImage(format!("{}: {}", image, stderr.trim()));
    }
    if lower.contains("toomanyrequests") || lower.contains("rate limit") {
        return GateError::RateLimit(stderr.trim().to_string());
    }
    if lower.contains("timeout") || lower.contains("deadline exceeded") {
        return GateError::Timeout(stderr.trim().to_string());
    }
    if lower.contains("connection")
        || lower.contains("tls")
        || lower.contains("temporarily unavailable")
        || lower.contains("no such host")
    {
        return GateError::Network(stderr.trim().to_string());
    }

    // Unrecognized engine failures default to transient, matching the
    // classification table's bias for infrastructure errors.
    GateError::EngineUnavailable(format!(
        "Scan of {} failed: {}",
        image,
        stderr.trim()
    ))
}

//! Normalization of Trivy's JSON report format into the finding model.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::GateError;
use crate::models::{EngineInfo, Finding, ScanResult, Severity};

#[derive(Debug, Deserialize)]
pub struct TrivyReport {
    #[serde(rename = "Metadata", default)]
    pub metadata: Option<TrivyMetadata>,
    #[serde(rename = "Results", default)]
    pub results: Vec<TrivyResult>,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TrivyMetadata {
    #[serde(rename = "ImageID", default)]
    pub image_id: Option<String>,
    #[serde(rename = "RepoDigests", default)]
    pub repo_digests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrivyResult {
    #[serde(rename = "Target", default)]
    pub target: String,
    #[serde(rename = "Vulnerabilities", default)]
    pub vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Deserialize)]
pub struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    pub vulnerability_id: String,
    #[serde(rename = "PkgName", default)]
    pub pkg_name: String,
    #[serde(rename = "InstalledVersion", default)]
    pub installed_version: String,
    #[serde(rename = "FixedVersion")]
    pub fixed_version: Option<String>,
    #[serde(rename = "Severity", default)]
    pub severity: String,
    #[serde(rename = "SeveritySource")]
    pub severity_source: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
}

/// Parse raw engine output and normalize it into a `ScanResult`.
///
/// A parse failure is fatal: re-running the scan will not make malformed
/// output well-formed.
pub fn parse_report(
    image: &str,
    raw: &str,
    engine: EngineInfo,
) -> Result<ScanResult, GateError> {
    let report: TrivyReport = serde_json::from_str(raw)
        .map_err(|e| GateError::EngineOutput(format!("Unparseable trivy report: {}", e)))?;

    let digest = resolve_digest(image, report.metadata.as_ref());

    let mut findings = Vec::new();
    for result in &report.results {
        for vuln in &result.vulnerabilities {
            findings.push(Finding {
                id: vuln.vulnerability_id.clone(),
                package: vuln.pkg_name.clone(),
                installed_version: vuln.installed_version.clone(),
                fixed_version: vuln.fixed_version.clone(),
                // Unknown severity strings degrade to Unknown, never fail
                severity: vuln.severity.parse::<Severity>().unwrap_or(Severity::Unknown),
                source: vuln
                    .severity_source
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                title: vuln.title.clone(),
                description: vuln.description.as_ref().map(|d| truncate(d, 200)),
            });
        }
    }

    Ok(ScanResult {
        image: image.to_string(),
        digest,
        scanned_at: report.created_at.unwrap_or_else(Utc::now),
        findings,
        engine,
    })
}

/// Digest precedence: RepoDigests (the content-addressed registry identity),
/// then ImageID, then the image reference itself as a last resort so the
/// scheduler still has a stable key.
fn resolve_digest(image: &str, metadata: Option<&TrivyMetadata>) -> String {
    if let Some(meta) = metadata {
        if let Some(repo_digest) = meta.repo_digests.first() {
            return repo_digest
                .rsplit_once('@')
                .map(|(_, digest)| digest.to_string())
                .unwrap_or_else(|| repo_digest.clone());
        }
        if let Some(image_id) = &meta.image_id {
            return image_id.clone();
        }
    }
    image.to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::finding::{Finding, Severity};

/// Metadata about the scan engine that produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Engine name, e.g. "trivy".
    pub name: String,
    /// Engine version string as reported by the engine itself.
    pub version: String,
    /// When the engine's vulnerability database was last updated, if known.
    pub db_updated_at: Option<DateTime<Utc>>,
}

/// The result of one scan invocation against one image.
///
/// Constructed only by the scan executor; every downstream stage consumes it
/// read-only. A result with zero findings is valid and distinct from a
/// failed scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Image reference the scan was requested for, e.g. "nginx:1.27".
    pub image: String,
    /// Content-addressed image digest, e.g. "sha256:abc...". Used as the
    /// identity for rescan scheduling and dedup.
    pub digest: String,
    pub scanned_at: DateTime<Utc>,
    /// Findings in the order the engine reported them.
    pub findings: Vec<Finding>,
    pub engine: EngineInfo,
}

impl ScanResult {
    /// Returns a map of severity level to the count of findings at that severity.
    pub fn severity_counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for finding in &self.findings {
            *counts.entry(finding.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_findings(&self) -> usize {
        self.findings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            package: "openssl".to_string(),
            installed_version: "3.0.1".to_string(),
            fixed_version: Some("3.0.2".to_string()),
            severity,
            source: "nvd".to_string(),
            title: None,
            description: None,
        }
    }

    #[test]
    fn test_severity_counts() {
        let result = ScanResult {
            image: "nginx:1.27".to_string(),
            digest: "sha256:abc".to_string(),
            scanned_at: Utc::now(),
            findings: vec![
                finding("CVE-2024-0001", Severity::Critical),
                finding("CVE-2024-0002", Severity::High),
                finding("CVE-2024-0003", Severity::High),
            ],
            engine: EngineInfo {
                name: "trivy".to_string(),
                version: "0.55.0".to_string(),
                db_updated_at: None,
            },
        };

        let counts = result.severity_counts();
        assert_eq!(counts.get(&Severity::Critical), Some(&1));
        assert_eq!(counts.get(&Severity::High), Some(&2));
        assert_eq!(counts.get(&Severity::Low), None);
        assert_eq!(result.total_findings(), 3);
    }

    #[test]
    fn test_zero_findings_is_valid() {
        let result = ScanResult {
            image: "scratch".to_string(),
            digest: "sha256:empty".to_string(),
            scanned_at: Utc::now(),
            findings: vec![],
            engine: EngineInfo {
                name: "trivy".to_string(),
                version: "0.55.0".to_string(),
                db_updated_at: None,
            },
        };
        assert_eq!(result.total_findings(), 0);
        assert!(result.severity_counts().is_empty());
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity level for a vulnerability finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Unknown = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Unknown => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// All severity levels in descending order of severity.
    pub fn all() -> [Severity; 5] {
        [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Unknown,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Engine output uses uppercase severity strings; anything unrecognized
    /// maps to `Unknown` rather than failing the whole parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Unknown,
        })
    }
}

/// A single vulnerability instance reported by the scan engine.
///
/// Immutable once produced; downstream stages only read or drop findings,
/// never modify them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Vulnerability identifier, e.g. "CVE-2024-12345".
    pub id: String,
    /// Affected package name.
    pub package: String,
    /// Installed version of the affected package.
    pub installed_version: String,
    /// Version that fixes the vulnerability, if one exists.
    pub fixed_version: Option<String>,
    pub severity: Severity,
    /// Advisory origin, e.g. "ghsa", "nvd", "alpine".
    pub source: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::GateError;
use crate::models::Finding;

static CVE_ID_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    // CVE plus the other common advisory namespaces trivy emits
    Regex::new(r"^(CVE-\d{4}-\d{4,}|GHSA-[\w-]+|RUSTSEC-\d{4}-\d{4}|[A-Z]+-[\w:-]+)$").unwrap()
});

/// One allowlist entry. A rule must name a CVE id, a package pattern, or
/// both; an expired rule never suppresses anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRule {
    /// Exact vulnerability id, e.g. "CVE-2024-12345".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve_id: Option<String>,
    /// Glob pattern over the affected package name, e.g. "openssl*".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Glob pattern restricting the rule to matching image references.
    /// Absent means the rule applies to every image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<DateTime<Utc>>,
}

impl ExceptionRule {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }

    /// Does this rule match the finding itself (id or package), ignoring
    /// scope and expiry?
    pub fn matches_finding(&self, finding: &Finding) -> bool {
        if let Some(cve_id) = &self.cve_id {
            if cve_id == &finding.id {
                return true;
            }
        }
        if let Some(package) = &self.package {
            if let Ok(pattern) = glob::Pattern::new(package) {
                if pattern.matches(&finding.package) {
                    return true;
                }
            }
        }
        false
    }

    /// Does this rule apply to the given image reference?
    pub fn in_scope(&self, image: &str) -> bool {
        match &self.scope {
            None => true,
            Some(scope) => glob::Pattern::new(scope)
                .map(|p| p.matches(image))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionFile {
    #[serde(default)]
    exceptions: Vec<ExceptionRule>,
}

/// Load exception rules from a YAML file.
///
/// A missing file is an empty rule set. A file that exists but cannot be
/// parsed or validated is a `PolicyLoad` error: an invalid allowlist must
/// abort the run, never silently pass everything through.
pub fn load_rules(path: &Path) -> Result<Vec<ExceptionRule>, GateError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        GateError::PolicyLoad(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let file: ExceptionFile = serde_yaml::from_str(&content).map_err(|e| {
        GateError::PolicyLoad(format!("Malformed exception file {}: {}", path.display(), e))
    })?;

    validate_rules(&file.exceptions)?;
    Ok(file.exceptions)
}

/// Structural validation of a rule set. Shape problems are hard errors;
/// an unusual CVE id format is only a warning.
pub fn validate_rules(rules: &[ExceptionRule]) -> Result<(), GateError> {
    for (idx, rule) in rules.iter().enumerate() {
        if rule.cve_id.is_none() && rule.package.is_none() {
            return Err(GateError::PolicyLoad(format!(
                "Exception rule {} names neither a cve_id nor a package pattern",
                idx
            )));
        }
        if rule.justification.trim().is_empty() {
            return Err(GateError::PolicyLoad(format!(
                "Exception rule {} has an empty justification",
                idx
            )));
        }
        if let Some(package) = &rule.package {
            glob::Pattern::new(package).map_err(|e| {
                GateError::PolicyLoad(format!(
                    "Exception rule {} has an invalid package pattern '{}': {}",
                    idx, package, e
                ))
            })?;
        }
        if let Some(scope) = &rule.scope {
            glob::Pattern::new(scope).map_err(|e| {
                GateError::PolicyLoad(format!(
                    "Exception rule {} has an invalid scope pattern '{}': {}",
                    idx, scope, e
                ))
            })?;
        }
        if let Some(cve_id) = &rule.cve_id {
            if !CVE_ID_SHAPE.is_match(cve_id) {
                warn!(rule = idx, cve_id = %cve_id, "Exception rule has an unusual vulnerability id");
            }
        }
    }
    Ok(())
}

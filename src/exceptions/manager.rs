use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Finding, ScanResult};

use super::rules::ExceptionRule;

/// Audit record for one suppressed finding: the finding itself plus every
/// rule that matched it, not just the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressedFinding {
    pub finding: Finding,
    pub matched_rules: Vec<ExceptionRule>,
}

/// A scan result after exception filtering, plus the audit trail of what was
/// suppressed and why.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredScan {
    pub result: ScanResult,
    pub suppressed: Vec<SuppressedFinding>,
}

/// Filter a scan result by the given exception rules.
///
/// A finding is suppressed when at least one rule matches its id or package,
/// the rule's scope (if any) matches the scanned image reference, and the
/// rule has not expired as of `now`. Expiry is checked here, at filter time,
/// never against a cached evaluation.
///
/// Pure function of its inputs: filtering an already-filtered result with
/// the same rules yields the same output.
pub fn filter(scan: &ScanResult, rules: &[ExceptionRule], now: DateTime<Utc>) -> FilteredScan {
    let applicable: Vec<&ExceptionRule> = rules
        .iter()
        .filter(|rule| !rule.is_expired(now) && rule.in_scope(&scan.image))
        .collect();

    let mut kept = Vec::with_capacity(scan.findings.len());
    let mut suppressed = Vec::new();

    for finding in &scan.findings {
        let matched: Vec<ExceptionRule> = applicable
            .iter()
            .filter(|rule| rule.matches_finding(finding))
            .map(|rule| (*rule).clone())
            .collect();

        if matched.is_empty() {
            kept.push(finding.clone());
        } else {
            debug!(
                id = %finding.id,
                package = %finding.package,
                rules = matched.len(),
                "Finding suppressed by exception"
            );
            suppressed.push(SuppressedFinding {
                finding: finding.clone(),
                matched_rules: matched,
            });
        }
    }

    let mut result = scan.clone();
    result.findings = kept;
    FilteredScan { result, suppressed }
}

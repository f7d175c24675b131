use crate::models::{GateStatus, ScanResult, Severity, SeverityCheck, Verdict, Violation};

use super::policy::SeverityPolicy;

/// Evaluate a filtered scan result against a severity policy.
///
/// A severity is violated when its observed count is strictly greater than
/// the configured maximum; the limit is an inclusive ceiling. Severities the
/// policy does not mention never fail. Pure and deterministic: no I/O, no
/// clock, no side effects.
pub fn evaluate(filtered: &ScanResult, policy: &SeverityPolicy) -> Verdict {
    let limits = policy.effective_limits(&filtered.image);
    let counts = filtered.severity_counts();

    let mut breakdown = Vec::with_capacity(Severity::all().len());
    let mut violations = Vec::new();

    for severity in Severity::all() {
        let observed = counts.get(&severity).copied().unwrap_or(0) as u64;
        let limit = limits.get(&severity).copied();
        let violated = matches!(limit, Some(max) if observed > max);

        if violated {
            violations.push(Violation {
                severity,
                observed,
                max_allowed: limit.unwrap_or(0),
            });
        }
        breakdown.push(SeverityCheck {
            severity,
            observed,
            limit,
            violated,
        });
    }

    Verdict {
        status: if violations.is_empty() {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        },
        breakdown,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngineInfo, Finding};
    use chrono::Utc;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            package: "pkg".to_string(),
            installed_version: "1.0".to_string(),
            fixed_version: None,
            severity,
            source: "nvd".to_string(),
            title: None,
            description: None,
        }
    }

    fn scan(findings: Vec<Finding>) -> ScanResult {
        ScanResult {
            image: "app:1".to_string(),
            digest: "sha256:abc".to_string(),
            scanned_at: Utc::now(),
            findings,
            engine: EngineInfo {
                name: "trivy".to_string(),
                version: "0.55.0".to_string(),
                db_updated_at: None,
            },
        }
    }

    #[test]
    fn test_critical_zero_limit_fails_on_one_critical() {
        let policy = SeverityPolicy::with_limits([(Severity::Critical, 0), (Severity::High, 2)]);
        let s = scan(vec![
            finding("CVE-1", Severity::Critical),
            finding("CVE-2", Severity::High),
        ]);

        let verdict = evaluate(&s, &policy);
        assert_eq!(verdict.status, GateStatus::Fail);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].severity, Severity::Critical);
        assert_eq!(verdict.violations[0].observed, 1);
        assert_eq!(verdict.violations[0].max_allowed, 0);

        // HIGH is within its inclusive ceiling
        let high = verdict
            .breakdown
            .iter()
            .find(|c| c.severity == Severity::High)
            .unwrap();
        assert!(!high.violated);
        assert_eq!(high.observed, 1);
        assert_eq!(high.limit, Some(2));
    }

    #[test]
    fn test_unconstrained_severity_never_fails() {
        let policy = SeverityPolicy::with_limits([(Severity::Critical, 0)]);
        let s = scan(vec![
            finding("CVE-1", Severity::High),
            finding("CVE-2", Severity::High),
            finding("CVE-3", Severity::High),
        ]);

        let verdict = evaluate(&s, &policy);
        assert_eq!(verdict.status, GateStatus::Pass);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_count_equal_to_limit_passes() {
        let policy = SeverityPolicy::with_limits([(Severity::High, 2)]);
        let s = scan(vec![
            finding("CVE-1", Severity::High),
            finding("CVE-2", Severity::High),
        ]);
        assert!(evaluate(&s, &policy).passed());
    }

    #[test]
    fn test_zero_findings_always_pass() {
        let policy = SeverityPolicy::with_limits([
            (Severity::Critical, 0),
            (Severity::High, 0),
            (Severity::Medium, 0),
            (Severity::Low, 0),
            (Severity::Unknown, 0),
        ]);
        let verdict = evaluate(&scan(vec![]), &policy);
        assert!(verdict.passed());
        assert!(verdict.breakdown.iter().all(|c| c.observed == 0));
    }

    #[test]
    fn test_empty_policy_is_unlimited() {
        let s = scan(vec![finding("CVE-1", Severity::Critical)]);
        assert!(evaluate(&s, &SeverityPolicy::default()).passed());
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let policy = SeverityPolicy::with_limits([(Severity::Critical, 0)]);
        let s = scan(vec![finding("CVE-1", Severity::Critical)]);
        assert_eq!(evaluate(&s, &policy), evaluate(&s, &policy));
    }

    #[test]
    fn test_breakdown_in_descending_severity_order() {
        let verdict = evaluate(&scan(vec![]), &SeverityPolicy::default());
        let order: Vec<Severity> = verdict.breakdown.iter().map(|c| c.severity).collect();
        assert_eq!(order, Severity::all());
    }
}

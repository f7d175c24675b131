use console::style;

use crate::models::{GateReport, GateStatus, Severity};

/// Markdown summary of a gate run: severity table, violations, suppressions.
pub fn format_report_markdown(report: &GateReport) -> String {
    let mut out = String::new();
    out.push_str("# Vulnerability Gate Report\n\n");
    out.push_str(&format!("**Image:** `{}`\n", report.image));
    out.push_str(&format!("**Digest:** `{}`\n", report.digest));
    out.push_str(&format!(
        "**Scanned:** {} ({} {})\n",
        report.scanned_at.to_rfc3339(),
        report.engine.name,
        report.engine.version
    ));
    out.push_str(&format!(
        "**Verdict:** {}\n\n",
        match report.verdict.status {
            GateStatus::Pass => "PASS",
            GateStatus::Fail => "FAIL",
        }
    ));

    out.push_str("| Severity | Count | Limit | Violated |\n|---|---|---|---|\n");
    for check in &report.verdict.breakdown {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            check.severity,
            check.observed,
            check
                .limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if check.violated { "yes" } else { "" }
        ));
    }

    if !report.verdict.violations.is_empty() {
        out.push_str("\n## Violations\n\n");
        for v in &report.verdict.violations {
            out.push_str(&format!(
                "- {}: {} found, max allowed {}\n",
                v.severity, v.observed, v.max_allowed
            ));
        }
    }

    if !report.findings.is_empty() {
        out.push_str("\n## Findings\n\n| ID | Package | Installed | Fixed | Severity |\n|---|---|---|---|---|\n");
        for f in &report.findings {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                f.id,
                f.package,
                f.installed_version,
                f.fixed_version.as_deref().unwrap_or("-"),
                f.severity
            ));
        }
    }

    if !report.suppressed.is_empty() {
        out.push_str("\n## Suppressed by exception\n\n");
        for s in &report.suppressed {
            let justifications: Vec<&str> = s
                .matched_rules
                .iter()
                .map(|r| r.justification.as_str())
                .collect();
            out.push_str(&format!(
                "- {} ({}): {}\n",
                s.finding.id,
                s.finding.package,
                justifications.join("; ")
            ));
        }
    }

    out
}

/// One-line styled verdict for the terminal.
pub fn format_gate_line(report: &GateReport) -> String {
    match report.verdict.status {
        GateStatus::Pass => format!(
            "{} {} ({} findings, {} suppressed)",
            style("PASS").green().bold(),
            report.image,
            report.findings.len(),
            report.suppressed.len()
        ),
        GateStatus::Fail => {
            let detail: Vec<String> = report
                .verdict
                .violations
                .iter()
                .map(|v| format!("{} {}>{}", v.severity, v.observed, v.max_allowed))
                .collect();
            format!(
                "{} {} ({})",
                style("FAIL").red().bold(),
                report.image,
                detail.join(", ")
            )
        }
    }
}

/// Severity counts of surviving findings, most severe first, for log lines.
pub fn severity_summary(report: &GateReport) -> String {
    let mut parts = Vec::new();
    for severity in Severity::all() {
        let count = report
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .count();
        if count > 0 {
            parts.push(format!("{}={}", severity, count));
        }
    }
    if parts.is_empty() {
        "clean".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        EngineInfo, Finding, GateStatus, ScanResult, SeverityCheck, Verdict, Violation,
    };
    use chrono::Utc;

    fn report(status: GateStatus) -> GateReport {
        let verdict = Verdict {
            status,
            breakdown: vec![SeverityCheck {
                severity: Severity::Critical,
                observed: 1,
                limit: Some(0),
                violated: status == GateStatus::Fail,
            }],
            violations: if status == GateStatus::Fail {
                vec![Violation {
                    severity: Severity::Critical,
                    observed: 1,
                    max_allowed: 0,
                }]
            } else {
                vec![]
            },
        };
        GateReport::new(
            ScanResult {
                image: "app:1".to_string(),
                digest: "sha256:abc".to_string(),
                scanned_at: Utc::now(),
                findings: vec![Finding {
                    id: "CVE-2024-0001".to_string(),
                    package: "openssl".to_string(),
                    installed_version: "3.0.1".to_string(),
                    fixed_version: None,
                    severity: Severity::Critical,
                    source: "nvd".to_string(),
                    title: None,
                    description: None,
                }],
                engine: EngineInfo {
                    name: "trivy".to_string(),
                    version: "0.55.0".to_string(),
                    db_updated_at: None,
                },
            },
            vec![],
            verdict,
        )
    }

    #[test]
    fn test_markdown_contains_verdict_and_table() {
        let md = format_report_markdown(&report(GateStatus::Fail));
        assert!(md.contains("**Verdict:** FAIL"));
        assert!(md.contains("| CRITICAL | 1 | 0 | yes |"));
        assert!(md.contains("CVE-2024-0001"));
    }

    #[test]
    fn test_gate_line_mentions_violation_detail() {
        let line = format_gate_line(&report(GateStatus::Fail));
        assert!(line.contains("app:1"));
        assert!(line.contains("CRITICAL 1>0"));
    }

    #[test]
    fn test_severity_summary() {
        assert_eq!(severity_summary(&report(GateStatus::Pass)), "CRITICAL=1");
    }
}

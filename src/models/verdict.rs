use serde::{Deserialize, Serialize};

use super::finding::Severity;

/// Gate decision for a scan after exception filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pass,
    Fail,
}

/// Observed count versus configured limit for one severity level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCheck {
    pub severity: Severity,
    pub observed: u64,
    /// Maximum permitted count; `None` means the policy places no limit on
    /// this severity.
    pub limit: Option<u64>,
    pub violated: bool,
}

/// A severity whose observed count exceeded the configured maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub observed: u64,
    pub max_allowed: u64,
}

/// The outcome of threshold evaluation: PASS/FAIL plus the full per-severity
/// breakdown. FAIL is an expected result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: GateStatus,
    /// One entry per severity level, in descending severity order.
    pub breakdown: Vec<SeverityCheck>,
    /// Empty when the verdict is PASS.
    pub violations: Vec<Violation>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }
}

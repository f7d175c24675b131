use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exceptions::SuppressedFinding;
use super::finding::Finding;
use super::scan_result::{EngineInfo, ScanResult};
use super::verdict::Verdict;

/// Canonical hand-off object exposed to the report generator, the chat
/// notifier and the metrics exporter. Serializes losslessly to JSON; every
/// field the collaborators need is carried here so none of them has to
/// re-run the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// Unique id for this gate run.
    pub run_id: String,
    pub image: String,
    pub digest: String,
    pub scanned_at: DateTime<Utc>,
    pub engine: EngineInfo,
    /// Findings that survived exception filtering.
    pub findings: Vec<Finding>,
    /// Audit trail of findings suppressed by exception rules, with every
    /// rule that matched each one.
    pub suppressed: Vec<SuppressedFinding>,
    pub verdict: Verdict,
}

impl GateReport {
    pub fn new(
        filtered: ScanResult,
        suppressed: Vec<SuppressedFinding>,
        verdict: Verdict,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            image: filtered.image,
            digest: filtered.digest,
            scanned_at: filtered.scanned_at,
            engine: filtered.engine,
            findings: filtered.findings,
            suppressed,
            verdict,
        }
    }
}

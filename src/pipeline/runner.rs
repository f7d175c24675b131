use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::GateError;
use crate::exceptions::{self, ExceptionRule};
use crate::models::{GateReport, GateStatus};
use crate::scanner::ScanExecutor;
use crate::schedule::{RescanEntry, RescanOutcome, RescanScheduler};
use crate::threshold::{self, SeverityPolicy};

/// Runs the scan → filter → threshold pipeline for images.
///
/// Stages within one image run strictly in sequence; across images a batch
/// run is bounded by a semaphore so the engine is never hit by more than
/// `max_parallel` concurrent invocations.
#[derive(Clone)]
pub struct GatePipeline {
    executor: Arc<ScanExecutor>,
    rules: Arc<Vec<ExceptionRule>>,
    policy: Arc<SeverityPolicy>,
}

/// Outcome of a batch rescan cycle.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<GateReport>,
    pub failures: Vec<BatchFailure>,
    /// Digests whose scans never started because the suite deadline elapsed.
    pub skipped: Vec<String>,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub image: String,
    pub digest: String,
    pub error: GateError,
}

impl GatePipeline {
    pub fn new(
        executor: Arc<ScanExecutor>,
        rules: Vec<ExceptionRule>,
        policy: SeverityPolicy,
    ) -> Self {
        Self {
            executor,
            rules: Arc::new(rules),
            policy: Arc::new(policy),
        }
    }

    /// Full pipeline for one image: scan with retry, suppress excepted
    /// findings, evaluate thresholds. The verdict, including FAIL, is a
    /// successful result; only scan execution failures surface as errors.
    pub async fn run_image(&self, image: &str) -> Result<GateReport, GateError> {
        let scan = self.executor.run(image).await?;
        let filtered = exceptions::filter(&scan, &self.rules, Utc::now());
        let verdict = threshold::evaluate(&filtered.result, &self.policy);

        info!(
            image = %image,
            findings = filtered.result.findings.len(),
            suppressed = filtered.suppressed.len(),
            verdict = ?verdict.status,
            "Gate evaluation complete"
        );

        Ok(GateReport::new(filtered.result, filtered.suppressed, verdict))
    }

    /// Run the pipeline for every due entry, with bounded parallelism and an
    /// optional suite deadline. Scans that have not started when the
    /// deadline elapses are skipped; completed results are always kept.
    /// Each completed scan updates its rescan entry; store failures are
    /// logged and do not invalidate the scan.
    pub async fn run_batch(
        &self,
        entries: Vec<RescanEntry>,
        scheduler: Arc<RescanScheduler>,
        max_parallel: usize,
        deadline: Option<Duration>,
    ) -> BatchOutcome {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let cancel = CancellationToken::new();

        if let Some(deadline) = deadline {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(deadline_secs = deadline.as_secs(), "Batch deadline elapsed");
                cancel.cancel();
            });
        }

        let mut handles = Vec::with_capacity(entries.len());
        for entry in entries {
            let pipeline = self.clone();
            let scheduler = scheduler.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return BatchItem::Skipped(entry.digest),
                    },
                    _ = cancel.cancelled() => return BatchItem::Skipped(entry.digest),
                };
                // A scan that acquired its permit runs to completion even if
                // the deadline fires mid-flight.
                let _permit = permit;

                match pipeline.run_image(&entry.image).await {
                    Ok(report) => {
                        let outcome = match report.verdict.status {
                            GateStatus::Pass => RescanOutcome::Pass,
                            GateStatus::Fail => RescanOutcome::Fail,
                        };
                        // Entries seeded before any scan are keyed by the
                        // image reference. Adopt the resolved digest and
                        // mark the original key scanned too, so a seeded
                        // entry never stays due forever.
                        if report.digest != entry.digest {
                            if let Err(e) = scheduler.register(
                                &report.digest,
                                &report.image,
                                Some(entry.interval),
                            ) {
                                warn!(
                                    digest = %report.digest,
                                    error = %e,
                                    "Failed to track resolved digest"
                                );
                            }
                            scheduler.record_outcome_best_effort(
                                &report.digest,
                                report.scanned_at,
                                outcome,
                            );
                        }
                        scheduler.record_outcome_best_effort(
                            &entry.digest,
                            report.scanned_at,
                            outcome,
                        );
                        BatchItem::Completed(Box::new(report))
                    }
                    Err(e) => {
                        error!(image = %entry.image, error = %e, "Batch scan failed");
                        BatchItem::Failed {
                            image: entry.image,
                            digest: entry.digest,
                            error: e,
                        }
                    }
                }
            }));
        }

        let mut outcome = BatchOutcome::default();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(BatchItem::Completed(report)) => outcome.reports.push(*report),
                Ok(BatchItem::Failed {
                    image,
                    digest,
                    error,
                }) => outcome.failures.push(BatchFailure {
                    image,
                    digest,
                    error,
                }),
                Ok(BatchItem::Skipped(digest)) => outcome.skipped.push(digest),
                Err(e) => outcome.failures.push(BatchFailure {
                    image: String::new(),
                    digest: String::new(),
                    error: GateError::Internal(format!("Batch task panicked: {}", e)),
                }),
            }
        }

        info!(
            completed = outcome.reports.len(),
            failed = outcome.failures.len(),
            skipped = outcome.skipped.len(),
            "Batch rescan finished"
        );
        outcome
    }
}

enum BatchItem {
    Completed(Box<GateReport>),
    Failed {
        image: String,
        digest: String,
        error: GateError,
    },
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RetryPolicy;
    use crate::models::Severity;
    use crate::scanner::ScanEngine;
    use crate::schedule::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticEngine {
        payload: String,
        concurrent: AtomicU32,
        peak: AtomicU32,
    }

    impl StaticEngine {
        fn new(payload: &str) -> Self {
            Self {
                payload: payload.to_string(),
                concurrent: AtomicU32::new(0),
                peak: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ScanEngine for StaticEngine {
        async fn scan(&self, _image: &str) -> Result<String, GateError> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }

        async fn info(&self) -> crate::models::EngineInfo {
            crate::models::EngineInfo {
                name: "static".to_string(),
                version: "0.0.0-test".to_string(),
                db_updated_at: None,
            }
        }
    }

    const VULNERABLE_REPORT: &str = r#"{
        "Metadata": {"RepoDigests": ["app@sha256:abc"]},
        "Results": [{
            "Target": "app",
            "Vulnerabilities": [{
                "VulnerabilityID": "CVE-2024-0001",
                "PkgName": "openssl",
                "InstalledVersion": "3.0.1",
                "Severity": "CRITICAL"
            }]
        }]
    }"#;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    fn pipeline_with(engine: Arc<dyn ScanEngine>, rules: Vec<ExceptionRule>, policy: SeverityPolicy) -> GatePipeline {
        GatePipeline::new(
            Arc::new(ScanExecutor::new(engine, fast_policy())),
            rules,
            policy,
        )
    }

    #[tokio::test]
    async fn test_run_image_fail_verdict_is_ok_result() {
        let engine = Arc::new(StaticEngine::new(VULNERABLE_REPORT));
        let pipeline = pipeline_with(
            engine,
            vec![],
            SeverityPolicy::with_limits([(Severity::Critical, 0)]),
        );

        let report = pipeline.run_image("app:1").await.unwrap();
        assert_eq!(report.verdict.status, GateStatus::Fail);
        assert_eq!(report.findings.len(), 1);
        assert!(report.suppressed.is_empty());
    }

    #[tokio::test]
    async fn test_run_image_exception_flips_verdict() {
        let engine = Arc::new(StaticEngine::new(VULNERABLE_REPORT));
        let rule = ExceptionRule {
            cve_id: Some("CVE-2024-0001".to_string()),
            package: None,
            scope: None,
            justification: "not reachable".to_string(),
            expires: None,
            approved_by: None,
            added: None,
        };
        let pipeline = pipeline_with(
            engine,
            vec![rule],
            SeverityPolicy::with_limits([(Severity::Critical, 0)]),
        );

        let report = pipeline.run_image("app:1").await.unwrap();
        assert_eq!(report.verdict.status, GateStatus::Pass);
        assert!(report.findings.is_empty());
        assert_eq!(report.suppressed.len(), 1);
    }

    #[tokio::test]
    async fn test_run_batch_bounded_parallelism_and_store_updates() {
        let engine = Arc::new(StaticEngine::new(VULNERABLE_REPORT));
        let pipeline = pipeline_with(engine.clone(), vec![], SeverityPolicy::default());
        let scheduler = Arc::new(RescanScheduler::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(86_400),
        ));

        // The engine reports digest sha256:abc for every image, so outcome
        // updates land on that entry.
        let entries: Vec<RescanEntry> = (0..6)
            .map(|i| {
                scheduler
                    .register("sha256:abc", &format!("app:{}", i), None)
                    .unwrap()
            })
            .collect();

        let outcome = pipeline
            .run_batch(entries, scheduler.clone(), 2, None)
            .await;

        assert_eq!(outcome.reports.len(), 6);
        assert!(outcome.failures.is_empty());
        assert!(outcome.skipped.is_empty());
        assert!(engine.peak.load(Ordering::SeqCst) <= 2);

        // Completed scans updated the tracked entry
        let entry = scheduler.store().get("sha256:abc").unwrap().unwrap();
        assert!(entry.last_scanned.is_some());
        assert_eq!(entry.last_outcome, Some(RescanOutcome::Fail));
    }

    #[tokio::test]
    async fn test_run_batch_marks_image_keyed_entry_scanned() {
        let engine = Arc::new(StaticEngine::new(VULNERABLE_REPORT));
        let pipeline = pipeline_with(engine, vec![], SeverityPolicy::default());
        let scheduler = Arc::new(RescanScheduler::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(86_400),
        ));

        // Seeded before any scan: the image reference stands in as the key
        let entries = vec![scheduler.register("app:1", "app:1", None).unwrap()];
        let outcome = pipeline.run_batch(entries, scheduler.clone(), 1, None).await;
        assert_eq!(outcome.reports.len(), 1);

        // The seeded entry is marked scanned, the resolved digest is
        // tracked, and nothing is due anymore
        let seeded = scheduler.store().get("app:1").unwrap().unwrap();
        assert!(seeded.last_scanned.is_some());
        assert_eq!(seeded.last_outcome, Some(RescanOutcome::Fail));

        let resolved = scheduler.store().get("sha256:abc").unwrap().unwrap();
        assert_eq!(resolved.last_outcome, Some(RescanOutcome::Fail));

        assert!(scheduler.due(Utc::now(), None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_batch_deadline_skips_pending_scans() {
        let engine = Arc::new(StaticEngine::new(VULNERABLE_REPORT));
        let pipeline = pipeline_with(engine, vec![], SeverityPolicy::default());
        let scheduler = Arc::new(RescanScheduler::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(86_400),
        ));

        let entries: Vec<RescanEntry> = (0..20)
            .map(|i| {
                scheduler
                    .register(&format!("sha256:{}", i), "app:1", None)
                    .unwrap()
            })
            .collect();

        // One scan at a time, ~10ms each; the deadline cuts the batch short.
        let outcome = pipeline
            .run_batch(
                entries,
                scheduler,
                1,
                Some(Duration::from_millis(25)),
            )
            .await;

        assert!(!outcome.skipped.is_empty());
        // Whatever completed before the deadline is retained
        assert_eq!(
            outcome.reports.len() + outcome.failures.len() + outcome.skipped.len(),
            20
        );
    }
}

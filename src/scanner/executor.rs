use std::sync::Arc;

use tracing::info;

use crate::errors::{with_retry, GateError, RetryPolicy};
use crate::models::ScanResult;

use super::engine::ScanEngine;
use super::trivy;

/// Runs the external scan engine for one image, retrying transient failures
/// with exponential backoff, and normalizes the output into a `ScanResult`.
///
/// Owns no shared state; each `run` call carries its own retry state.
pub struct ScanExecutor {
    engine: Arc<dyn ScanEngine>,
    retry: RetryPolicy,
}

impl ScanExecutor {
    pub fn new(engine: Arc<dyn ScanEngine>, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    /// Scan `image`, producing a `ScanResult` or a classified terminal error.
    ///
    /// Only the engine invocation sits inside the retry loop. Parsing happens
    /// once after a successful attempt; a parse failure is fatal and is never
    /// retried.
    pub async fn run(&self, image: &str) -> Result<ScanResult, GateError> {
        let raw = with_retry("scan", &self.retry, || self.engine.scan(image)).await?;

        let engine_info = self.engine.info().await;
        let result = trivy::parse_report(image, &raw, engine_info)?;
        info!(
            image = %image,
            digest = %result.digest,
            findings = result.findings.len(),
            "Scan completed"
        );
        Ok(result)
    }
}

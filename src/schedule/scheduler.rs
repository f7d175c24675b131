use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::errors::GateError;

use super::entry::{RescanEntry, RescanOutcome};
use super::store::RescanStore;

/// Decides which tracked image digests are due for a rescan and records
/// completed scans back into the store.
pub struct RescanScheduler {
    store: Arc<dyn RescanStore>,
    default_interval: Duration,
}

impl RescanScheduler {
    pub fn new(store: Arc<dyn RescanStore>, default_interval: Duration) -> Self {
        Self {
            store,
            default_interval,
        }
    }

    pub fn store(&self) -> &Arc<dyn RescanStore> {
        &self.store
    }

    /// Track a digest for periodic rescans. First registration creates the
    /// entry in a due-now state so the image receives at least one scan
    /// before entering the periodic cycle. Re-registering an existing digest
    /// refreshes the image reference and interval without resetting the
    /// last-scanned timestamp.
    pub fn register(
        &self,
        digest: &str,
        image: &str,
        interval: Option<Duration>,
    ) -> Result<RescanEntry, GateError> {
        let entry = match self.store.get(digest)? {
            Some(mut existing) => {
                existing.image = image.to_string();
                if let Some(interval) = interval {
                    existing.interval = interval;
                }
                existing
            }
            None => {
                info!(digest = %digest, image = %image, "Tracking new image digest");
                RescanEntry {
                    digest: digest.to_string(),
                    image: image.to_string(),
                    last_scanned: None,
                    interval: interval.unwrap_or(self.default_interval),
                    last_outcome: None,
                }
            }
        };
        self.store.put(&entry)?;
        Ok(entry)
    }

    /// All entries due for a rescan at `now`, at most one per digest, in
    /// stable digest order.
    pub fn due(
        &self,
        now: DateTime<Utc>,
        override_interval: Option<Duration>,
    ) -> Result<Vec<RescanEntry>, GateError> {
        let mut seen = HashSet::new();
        let due: Vec<RescanEntry> = self
            .store
            .list()?
            .into_iter()
            .filter(|entry| entry.is_due(now, override_interval))
            .filter(|entry| seen.insert(entry.digest.clone()))
            .collect();
        info!(due = due.len(), "Computed rescan due set");
        Ok(due)
    }

    /// Record a completed scan for a digest. Store failures are surfaced to
    /// the caller but a scan already produced remains valid regardless.
    pub fn record_outcome(
        &self,
        digest: &str,
        when: DateTime<Utc>,
        outcome: RescanOutcome,
    ) -> Result<(), GateError> {
        self.store.mark_scanned(digest, when, outcome)
    }

    /// Best-effort variant of `record_outcome` for the directly triggered
    /// scan path: scheduler health must never fail a scan that already
    /// completed.
    pub fn record_outcome_best_effort(
        &self,
        digest: &str,
        when: DateTime<Utc>,
        outcome: RescanOutcome,
    ) {
        if let Err(e) = self.record_outcome(digest, when, outcome) {
            warn!(digest = %digest, error = %e, "Failed to update rescan entry");
        }
    }
}

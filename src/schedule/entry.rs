use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last known gate outcome for a tracked digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescanOutcome {
    Pass,
    Fail,
}

impl RescanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescanOutcome::Pass => "pass",
            RescanOutcome::Fail => "fail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(RescanOutcome::Pass),
            "fail" => Some(RescanOutcome::Fail),
            _ => None,
        }
    }
}

/// Persisted record tracking when an image digest was last scanned.
///
/// Created on first sight of a digest, updated on every subsequent scan,
/// never deleted automatically. The store retains entries for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescanEntry {
    /// Content-addressed image identity; the store key.
    pub digest: String,
    /// Image reference to use when re-driving a scan of this digest.
    pub image: String,
    /// `None` means registered but never scanned, which is due immediately.
    pub last_scanned: Option<DateTime<Utc>>,
    pub interval: Duration,
    pub last_outcome: Option<RescanOutcome>,
}

impl RescanEntry {
    /// Is this entry due for a rescan at `now`? An `override_interval`
    /// replaces the entry's own interval for this evaluation only.
    pub fn is_due(&self, now: DateTime<Utc>, override_interval: Option<Duration>) -> bool {
        let last = match self.last_scanned {
            None => return true,
            Some(last) => last,
        };
        let interval = override_interval.unwrap_or(self.interval);
        // An interval too large for chrono arithmetic can never elapse
        match chrono::Duration::from_std(interval) {
            Ok(interval) => last + interval <= now,
            Err(_) => false,
        }
    }
}

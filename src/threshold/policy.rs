use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Severity;

/// Limit overrides for images matching a scope pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeOverride {
    /// Glob pattern over the image reference.
    pub scope: String,
    /// Limits that replace the base limits for matching images. Severities
    /// absent here fall back to the base map.
    #[serde(default)]
    pub limits: HashMap<Severity, u64>,
}

/// Per-severity maximum permitted finding counts.
///
/// The policy is an additive allowlist of limits: severities it does not
/// mention are unlimited and can never cause a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityPolicy {
    #[serde(default)]
    pub limits: HashMap<Severity, u64>,
    #[serde(default)]
    pub overrides: Vec<ScopeOverride>,
}

impl SeverityPolicy {
    /// A policy with only base limits.
    pub fn with_limits(limits: impl IntoIterator<Item = (Severity, u64)>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
            overrides: Vec::new(),
        }
    }

    /// The limits in effect for `image`: the base map with the first
    /// matching scope override layered on top.
    pub fn effective_limits(&self, image: &str) -> HashMap<Severity, u64> {
        let mut limits = self.limits.clone();
        for over in &self.overrides {
            let applies = glob::Pattern::new(&over.scope)
                .map(|p| p.matches(image))
                .unwrap_or(false);
            if applies {
                for (severity, max) in &over.limits {
                    limits.insert(*severity, *max);
                }
                break;
            }
        }
        limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limits_without_overrides() {
        let policy = SeverityPolicy::with_limits([(Severity::Critical, 0), (Severity::High, 5)]);
        let limits = policy.effective_limits("any/image:1");
        assert_eq!(limits.get(&Severity::Critical), Some(&0));
        assert_eq!(limits.get(&Severity::High), Some(&5));
        assert_eq!(limits.get(&Severity::Medium), None);
    }

    #[test]
    fn test_scope_override_replaces_matching_severity_only() {
        let mut policy = SeverityPolicy::with_limits([(Severity::Critical, 0), (Severity::High, 2)]);
        policy.overrides.push(ScopeOverride {
            scope: "legacy/*".to_string(),
            limits: [(Severity::High, 10)].into_iter().collect(),
        });

        let legacy = policy.effective_limits("legacy/app:1");
        assert_eq!(legacy.get(&Severity::High), Some(&10));
        // Base limit untouched for severities the override does not mention
        assert_eq!(legacy.get(&Severity::Critical), Some(&0));

        let normal = policy.effective_limits("modern/app:1");
        assert_eq!(normal.get(&Severity::High), Some(&2));
    }

    #[test]
    fn test_first_matching_override_wins() {
        let mut policy = SeverityPolicy::with_limits([(Severity::High, 1)]);
        policy.overrides.push(ScopeOverride {
            scope: "legacy/*".to_string(),
            limits: [(Severity::High, 10)].into_iter().collect(),
        });
        policy.overrides.push(ScopeOverride {
            scope: "legacy/app*".to_string(),
            limits: [(Severity::High, 99)].into_iter().collect(),
        });

        assert_eq!(
            policy.effective_limits("legacy/app:1").get(&Severity::High),
            Some(&10)
        );
    }
}

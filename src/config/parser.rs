use std::path::Path;

use tracing::warn;

use crate::errors::GateError;

use super::schema::CONFIG_SCHEMA;
use super::types::GateConfig;

pub async fn parse_config(path: &Path) -> Result<GateConfig, GateError> {
    if !path.exists() {
        return Err(GateError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(GateError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let mut yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    // JSON Schema validation
    validate_schema(&yaml)?;

    // The thresholds section is policy: a malformed policy aborts with a
    // PolicyLoad error, not a generic config error.
    let thresholds = yaml
        .as_mapping_mut()
        .and_then(|mapping| mapping.remove("thresholds"));

    // Parse into typed config
    let mut config: GateConfig = serde_yaml::from_value(yaml)?;
    if let Some(thresholds) = thresholds {
        config.thresholds = Some(serde_yaml::from_value(thresholds).map_err(|e| {
            GateError::PolicyLoad(format!("Malformed thresholds section: {}", e))
        })?);
    }

    // Semantic validation
    validate_semantics(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), GateError> {
    // Convert YAML value to JSON for schema validation
    let json_str = serde_json::to_string(yaml)
        .map_err(|e| GateError::Config(format!("Config conversion error: {}", e)))?;
    let json_value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| GateError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| GateError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        if !messages.is_empty() {
            // Warn but don't fail — schema validation is advisory for now
            for msg in &messages {
                warn!(validation_error = %msg, "Config schema warning");
            }
        }
    }

    Ok(())
}

/// Reject configurations that would make the retry machine or the batch
/// runner misbehave.
fn validate_semantics(config: &GateConfig) -> Result<(), GateError> {
    if let Some(scanner) = &config.scanner {
        if scanner.max_attempts == Some(0) {
            return Err(GateError::Config(
                "scanner.max_attempts must be at least 1".into(),
            ));
        }
        if let (Some(base), Some(max)) = (scanner.backoff_base_secs, scanner.backoff_max_secs) {
            if base > max {
                return Err(GateError::Config(format!(
                    "scanner.backoff_base_secs ({}) exceeds backoff_max_secs ({})",
                    base, max
                )));
            }
        }
    }

    if let Some(rescan) = &config.rescan {
        if rescan.max_parallel == Some(0) {
            return Err(GateError::Config(
                "rescan.max_parallel must be at least 1".into(),
            ));
        }
    }

    if let Some(thresholds) = &config.thresholds {
        for over in &thresholds.overrides {
            glob::Pattern::new(&over.scope).map_err(|e| {
                GateError::PolicyLoad(format!(
                    "Invalid threshold override scope '{}': {}",
                    over.scope, e
                ))
            })?;
        }
    }

    if let Some(output) = &config.output {
        if let Some(format) = &output.format {
            if format != "json" && format != "markdown" {
                return Err(GateError::Config(format!(
                    "Unsupported output format: {}",
                    format
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{RescanConfig, ScannerConfig};
    use crate::models::Severity;
    use crate::threshold::{ScopeOverride, SeverityPolicy};

    fn scanner(max_attempts: Option<u32>) -> ScannerConfig {
        ScannerConfig {
            binary: None,
            timeout_secs: None,
            max_attempts,
            backoff_base_secs: None,
            backoff_max_secs: None,
            jitter: None,
            severities: None,
            ignore_unfixed: None,
        }
    }

    #[test]
    fn test_semantics_rejects_zero_attempts() {
        let config = GateConfig {
            scanner: Some(scanner(Some(0))),
            ..Default::default()
        };
        assert!(validate_semantics(&config).is_err());
    }

    #[test]
    fn test_semantics_rejects_inverted_backoff() {
        let mut s = scanner(Some(3));
        s.backoff_base_secs = Some(120);
        s.backoff_max_secs = Some(60);
        let config = GateConfig {
            scanner: Some(s),
            ..Default::default()
        };
        assert!(validate_semantics(&config).is_err());
    }

    #[test]
    fn test_semantics_rejects_zero_parallelism() {
        let config = GateConfig {
            rescan: Some(RescanConfig {
                store_path: None,
                default_interval_hours: None,
                max_parallel: Some(0),
                deadline_secs: None,
            }),
            ..Default::default()
        };
        assert!(validate_semantics(&config).is_err());
    }

    #[test]
    fn test_semantics_rejects_bad_override_scope() {
        let mut policy = SeverityPolicy::with_limits([(Severity::Critical, 0)]);
        policy.overrides.push(ScopeOverride {
            scope: "bad[".to_string(),
            limits: Default::default(),
        });
        let config = GateConfig {
            thresholds: Some(policy),
            ..Default::default()
        };
        assert!(matches!(
            validate_semantics(&config),
            Err(GateError::PolicyLoad(_))
        ));
    }

    #[tokio::test]
    async fn test_parse_malformed_thresholds_is_policy_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.yaml");
        tokio::fs::write(&path, "thresholds:\n  limits:\n    CRITICAL: lots\n")
            .await
            .unwrap();

        let err = parse_config(&path).await.unwrap_err();
        assert!(matches!(err, GateError::PolicyLoad(_)));
    }

    #[test]
    fn test_semantics_empty_config_ok() {
        assert!(validate_semantics(&GateConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.yaml");
        tokio::fs::write(
            &path,
            r#"
scanner:
  timeout_secs: 120
  max_attempts: 4
  backoff_base_secs: 1
  backoff_max_secs: 30
  ignore_unfixed: true
exceptions:
  file: ./exceptions.yaml
thresholds:
  limits:
    CRITICAL: 0
    HIGH: 5
  overrides:
    - scope: "legacy/*"
      limits:
        HIGH: 20
rescan:
  store_path: ./rescan.db
  default_interval_hours: 24
  max_parallel: 2
output:
  format: json
"#,
        )
        .await
        .unwrap();

        let config = parse_config(&path).await.unwrap();
        let scanner = config.scanner.unwrap();
        assert_eq!(scanner.max_attempts, Some(4));
        assert!(scanner.trivy_config().ignore_unfixed);
        assert_eq!(scanner.retry_policy().max_attempts, 4);

        let thresholds = config.thresholds.unwrap();
        assert_eq!(thresholds.limits.get(&Severity::Critical), Some(&0));
        assert_eq!(thresholds.overrides.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_missing_file_is_config_error() {
        let err = parse_config(Path::new("/nope/gate.yaml")).await.unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }
}

use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::Config;
use crate::detection::RuleType;
use crate::error::ConfigError;

/// Loads a config file, choosing the parser from the file extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_config_from_str(&content),
        Some("yaml") | Some("yml") => load_config_from_yaml_str(&content),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_yaml_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let batch = &config.batch;
    if !(1..=crate::batch::MAX_BATCH_FILES).contains(&batch.max_files) {
        return Err(ConfigError::Validation {
            message: format!(
                "batch.max_files must be between 1 and {}",
                crate::batch::MAX_BATCH_FILES
            ),
        });
    }
    if !(1..=crate::batch::MAX_CONCURRENT_FILES).contains(&batch.max_concurrency) {
        return Err(ConfigError::Validation {
            message: format!(
                "batch.max_concurrency must be between 1 and {}",
                crate::batch::MAX_CONCURRENT_FILES
            ),
        });
    }

    let detection = &config.detection;
    for (name, value) in [
        ("short_circuit_confidence", detection.short_circuit_confidence),
        ("max_rule_confidence", detection.max_rule_confidence),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation {
                message: format!("detection.{} must be within [0, 1], got {}", name, value),
            });
        }
    }
    if detection.score_normalization <= 0.0 {
        return Err(ConfigError::Validation {
            message: "detection.score_normalization must be positive".to_string(),
        });
    }

    let mut company_ids = HashSet::new();
    for company in &config.companies {
        if company.id.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("Company '{}' has an empty id", company.name),
            });
        }
        if !company_ids.insert(company.id.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate company id: {}", company.id),
            });
        }
    }

    let mut rule_ids = HashSet::new();
    for rule in &config.rules {
        if !rule_ids.insert(rule.id.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate rule id: {}", rule.id),
            });
        }
        if rule.rule_type == RuleType::Pattern {
            if let Err(e) = regex::Regex::new(&rule.rule_value) {
                return Err(ConfigError::InvalidPattern {
                    rule_id: rule.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.batch.max_files, 50);
        assert_eq!(config.batch.max_concurrency, 3);
        assert_eq!(config.detection.short_circuit_confidence, 0.85);
        assert_eq!(config.tracker.min_document_creating_ms, 2000);
        assert_eq!(config.ai.api_key_env.as_deref(), Some("GEMINI_API_KEY"));
        assert!(config.companies.is_empty());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = load_config_from_str(r#"{"version": "2.0"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rejects_concurrency_above_cap() {
        let err = load_config_from_str(r#"{"version": "1.0", "batch": {"max_concurrency": 8}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_rejects_max_files_above_cap() {
        let err = load_config_from_str(r#"{"version": "1.0", "batch": {"max_files": 1000}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("max_files"));

        let config =
            load_config_from_str(r#"{"version": "1.0", "batch": {"max_files": 50}}"#).unwrap();
        assert_eq!(config.batch.max_files, 50);
    }

    #[test]
    fn test_rejects_duplicate_company() {
        let json = r#"{
            "version": "1.0",
            "companies": [
                {"id": "ACME", "name": "Acme"},
                {"id": "ACME", "name": "Acme Again"}
            ]
        }"#;
        let err = load_config_from_str(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate company id"));
    }

    #[test]
    fn test_rejects_invalid_rule_pattern() {
        let json = r#"{
            "version": "1.0",
            "rules": [
                {"id": "r1", "company_id": "ACME", "rule_type": "pattern", "rule_value": "(unclosed"}
            ]
        }"#;
        let err = load_config_from_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref rule_id, .. } if rule_id == "r1"));
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
version: "1.0"
companies:
  - id: ACME
    name: Acme Industries
    aliases: ["ACME"]
detection:
  extraction: parallel
"#;
        let config = load_config_from_yaml_str(yaml).unwrap();
        assert_eq!(config.companies.len(), 1);
        assert_eq!(
            config.detection.extraction,
            crate::config::ExtractionMode::Parallel
        );
    }
}

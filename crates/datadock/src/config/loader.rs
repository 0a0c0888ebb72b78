use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::schema::canonicalize_column;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let error_messages: Vec<String> = compiled
        .iter_errors(json_value)
        .map(|e| format!("{} at {}", e, e.instance_path()))
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Validate version
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let threshold = config.matching.similarity_threshold;
    if !(0.0..=1.0).contains(&threshold) || threshold.is_nan() {
        return Err(ConfigError::Validation {
            message: format!(
                "matching.similarity_threshold must be within [0.0, 1.0], got {}",
                threshold
            ),
        });
    }

    if config.matching.top_k == 0 {
        return Err(ConfigError::Validation {
            message: "matching.top_k must be at least 1".to_string(),
        });
    }

    if config.preview.sample_rows == 0 {
        return Err(ConfigError::Validation {
            message: "preview.sample_rows must be at least 1".to_string(),
        });
    }

    // Validate aliases: both sides must survive canonicalization, and one
    // alias must not resolve to two different columns.
    let mut seen = std::collections::HashMap::new();
    for pair in &config.aliases {
        let alias = canonicalize_column(&pair.alias);
        let column = canonicalize_column(&pair.column);
        if alias.is_empty() {
            return Err(ConfigError::InvalidAlias {
                alias: pair.alias.clone(),
                reason: "alias canonicalizes to an empty name".to_string(),
            });
        }
        if column.is_empty() {
            return Err(ConfigError::InvalidAlias {
                alias: pair.alias.clone(),
                reason: format!("target column '{}' canonicalizes to an empty name", pair.column),
            });
        }
        if let Some(previous) = seen.insert(alias.clone(), column.clone()) {
            if previous != column {
                return Err(ConfigError::InvalidAlias {
                    alias: pair.alias.clone(),
                    reason: format!(
                        "alias maps to both '{}' and '{}'",
                        previous, column
                    ),
                });
            }
        }
    }

    Ok(())
}

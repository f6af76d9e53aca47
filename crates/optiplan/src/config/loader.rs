use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

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

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.export_directory.trim().is_empty() {
        return Err(invalid("export_directory must not be empty"));
    }
    if config.worker_count == 0 {
        return Err(invalid("worker_count must be > 0"));
    }

    let positive = [
        ("outbox.interval_secs", config.outbox.interval_secs),
        ("outbox.dispatch_timeout_secs", config.outbox.dispatch_timeout_secs),
        ("outbox.max_retries", u64::from(config.outbox.max_retries)),
        ("reminders.interval_secs", config.reminders.interval_secs),
        ("pricing.max_upload_bytes", config.pricing.max_upload_bytes as u64),
        ("pricing.device_max_bytes", config.pricing.device_max_bytes as u64),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(invalid(&format!("{} must be > 0", name)));
        }
    }
    if config.reminders.min_gap_hours <= 0 {
        return Err(invalid("reminders.min_gap_hours must be > 0"));
    }
    if config.scan_cooldown_minutes <= 0 {
        return Err(invalid("scan_cooldown_minutes must be > 0"));
    }

    if let Some(url) = &config.outbox.mikro_base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(&format!(
                "outbox.mikro_base_url must be an http(s) URL, got '{}'",
                url
            )));
        }
    }

    config.pricing.columns.validate()?;

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

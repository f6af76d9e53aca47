use serde::{Deserialize, Serialize};

use crate::db::outbox_repo::DEFAULT_MAX_RETRIES;
use crate::outbox::default_permanent_codes;
use crate::pricing::columns::ColumnAliases;
use crate::pricing::device::DEVICE_MAX_BYTES;
use crate::pricing::ingest::MAX_UPLOAD_BYTES;
use crate::reminder::{DEFAULT_MAX_REMINDERS, DEFAULT_MIN_GAP_HOURS};
use crate::scan::DEFAULT_COOLDOWN_MINUTES;
use crate::telemetry::LogFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub export_directory: String,
    /// Defaults to `~/.optiplan/data/optiplan.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default = "default_scan_cooldown_minutes")]
    pub scan_cooldown_minutes: i64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_scan_cooldown_minutes() -> i64 {
    DEFAULT_COOLDOWN_MINUTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["tur".to_string(), "eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
        }
    }
}

/// A secret given inline, as a file path, or as an environment variable name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_device_max_bytes")]
    pub device_max_bytes: usize,
    /// Shared secret presented by scanning devices. Device intake is off
    /// when no source is configured.
    #[serde(default)]
    pub device_secret: SecretSource,
    #[serde(default)]
    pub columns: ColumnAliases,
}

fn default_max_upload_bytes() -> usize {
    MAX_UPLOAD_BYTES
}

fn default_device_max_bytes() -> usize {
    DEVICE_MAX_BYTES
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            device_max_bytes: DEVICE_MAX_BYTES,
            device_secret: SecretSource::default(),
            columns: ColumnAliases::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_outbox_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
    #[serde(default = "default_permanent_codes")]
    pub permanent_codes: Vec<String>,
    /// Accounting bridge; outbox processing is off when unset.
    #[serde(default)]
    pub mikro_base_url: Option<String>,
    #[serde(default)]
    pub mikro_token: SecretSource,
}

fn default_outbox_interval() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_dispatch_timeout() -> u64 {
    10
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_outbox_interval(),
            max_retries: DEFAULT_MAX_RETRIES,
            dispatch_timeout_secs: default_dispatch_timeout(),
            permanent_codes: default_permanent_codes(),
            mikro_base_url: None,
            mikro_token: SecretSource::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reminder_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_max_reminders")]
    pub max_reminders: u32,
    #[serde(default = "default_min_gap_hours")]
    pub min_gap_hours: i64,
}

fn default_reminder_interval() -> u64 {
    3600
}

fn default_max_reminders() -> u32 {
    DEFAULT_MAX_REMINDERS
}

fn default_min_gap_hours() -> i64 {
    DEFAULT_MIN_GAP_HOURS
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reminder_interval(),
            max_reminders: DEFAULT_MAX_REMINDERS,
            min_gap_hours: DEFAULT_MIN_GAP_HOURS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    #[serde(default)]
    pub filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: Config = serde_json::from_str(
            r#"{ "version": "1.0", "export_directory": "/srv/exports" }"#,
        )
        .unwrap();

        assert!(config.worker_count > 0);
        assert!(config.database_path.is_none());
        assert_eq!(config.ocr.languages, vec!["tur", "eng"]);
        assert_eq!(config.ocr.dpi, 300);
        assert_eq!(config.pricing.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.pricing.device_max_bytes, 25 * 1024 * 1024);
        assert_eq!(config.outbox.interval_secs, 300);
        assert_eq!(config.outbox.max_retries, 5);
        assert!(config
            .outbox
            .permanent_codes
            .contains(&"E_MIKRO_READ_ONLY".to_string()));
        assert_eq!(config.reminders.max_reminders, 5);
        assert_eq!(config.reminders.min_gap_hours, 48);
        assert_eq!(config.scan_cooldown_minutes, 30);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_secret_source_camel_case() {
        let source: SecretSource =
            serde_json::from_str(r#"{ "envVar": "DEVICE_SECRET" }"#).unwrap();
        assert_eq!(source.env_var.as_deref(), Some("DEVICE_SECRET"));
        assert!(source.value.is_none());
    }
}

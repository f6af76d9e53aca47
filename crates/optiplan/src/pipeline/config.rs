use std::path::PathBuf;

use crate::config::Config;
use crate::db::outbox_repo::DEFAULT_MAX_RETRIES;

pub struct PipelineConfig {
    pub export_directory: PathBuf,
    /// Retry budget given to the outbox items an export enqueues.
    pub outbox_max_retries: u32,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            export_directory: config.export_path(),
            outbox_max_retries: config.outbox.max_retries,
        }
    }

    pub fn with_export_directory(export_directory: impl Into<PathBuf>) -> Self {
        Self {
            export_directory: export_directory.into(),
            outbox_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

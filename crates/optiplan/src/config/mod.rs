pub mod loader;
pub mod schema;
pub mod secret;

use std::path::PathBuf;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    Config, LoggingConfig, OcrConfig, OutboxConfig, PricingConfig, ReminderConfig, SecretSource,
};

impl Config {
    pub fn export_path(&self) -> PathBuf {
        expand_home(&self.export_directory)
    }

    pub fn database_file(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(expand_home(path)),
            None => crate::db::default_database_path(),
        }
    }
}

/// Expands a leading `~` to the home directory. `~user` is not supported.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

//! Secret resolution: inline value, then file, then environment variable.

use secrecy::SecretString;

use super::expand_home;
use super::schema::SecretSource;
use crate::error::ConfigError;

impl SecretSource {
    pub fn is_configured(&self) -> bool {
        [&self.value, &self.file, &self.env_var]
            .iter()
            .any(|s| s.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Returns `None` when no source is configured. A configured source that
    /// cannot be read is an error, as is a source that resolves to blank.
    pub fn resolve(&self, name: &str) -> Result<Option<SecretString>, ConfigError> {
        if let Some(value) = non_empty(&self.value) {
            return Ok(Some(SecretString::from(value)));
        }

        if let Some(path) = non_empty(&self.file) {
            let expanded = expand_home(path);
            let content = std::fs::read_to_string(&expanded).map_err(|e| ConfigError::Secret {
                name: name.to_string(),
                reason: format!("{}: {}", expanded.display(), e),
            })?;
            return non_blank(name, content.trim()).map(Some);
        }

        if let Some(var) = non_empty(&self.env_var) {
            let value = std::env::var(var).map_err(|e| ConfigError::Secret {
                name: name.to_string(),
                reason: format!("environment variable '{}': {}", var, e),
            })?;
            return non_blank(name, value.trim()).map(Some);
        }

        Ok(None)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn non_blank(name: &str, value: &str) -> Result<SecretString, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Secret {
            name: name.to_string(),
            reason: "resolved to an empty value".to_string(),
        });
    }
    Ok(SecretString::from(value))
}

//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{DeployLockError, Result};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(DeployLockError::ConfigError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployLockError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path` if the file exists, otherwise use defaults.
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            DeployLockError::ConfigError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - branch names, the lock suffix, and the lock file must be non-empty
    /// - `global_lock_branch` and `lock_suffix` must not contain whitespace
    /// - `unlock_trigger` must be non-empty
    /// - `lock_file` must be a top-level file name (no `/`)
    /// - `lock_write_attempts` must be positive
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("global_lock_branch", &self.global_lock_branch),
            ("lock_suffix", &self.lock_suffix),
            ("lock_file", &self.lock_file),
            ("default_branch", &self.default_branch),
            ("unlock_trigger", &self.unlock_trigger),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(DeployLockError::ConfigError(format!(
                    "config validation failed: {} must be non-empty",
                    name
                )));
            }
        }

        for (name, value) in [
            ("global_lock_branch", &self.global_lock_branch),
            ("lock_suffix", &self.lock_suffix),
        ] {
            if value.chars().any(char::is_whitespace) {
                return Err(DeployLockError::ConfigError(format!(
                    "config validation failed: {} must not contain whitespace (found '{}')",
                    name, value
                )));
            }
        }

        if self.lock_file.contains('/') {
            return Err(DeployLockError::ConfigError(format!(
                "config validation failed: lock_file must be a top-level file name (found '{}')",
                self.lock_file
            )));
        }

        if self.lock_write_attempts == 0 {
            return Err(DeployLockError::ConfigError(
                "config validation failed: lock_write_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fixed delay between lock-file write attempts.
    pub fn lock_write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_write_retry_delay_ms)
    }

    /// Build the link recorded in a lock: the owning pull request plus comment anchor.
    pub fn lock_link(&self, pr_number: Option<u64>, comment_id: Option<u64>) -> String {
        let base = format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.repository
        );
        match (pr_number, comment_id) {
            (Some(pr), Some(comment)) => format!("{}/pull/{}#issuecomment-{}", base, pr, comment),
            (Some(pr), None) => format!("{}/pull/{}", base, pr),
            (None, _) => base,
        }
    }
}

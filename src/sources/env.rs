//! Environment variable settings source.

use super::SettingsSource;
use crate::error::{HotswapError, Result};
use config::Environment;
use std::collections::HashMap;

/// Reads settings from prefixed environment variables.
///
/// The prefix is followed by a single `_`; nested keys are joined with the
/// separator.
///
/// # Examples
///
/// ```rust
/// use cfn_hotswap::sources::EnvSource;
///
/// // HOTSWAP_CONCURRENCY__PER_SERVICE=4 -> concurrency.per_service = 4
/// let source = EnvSource::new("HOTSWAP", "__");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvSource {
    /// Create an environment source with priority 300.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl SettingsSource for EnvSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let environment = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true);

        let settings = config::Config::builder()
            .add_source(environment)
            .build()
            .map_err(|e| {
                HotswapError::SettingsLoad(format!("Failed to load environment variables: {e}"))
            })?;

        settings
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| {
                HotswapError::SettingsDeserialize(format!(
                    "Failed to parse environment variables: {e}"
                ))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // env var manipulation
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_source_creation() {
        let source = EnvSource::new("HOTSWAP", "__");
        assert_eq!(source.prefix, "HOTSWAP");
        assert_eq!(source.separator, "__");
        assert_eq!(source.priority(), 300);
        assert_eq!(source.name(), "env:HOTSWAP*");
    }

    #[test]
    fn test_load_nested_variable() {
        unsafe {
            env::set_var("TEST_ENVSRC_CONCURRENCY__PER_SERVICE", "7");
        }

        let values = EnvSource::new("TEST_ENVSRC", "__").load().unwrap();
        let concurrency = values
            .get("concurrency")
            .cloned()
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(concurrency["per_service"].clone().into_int().unwrap(), 7);

        unsafe {
            env::remove_var("TEST_ENVSRC_CONCURRENCY__PER_SERVICE");
        }
    }

    #[test]
    fn test_load_without_matching_variables() {
        let values = EnvSource::new("TEST_ENVSRC_NONEXISTENT", "__").load().unwrap();
        assert!(values.is_empty());
    }
}

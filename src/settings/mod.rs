//! Engine settings.
//!
//! Every field except the target account and region has a default. Settings
//! are usually loaded through [`SettingsLoader`] from a file plus
//! `HOTSWAP_*` environment overrides:
//!
//! ```yaml
//! mode: hotswap-only
//! environment:
//!   account: "123456789012"
//!   region: eu-west-1
//! concurrency:
//!   per_service: 4
//! lambda_waiter:
//!   slow:
//!     max_wait_secs: 600
//! ```

mod loader;

pub use loader::SettingsLoader;

use crate::clients::WaiterConfig;
use crate::core::HotswapMode;
use crate::error::{HotswapError, Result};
use crate::evaluate::{StackEnvironment, default_url_suffix};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of a [`HotswapDeployer`](crate::core::HotswapDeployer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotswapSettings {
    /// Default mode for requests that do not set one.
    pub mode: HotswapMode,
    /// Account, region and partition of the target stacks.
    pub environment: EnvironmentSettings,
    /// Execution concurrency limits.
    pub concurrency: ConcurrencySettings,
    /// Lambda function-updated waiter schedules.
    pub lambda_waiter: LambdaWaiterSettings,
}

impl HotswapSettings {
    /// Check that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::SettingsValidation`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency.per_service == 0 {
            return Err(HotswapError::SettingsValidation(
                "concurrency.per_service: must be greater than 0".to_string(),
            ));
        }
        self.lambda_waiter.standard.validate("lambda_waiter.standard")?;
        self.lambda_waiter.slow.validate("lambda_waiter.slow")?;
        self.environment.validate()
    }
}

/// Where the target stacks are deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// AWS account ID.
    pub account: String,
    /// AWS region.
    pub region: String,
    /// AWS partition.
    pub partition: String,
    /// Endpoint URL suffix; derived from the partition when unset.
    pub url_suffix: Option<String>,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            account: String::new(),
            region: String::new(),
            partition: "aws".to_string(),
            url_suffix: None,
        }
    }
}

impl EnvironmentSettings {
    // pseudo parameters and ARNs are built from these
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("environment.account", &self.account),
            ("environment.region", &self.region),
            ("environment.partition", &self.partition),
        ] {
            if value.trim().is_empty() {
                return Err(HotswapError::SettingsValidation(format!(
                    "{field}: must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// The pseudo parameter values these settings describe.
    pub fn stack_environment(&self) -> StackEnvironment {
        let environment = StackEnvironment::new(&self.account, &self.region)
            .with_partition(&self.partition);
        match &self.url_suffix {
            Some(suffix) => environment.with_url_suffix(suffix),
            None => environment,
        }
    }

    /// The URL suffix in effect.
    pub fn effective_url_suffix(&self) -> &str {
        self.url_suffix
            .as_deref()
            .unwrap_or_else(|| default_url_suffix(&self.partition))
    }
}

/// Execution concurrency limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Maximum operations in flight per AWS service.
    pub per_service: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self { per_service: 10 }
    }
}

/// Waiter schedules for Lambda updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LambdaWaiterSettings {
    /// Schedule for ordinary functions.
    pub standard: WaiterSettings,
    /// Schedule for VPC-attached and container image functions.
    pub slow: WaiterSettings,
}

impl Default for LambdaWaiterSettings {
    fn default() -> Self {
        Self {
            standard: WaiterSettings {
                min_delay_secs: 1,
                max_delay_secs: 1,
                max_wait_secs: 60,
            },
            slow: WaiterSettings {
                min_delay_secs: 5,
                max_delay_secs: 5,
                max_wait_secs: 300,
            },
        }
    }
}

/// One waiter schedule, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterSettings {
    /// Delay before the second poll.
    pub min_delay_secs: u64,
    /// Upper bound of the delay between polls.
    pub max_delay_secs: u64,
    /// Total time before giving up.
    pub max_wait_secs: u64,
}

impl WaiterSettings {
    fn validate(&self, field: &str) -> Result<()> {
        if self.min_delay_secs > self.max_delay_secs {
            return Err(HotswapError::SettingsValidation(format!(
                "{field}: min_delay_secs must not exceed max_delay_secs"
            )));
        }
        if self.max_wait_secs == 0 {
            return Err(HotswapError::SettingsValidation(format!(
                "{field}: max_wait_secs must be greater than 0"
            )));
        }
        Ok(())
    }
}

impl From<WaiterSettings> for WaiterConfig {
    fn from(settings: WaiterSettings) -> Self {
        Self {
            min_delay: Duration::from_secs(settings.min_delay_secs),
            max_delay: Duration::from_secs(settings.max_delay_secs),
            max_wait: Duration::from_secs(settings.max_wait_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployable() -> HotswapSettings {
        let mut settings = HotswapSettings::default();
        settings.environment.account = "123456789012".to_string();
        settings.environment.region = "eu-west-1".to_string();
        settings
    }

    #[test]
    fn test_defaults() {
        let settings = HotswapSettings::default();
        assert_eq!(settings.mode, HotswapMode::FallBack);
        assert_eq!(settings.concurrency.per_service, 10);
        assert_eq!(WaiterConfig::from(settings.lambda_waiter.standard), WaiterConfig::standard());
        assert_eq!(WaiterConfig::from(settings.lambda_waiter.slow), WaiterConfig::slow());
        assert!(deployable().validate().is_ok());
    }

    #[test]
    fn test_environment_is_required() {
        let err = HotswapSettings::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Settings validation failed: environment.account: must not be empty"
        );

        let mut settings = deployable();
        settings.environment.region = " ".to_string();
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Settings validation failed: environment.region: must not be empty"
        );

        let mut settings = deployable();
        settings.environment.partition.clear();
        assert!(matches!(
            settings.validate(),
            Err(HotswapError::SettingsValidation(_))
        ));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let settings: HotswapSettings = serde_json::from_str(
            r#"{ "mode": "hotswap-only", "lambda_waiter": { "slow": { "min_delay_secs": 2, "max_delay_secs": 10, "max_wait_secs": 600 } } }"#,
        )
        .unwrap();
        assert_eq!(settings.mode, HotswapMode::HotswapOnly);
        assert_eq!(settings.lambda_waiter.standard.max_wait_secs, 60);
        assert_eq!(settings.lambda_waiter.slow.max_wait_secs, 600);
        assert_eq!(settings.environment.partition, "aws");
    }

    #[test]
    fn test_validation() {
        let mut settings = deployable();
        settings.concurrency.per_service = 0;
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Settings validation failed: concurrency.per_service: must be greater than 0"
        );

        let mut settings = deployable();
        settings.lambda_waiter.slow.min_delay_secs = 10;
        assert!(settings.validate().is_err());

        let mut settings = deployable();
        settings.lambda_waiter.standard.max_wait_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_stack_environment() {
        let environment = EnvironmentSettings {
            account: "123456789012".to_string(),
            region: "cn-north-1".to_string(),
            partition: "aws-cn".to_string(),
            url_suffix: None,
        };
        assert_eq!(environment.effective_url_suffix(), "amazonaws.com.cn");
        let stack_environment = environment.stack_environment();
        assert_eq!(stack_environment.pseudo_parameter("AWS::URLSuffix"), Some("amazonaws.com.cn"));
        assert_eq!(stack_environment.pseudo_parameter("AWS::AccountId"), Some("123456789012"));
    }
}

//! Builder for constructing HotswapDeployer instances.

use super::HotswapDeployer;
use crate::clients::{
    CloudFormationApi, CodeBuildApi, LambdaApi, NestedTemplateSource, ServiceClients,
    StepFunctionsApi,
};
use crate::error::Result;
use crate::settings::{HotswapSettings, SettingsLoader};
use crate::sources::{EnvSource, FileSource, SettingsSource};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::HotswapMetrics;

/// Builder for a [`HotswapDeployer`].
///
/// Settings come from explicit [`HotswapSettings`], or from settings files and
/// environment overrides merged by priority. With neither, the defaults apply,
/// which do not name a target account or region and so fail validation.
///
/// # Examples
///
/// ```rust,no_run
/// use cfn_hotswap::prelude::*;
/// # use std::sync::Arc;
///
/// # async fn example(cloudformation: Arc<dyn CloudFormationApi>) -> Result<()> {
/// let deployer = HotswapDeployer::builder()
///     .with_cloudformation(cloudformation)
///     .with_settings_file("hotswap/default.yaml")
///     .with_settings_file("hotswap/ci.yaml")
///     .with_env_overrides("HOTSWAP", "__")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct HotswapDeployerBuilder {
    clients: ServiceClients,
    settings: Option<HotswapSettings>,
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    custom_sources: Vec<Box<dyn SettingsSource>>,
    #[cfg(feature = "metrics")]
    metrics: Option<HotswapMetrics>,
}

impl HotswapDeployerBuilder {
    /// Create a new builder without clients.
    pub fn new() -> Self {
        Self {
            clients: ServiceClients::default(),
            settings: None,
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: None,
            custom_sources: Vec::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the Lambda client.
    pub fn with_lambda(mut self, client: Arc<dyn LambdaApi>) -> Self {
        self.clients.lambda = Some(client);
        self
    }

    /// Set the CodeBuild client.
    pub fn with_codebuild(mut self, client: Arc<dyn CodeBuildApi>) -> Self {
        self.clients.codebuild = Some(client);
        self
    }

    /// Set the Step Functions client.
    pub fn with_stepfunctions(mut self, client: Arc<dyn StepFunctionsApi>) -> Self {
        self.clients.stepfunctions = Some(client);
        self
    }

    /// Set the CloudFormation client.
    pub fn with_cloudformation(mut self, client: Arc<dyn CloudFormationApi>) -> Self {
        self.clients.cloudformation = Some(client);
        self
    }

    /// Set where generated templates of nested stacks come from.
    ///
    /// Without a source, modified nested stacks need a full deployment.
    pub fn with_nested_templates(mut self, source: Arc<dyn NestedTemplateSource>) -> Self {
        self.clients.nested_templates = Some(source);
        self
    }

    /// Use these settings; files and environment overrides are then ignored.
    pub fn with_settings(mut self, settings: HotswapSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Add a settings file (YAML, TOML or JSON).
    ///
    /// Later files override earlier ones.
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Read settings overrides from environment variables.
    ///
    /// Environment variables have the highest priority (300).
    ///
    /// ```rust,no_run
    /// use cfn_hotswap::prelude::*;
    ///
    /// // HOTSWAP_CONCURRENCY__PER_SERVICE=4 -> concurrency.per_service = 4
    /// HotswapDeployer::builder().with_env_overrides("HOTSWAP", "__");
    /// ```
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Add a custom settings source.
    pub fn with_source<S: SettingsSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Box::new(source));
        self
    }

    /// Record attempts and operations with OpenTelemetry.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(HotswapMetrics::new(meter));
        self
    }

    /// Build the deployer.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings source fails to load, the merged
    /// settings do not deserialize, or validation fails.
    pub async fn build(self) -> Result<HotswapDeployer> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => load_settings(
                self.file_paths,
                self.custom_sources,
                self.env_prefix.zip(self.env_separator),
            )?,
        };
        settings.validate()?;
        tracing::debug!(?settings, clients = ?self.clients, "built hotswap deployer");

        Ok(HotswapDeployer {
            clients: self.clients,
            settings,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        })
    }
}

impl Default for HotswapDeployerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn load_settings(
    file_paths: Vec<PathBuf>,
    custom_sources: Vec<Box<dyn SettingsSource>>,
    env: Option<(String, String)>,
) -> Result<HotswapSettings> {
    let mut loader = SettingsLoader::new();

    for (index, path) in file_paths.into_iter().enumerate() {
        let priority = 100 + (index as i32 * 10);
        loader.add_source(Box::new(FileSource::new(path).with_priority(priority)));
    }
    for source in custom_sources {
        loader.add_source(source);
    }
    if let Some((prefix, separator)) = env {
        loader.add_source(Box::new(EnvSource::new(prefix, separator)));
    }

    if loader.is_empty() {
        return Ok(HotswapSettings::default());
    }
    loader.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HotswapMode;
    use crate::error::HotswapError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builder_accumulates_files() {
        let builder = HotswapDeployerBuilder::new()
            .with_settings_file("hotswap1.yaml")
            .with_settings_file("hotswap2.yaml");
        assert_eq!(builder.file_paths.len(), 2);
    }

    #[test]
    fn test_builder_env_overrides() {
        let builder = HotswapDeployerBuilder::new().with_env_overrides("HOTSWAP", "__");
        assert_eq!(builder.env_prefix, Some("HOTSWAP".to_string()));
        assert_eq!(builder.env_separator, Some("__".to_string()));
    }

    #[tokio::test]
    async fn test_build_without_environment_fails() {
        let err = HotswapDeployerBuilder::new().build().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Settings validation failed: environment.account: must not be empty"
        );
    }

    #[tokio::test]
    async fn test_build_with_explicit_settings() {
        let mut settings = HotswapSettings::default();
        settings.environment.account = "123456789012".to_string();
        settings.environment.region = "eu-west-1".to_string();
        let deployer = HotswapDeployerBuilder::new()
            .with_settings(settings.clone())
            .build()
            .await
            .unwrap();
        assert_eq!(deployer.settings(), &settings);
        assert!(deployer.clients().lambda().is_err());
    }

    #[tokio::test]
    async fn test_later_files_override() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.yaml");
        let ci = dir.path().join("ci.json");
        fs::write(
            &base,
            "mode: fall-back\nenvironment:\n  account: \"123456789012\"\n  region: eu-west-1\nconcurrency:\n  per_service: 3\n",
        )
        .unwrap();
        fs::write(&ci, r#"{ "mode": "hotswap-only" }"#).unwrap();

        let deployer = HotswapDeployerBuilder::new()
            .with_settings_file(&base)
            .with_settings_file(&ci)
            .build()
            .await
            .unwrap();
        assert_eq!(deployer.settings().mode, HotswapMode::HotswapOnly);
        assert_eq!(deployer.settings().concurrency.per_service, 3);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let mut settings = HotswapSettings::default();
        settings.concurrency.per_service = 0;
        let err = HotswapDeployerBuilder::new()
            .with_settings(settings)
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, HotswapError::SettingsValidation(_)));
    }
}

//! Settings files.

use super::SettingsSource;
use crate::error::{HotswapError, Result};
use config::{File, FileFormat};
use std::collections::HashMap;
use std::path::PathBuf;

/// A hotswap settings file in YAML, TOML or JSON.
///
/// The format is picked from the extension, so `hotswap.yml` and
/// `hotswap.toml` can live side by side in one project.
///
/// # Examples
///
/// ```rust,no_run
/// use cfn_hotswap::sources::FileSource;
///
/// let source = FileSource::new("hotswap.yaml");
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
}

impl FileSource {
    /// Create a file source with priority 100.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn format(&self) -> Result<FileFormat> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(FileFormat::Yaml),
            Some("toml") => Ok(FileFormat::Toml),
            Some("json") => Ok(FileFormat::Json),
            _ => Err(HotswapError::SettingsLoad(format!(
                "hotswap settings file '{}' must end in .yaml, .yml, .toml or .json",
                self.path.display()
            ))),
        }
    }
}

impl SettingsSource for FileSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let format = self.format()?;
        if !self.path.is_file() {
            return Err(HotswapError::SettingsLoad(format!(
                "hotswap settings file '{}' does not exist",
                self.path.display()
            )));
        }

        let path = self.path.display().to_string();
        config::Config::builder()
            .add_source(File::new(&path, format))
            .build()
            .and_then(|settings| settings.try_deserialize::<HashMap<String, config::Value>>())
            .map_err(|e| {
                HotswapError::SettingsLoad(format!("cannot read hotswap settings from '{path}': {e}"))
            })
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

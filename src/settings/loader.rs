//! Settings loader that merges multiple sources.

use crate::error::{HotswapError, Result};
use crate::sources::SettingsSource;
use config::ValueKind;
use serde::de::DeserializeOwned;

/// Loads and merges settings from multiple sources.
///
/// Sources are applied in priority order, lowest first, so higher priority
/// sources override. Tables are merged leaf by leaf: an environment variable
/// for `concurrency.per_service` leaves the rest of `concurrency` as the file
/// set it.
pub struct SettingsLoader {
    sources: Vec<Box<dyn SettingsSource>>,
}

impl SettingsLoader {
    /// Create a loader without sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a settings source.
    pub fn add_source(&mut self, source: Box<dyn SettingsSource>) {
        self.sources.push(source);
    }

    /// Whether no source was added.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Load and merge settings from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no sources, any source fails to load,
    /// or the merged values do not deserialize into `T`.
    pub fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if self.sources.is_empty() {
            return Err(HotswapError::SettingsLoad(
                "No settings sources specified".to_string(),
            ));
        }

        let mut builder = config::Config::builder();
        for source in self.sorted_sources() {
            let values = source.load().map_err(|e| {
                HotswapError::SettingsLoad(format!("Failed to load source '{}': {e}", source.name()))
            })?;

            let mut leaves = Vec::new();
            for (key, value) in values {
                flatten(key, value, &mut leaves);
            }
            for (key, value) in leaves {
                builder = builder.set_override(&key, value).map_err(|e| {
                    HotswapError::SettingsLoad(format!(
                        "Failed to merge source '{}': {e}",
                        source.name()
                    ))
                })?;
            }
        }

        let settings = builder
            .build()
            .map_err(|e| HotswapError::SettingsLoad(format!("Failed to build settings: {e}")))?;

        settings.try_deserialize::<T>().map_err(|e| {
            HotswapError::SettingsDeserialize(format!("Failed to deserialize settings: {e}"))
        })
    }

    /// Source names in the order they are applied.
    pub fn source_names(&self) -> Vec<String> {
        self.sorted_sources().iter().map(|s| s.name()).collect()
    }

    fn sorted_sources(&self) -> Vec<&dyn SettingsSource> {
        let mut sorted: Vec<&dyn SettingsSource> = self.sources.iter().map(|s| s.as_ref()).collect();
        sorted.sort_by_key(|s| s.priority());
        sorted
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand nested tables into dotted leaf keys.
fn flatten(key: String, value: config::Value, leaves: &mut Vec<(String, config::Value)>) {
    match value.kind {
        ValueKind::Table(table) if !table.is_empty() => {
            for (child, value) in table {
                flatten(format!("{key}.{child}"), value, leaves);
            }
        }
        kind => leaves.push((key, config::Value::new(None, kind))),
    }
}

//! Settings source trait.

use crate::error::Result;
use std::collections::HashMap;

/// A place engine settings can be read from.
///
/// Implement this trait to feed settings from somewhere other than files
/// and environment variables.
pub trait SettingsSource: Send + Sync {
    /// Load settings as a raw key-value map.
    ///
    /// Nested tables are allowed; the loader merges them leaf by leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// A human-readable name for this source, used in error messages.
    fn name(&self) -> String;

    /// Priority of this source; higher values take precedence.
    ///
    /// Defaults: files 100 and up, environment variables 300.
    fn priority(&self) -> i32 {
        100
    }
}

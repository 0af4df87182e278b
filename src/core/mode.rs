//! Attempt inputs and outputs.

use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What to do with changes that cannot be hotswapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HotswapMode {
    /// Any non-hotswappable change aborts the attempt; the caller runs a
    /// full deployment instead.
    #[default]
    FallBack,
    /// Apply whatever can be hotswapped and ignore the rest.
    HotswapOnly,
}

impl fmt::Display for HotswapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FallBack => f.write_str("fall-back"),
            Self::HotswapOnly => f.write_str("hotswap-only"),
        }
    }
}

/// Result of an attempt that took the hotswap path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployResult {
    /// No service API call was needed.
    pub no_op: bool,
    /// Display names of the resources that were updated.
    pub hotswapped_resources: Vec<String>,
}

impl DeployResult {
    /// A result without any updates.
    pub fn no_op() -> Self {
        Self {
            no_op: true,
            hotswapped_resources: Vec::new(),
        }
    }
}

/// One hotswap attempt against a deployed stack.
#[derive(Debug, Clone, PartialEq)]
pub struct HotswapRequest {
    /// Name of the deployed root stack.
    pub stack_name: String,
    /// Newly synthesized root template.
    pub template: Template,
    /// Parameter values that override the stack's current values.
    pub parameters: BTreeMap<String, String>,
    /// Mode for this attempt; the settings' mode when unset.
    pub mode: Option<HotswapMode>,
}

impl HotswapRequest {
    /// Create a request without parameter overrides.
    pub fn new(stack_name: impl Into<String>, template: Template) -> Self {
        Self {
            stack_name: stack_name.into(),
            template,
            parameters: BTreeMap::new(),
            mode: None,
        }
    }

    /// Override one parameter value.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set the mode for this attempt.
    pub fn with_mode(mut self, mode: HotswapMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&HotswapMode::FallBack).unwrap(), "\"fall-back\"");
        let mode: HotswapMode = serde_json::from_str("\"hotswap-only\"").unwrap();
        assert_eq!(mode, HotswapMode::HotswapOnly);
        assert_eq!(mode.to_string(), "hotswap-only");
        assert_eq!(HotswapMode::default(), HotswapMode::FallBack);
    }

    #[test]
    fn test_request_builder() {
        let request = HotswapRequest::new("stack", Template::default())
            .with_parameter("AssetKey", "new.zip")
            .with_mode(HotswapMode::HotswapOnly);
        assert_eq!(request.parameters["AssetKey"], "new.zip");
        assert_eq!(request.mode, Some(HotswapMode::HotswapOnly));
    }
}

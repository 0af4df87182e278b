//! CloudFormation template model.
//!
//! Only the sections the hotswap engine reads are modelled: `Parameters`,
//! `Resources` and `Outputs`. Property values stay as raw JSON trees because
//! they may contain intrinsic function nodes that are only resolved later.

mod summary;

pub use summary::{ResourceSummary, StackResources};

use crate::error::{HotswapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Resource type of CloudFormation nested stacks.
pub const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// Metadata key the CDK uses to record the local asset path of a nested template.
pub const ASSET_PATH_METADATA: &str = "aws:asset:path";

/// A CloudFormation template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Declared template parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterDeclaration>,

    /// Resources keyed by logical ID.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDefinition>,

    /// Stack outputs keyed by output name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputDefinition>,
}

/// A single resource node of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDefinition {
    /// The resource type, e.g. `AWS::Lambda::Function`.
    #[serde(rename = "Type")]
    pub resource_type: String,

    /// Resource properties, possibly containing intrinsic nodes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Explicit dependencies; a string or a list of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Value>,
}

/// A template parameter declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterDeclaration {
    /// Declared parameter type, e.g. `String`.
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,

    /// Value used when no explicit or current value exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A template output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputDefinition {
    /// The output value expression.
    pub value: Value,

    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Export declaration, if the output is exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Value>,
}

impl Template {
    /// Parse a template from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::TemplateParse`] if the body is not a valid template.
    pub fn from_json_str(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| HotswapError::TemplateParse(e.to_string()))
    }

    /// Parse a template from a YAML document.
    ///
    /// Only the long form of intrinsic functions (`Ref:`, `Fn::GetAtt:`) is
    /// understood; short form tags such as `!Ref` are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::TemplateParse`] if the body is not a valid template.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(body: &str) -> Result<Self> {
        serde_yaml::from_str(body).map_err(|e| HotswapError::TemplateParse(e.to_string()))
    }

    /// Parse a template body that may be either JSON or YAML.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::TemplateParse`] if the body is neither.
    pub fn parse(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        if body.trim_start().starts_with('{') {
            return Self::from_json_str(body);
        }

        #[cfg(feature = "yaml")]
        {
            Self::from_yaml_str(body)
        }

        #[cfg(not(feature = "yaml"))]
        {
            Self::from_json_str(body)
        }
    }

    /// Build a template from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`HotswapError::TemplateParse`] if the value does not have template shape.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| HotswapError::TemplateParse(e.to_string()))
    }

    /// Get a resource by logical ID.
    pub fn resource(&self, logical_id: &str) -> Option<&ResourceDefinition> {
        self.resources.get(logical_id)
    }

    /// Find every resource whose properties reference `logical_id` through
    /// `Ref`, `Fn::GetAtt` or an `Fn::Sub` placeholder.
    pub fn resources_referencing<'a>(
        &'a self,
        logical_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ResourceDefinition)> + 'a {
        self.resources.iter().filter_map(move |(id, resource)| {
            resource
                .properties
                .values()
                .any(|value| references(value, logical_id))
                .then_some((id.as_str(), resource))
        })
    }

    /// Whether any resource or output uses the given intrinsic function.
    pub fn uses_function(&self, function: &str) -> bool {
        self.resources
            .values()
            .flat_map(|r| r.properties.values())
            .chain(self.outputs.values().map(|o| &o.value))
            .any(|value| contains_key(value, function))
    }
}

impl ResourceDefinition {
    /// Create a resource with the given type and properties.
    pub fn new(resource_type: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            metadata: None,
            depends_on: None,
        }
    }

    /// Get a property value.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The `aws:asset:path` metadata entry, set on CDK-managed nested stacks.
    pub fn asset_path(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(ASSET_PATH_METADATA))
            .and_then(Value::as_str)
    }

    /// Whether this resource is a nested stack.
    pub fn is_nested_stack(&self) -> bool {
        self.resource_type == NESTED_STACK_TYPE
    }
}

/// Whether `value` contains a reference to `logical_id`.
pub(crate) fn references(value: &Value, logical_id: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| references(v, logical_id)),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(target) = map.get("Ref") {
                    return target.as_str() == Some(logical_id);
                }
                if let Some(args) = map.get("Fn::GetAtt") {
                    let target = match args {
                        Value::Array(parts) => parts.first().and_then(Value::as_str),
                        Value::String(dotted) => dotted.split('.').next(),
                        _ => None,
                    };
                    if target == Some(logical_id) {
                        return true;
                    }
                }
                if let Some(args) = map.get("Fn::Sub") {
                    let body = match args {
                        Value::Array(parts) => parts.first().and_then(Value::as_str),
                        Value::String(body) => Some(body.as_str()),
                        _ => None,
                    };
                    if body.is_some_and(|b| {
                        b.contains(&format!("${{{logical_id}}}"))
                            || b.contains(&format!("${{{logical_id}."))
                    }) {
                        return true;
                    }
                }
            }
            map.values().any(|v| references(v, logical_id))
        }
        _ => false,
    }
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
        Value::Object(map) => map.contains_key(key) || map.values().any(|v| contains_key(v, key)),
        _ => false,
    }
}

//! Nested stack template sources.

use super::NestedTemplateSource;
use crate::error::{HotswapError, Result};
use crate::template::{ASSET_PATH_METADATA, ResourceDefinition, Template};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where the generated template of a nested stack can be found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedTemplateLocation {
    /// Logical ID of the nested stack resource in its parent.
    pub logical_id: String,
    /// Local asset path recorded in the resource's `aws:asset:path` metadata.
    pub asset_path: Option<String>,
    /// Literal `TemplateURL` of the resource.
    pub template_url: Option<String>,
}

impl NestedTemplateLocation {
    /// Describe the location of the template of a nested stack resource.
    pub fn of(logical_id: impl Into<String>, resource: &ResourceDefinition) -> Self {
        Self {
            logical_id: logical_id.into(),
            asset_path: resource.asset_path().map(str::to_string),
            template_url: resource
                .property("TemplateURL")
                .and_then(|url| url.as_str())
                .map(str::to_string),
        }
    }

    /// The key used to look the template up: the asset path, else the URL.
    pub fn key(&self) -> Option<&str> {
        self.asset_path.as_deref().or(self.template_url.as_deref())
    }
}

/// Reads nested templates from a cloud assembly directory by asset path.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateSource {
    root: PathBuf,
}

impl DirectoryTemplateSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl NestedTemplateSource for DirectoryTemplateSource {
    async fn nested_template(&self, location: &NestedTemplateLocation) -> Result<Option<Template>> {
        let Some(asset_path) = location.asset_path.as_deref() else {
            return Ok(None);
        };
        let path = self.root.join(asset_path);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "nested template file not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Template::parse(&body)
            .map(Some)
            .map_err(|e| HotswapError::NestedStack {
                logical_id: location.logical_id.clone(),
                message: format!("{}: {e}", path.display()),
            })
    }
}

/// Serves nested templates from memory, keyed by asset path or template URL.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateSource {
    templates: BTreeMap<String, Template>,
}

impl StaticTemplateSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under an asset path or URL.
    pub fn with_template(mut self, key: impl Into<String>, template: Template) -> Self {
        self.templates.insert(key.into(), template);
        self
    }
}

#[async_trait]
impl NestedTemplateSource for StaticTemplateSource {
    async fn nested_template(&self, location: &NestedTemplateLocation) -> Result<Option<Template>> {
        Ok(location
            .key()
            .and_then(|key| self.templates.get(key))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn nested_resource() -> ResourceDefinition {
        serde_json::from_value(json!({
            "Type": "AWS::CloudFormation::Stack",
            "Properties": { "TemplateURL": "https://bucket/child.json" },
            "Metadata": { ASSET_PATH_METADATA: "Child.nested.template.json" }
        }))
        .unwrap()
    }

    #[test]
    fn test_location_prefers_asset_path() {
        let location = NestedTemplateLocation::of("Child", &nested_resource());
        assert_eq!(location.key(), Some("Child.nested.template.json"));
        assert_eq!(location.template_url.as_deref(), Some("https://bucket/child.json"));
    }

    #[tokio::test]
    async fn test_directory_source() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("Child.nested.template.json"),
            r#"{ "Resources": { "Func": { "Type": "AWS::Lambda::Function" } } }"#,
        )
        .unwrap();

        let source = DirectoryTemplateSource::new(temp_dir.path());
        let location = NestedTemplateLocation::of("Child", &nested_resource());
        let template = source.nested_template(&location).await.unwrap().unwrap();
        assert!(template.resource("Func").is_some());

        let missing = NestedTemplateLocation {
            logical_id: "Other".to_string(),
            asset_path: Some("Other.nested.template.json".to_string()),
            template_url: None,
        };
        assert!(source.nested_template(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_source_invalid_template() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Child.nested.template.json"), "{ broken").unwrap();

        let source = DirectoryTemplateSource::new(temp_dir.path());
        let location = NestedTemplateLocation::of("Child", &nested_resource());
        let err = source.nested_template(&location).await.unwrap_err();
        assert!(matches!(err, HotswapError::NestedStack { .. }));
    }

    #[tokio::test]
    async fn test_static_source_by_url() {
        let source = StaticTemplateSource::new().with_template("https://bucket/child.json", Template::default());
        let location = NestedTemplateLocation {
            logical_id: "Child".to_string(),
            asset_path: None,
            template_url: Some("https://bucket/child.json".to_string()),
        };
        assert_eq!(
            source.nested_template(&location).await.unwrap(),
            Some(Template::default())
        );
    }
}

//! Structural template differencing.
//!
//! Compares the deployed and synthesized templates of one stack level. Values
//! are compared as raw JSON: intrinsic nodes are compared by shape and are not
//! evaluated here.

use crate::template::{ResourceDefinition, Template};
use json_patch::PatchOperation;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One changed leaf inside a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDiff {
    /// JSON path segments from the diffed root, e.g. `["Code", "S3Key"]`.
    pub path: Vec<String>,
    /// Value before the change; `None` when the leaf was added.
    pub old_value: Option<Value>,
    /// Value after the change; `None` when the leaf was removed.
    pub new_value: Option<Value>,
}

impl PropertyDiff {
    /// The top-level property name this diff belongs to.
    pub fn property_name(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    /// The path rendered with `.` separators.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// How a resource changed between the two templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The resource exists only in the new template.
    Added,
    /// The resource exists only in the old template.
    Removed,
    /// The resource exists in both with the same type.
    Modified,
}

/// The change of one logical resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDiff {
    /// Logical ID of the resource.
    pub logical_id: String,
    /// Resource type; the new type unless the resource was removed.
    pub resource_type: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Definition in the deployed template.
    pub old: Option<ResourceDefinition>,
    /// Definition in the synthesized template.
    pub new: Option<ResourceDefinition>,
    /// Changed leaves under `Properties`.
    pub property_diffs: Vec<PropertyDiff>,
    /// Changed leaves under `Metadata`; never blocking.
    pub metadata_diffs: Vec<PropertyDiff>,
    /// Changed leaves under `DependsOn`; never blocking.
    pub depends_on_diffs: Vec<PropertyDiff>,
}

impl ResourceDiff {
    fn added(logical_id: &str, new: &ResourceDefinition) -> Self {
        Self {
            logical_id: logical_id.to_string(),
            resource_type: new.resource_type.clone(),
            kind: ChangeKind::Added,
            old: None,
            new: Some(new.clone()),
            property_diffs: Vec::new(),
            metadata_diffs: Vec::new(),
            depends_on_diffs: Vec::new(),
        }
    }

    fn removed(logical_id: &str, old: &ResourceDefinition) -> Self {
        Self {
            logical_id: logical_id.to_string(),
            resource_type: old.resource_type.clone(),
            kind: ChangeKind::Removed,
            old: Some(old.clone()),
            new: None,
            property_diffs: Vec::new(),
            metadata_diffs: Vec::new(),
            depends_on_diffs: Vec::new(),
        }
    }

    /// Names of the top-level properties that changed.
    pub fn changed_properties(&self) -> BTreeSet<&str> {
        self.property_diffs.iter().map(PropertyDiff::property_name).collect()
    }

    /// Whether any property changed. Metadata and `DependsOn` do not count.
    pub fn has_property_changes(&self) -> bool {
        !self.property_diffs.is_empty()
    }

    /// The new value of a top-level property.
    pub fn new_property(&self, name: &str) -> Option<&Value> {
        self.new.as_ref().and_then(|r| r.property(name))
    }
}

/// Differences between two templates of one stack level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDiff {
    /// Per-resource changes, ordered by logical ID.
    pub resources: Vec<ResourceDiff>,
    /// Names of outputs that were added, removed or changed.
    pub changed_outputs: Vec<String>,
}

impl TemplateDiff {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.changed_outputs.is_empty()
    }
}

/// Compare the resources of two templates.
///
/// Unchanged resources are omitted. A resource whose `Type` changed is reported
/// as a `Removed` entry followed by an `Added` entry with the same logical ID.
pub fn diff_resources(old: &Template, new: &Template) -> Vec<ResourceDiff> {
    let logical_ids: BTreeSet<&String> = old.resources.keys().chain(new.resources.keys()).collect();

    let mut diffs = Vec::new();
    for logical_id in logical_ids {
        match (old.resources.get(logical_id), new.resources.get(logical_id)) {
            (None, Some(new)) => diffs.push(ResourceDiff::added(logical_id, new)),
            (Some(old), None) => diffs.push(ResourceDiff::removed(logical_id, old)),
            (Some(old), Some(new)) if old.resource_type != new.resource_type => {
                diffs.push(ResourceDiff::removed(logical_id, old));
                diffs.push(ResourceDiff::added(logical_id, new));
            }
            (Some(old), Some(new)) => {
                if let Some(diff) = diff_resource(logical_id, old, new) {
                    diffs.push(diff);
                }
            }
            (None, None) => {}
        }
    }
    diffs
}

/// Compare two templates: resources and outputs.
pub fn diff_templates(old: &Template, new: &Template) -> TemplateDiff {
    let output_names: BTreeSet<&String> = old.outputs.keys().chain(new.outputs.keys()).collect();
    let changed_outputs = output_names
        .into_iter()
        .filter(|name| old.outputs.get(*name) != new.outputs.get(*name))
        .cloned()
        .collect();

    TemplateDiff {
        resources: diff_resources(old, new),
        changed_outputs,
    }
}

fn diff_resource(
    logical_id: &str,
    old: &ResourceDefinition,
    new: &ResourceDefinition,
) -> Option<ResourceDiff> {
    let property_diffs = diff_values(
        &Value::Object(old.properties.clone()),
        &Value::Object(new.properties.clone()),
    );
    let metadata_diffs = diff_optional(old.metadata.as_ref(), new.metadata.as_ref());
    let depends_on_diffs = diff_optional(old.depends_on.as_ref(), new.depends_on.as_ref());

    if property_diffs.is_empty() && metadata_diffs.is_empty() && depends_on_diffs.is_empty() {
        return None;
    }

    Some(ResourceDiff {
        logical_id: logical_id.to_string(),
        resource_type: new.resource_type.clone(),
        kind: ChangeKind::Modified,
        old: Some(old.clone()),
        new: Some(new.clone()),
        property_diffs,
        metadata_diffs,
        depends_on_diffs,
    })
}

fn diff_optional(old: Option<&Value>, new: Option<&Value>) -> Vec<PropertyDiff> {
    match (old, new) {
        (None, None) => Vec::new(),
        (old, new) => diff_values(old.unwrap_or(&Value::Null), new.unwrap_or(&Value::Null)),
    }
}

/// Leaf-level differences between two JSON values.
pub fn diff_values(old: &Value, new: &Value) -> Vec<PropertyDiff> {
    let patch = json_patch::diff(old, new);

    // one entry per path; the patch may touch a path more than once
    let mut by_path: BTreeMap<Vec<String>, PropertyDiff> = BTreeMap::new();
    for operation in patch.0.iter() {
        let pointer = match operation {
            PatchOperation::Add(op) => op.path.to_string(),
            PatchOperation::Remove(op) => op.path.to_string(),
            PatchOperation::Replace(op) => op.path.to_string(),
            _ => continue,
        };
        let path = pointer_segments(&pointer);
        by_path.entry(path.clone()).or_insert_with(|| PropertyDiff {
            path,
            old_value: old.pointer(&pointer).cloned(),
            new_value: new.pointer(&pointer).cloned(),
        });
    }
    by_path.into_values().collect()
}

/// Split an RFC 6901 pointer into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

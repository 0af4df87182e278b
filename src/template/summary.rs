//! Live stack resource listings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resource that currently exists in a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// Template-local name of the resource.
    pub logical_id: String,
    /// CloudFormation resource type.
    pub resource_type: String,
    /// Identifier of the actual cloud resource.
    pub physical_id: String,
}

impl ResourceSummary {
    /// Create a new resource summary.
    pub fn new(
        logical_id: impl Into<String>,
        resource_type: impl Into<String>,
        physical_id: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            physical_id: physical_id.into(),
        }
    }
}

/// Read-only snapshot of the resources of one deployed stack, indexed by logical ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackResources {
    by_logical_id: BTreeMap<String, ResourceSummary>,
}

impl StackResources {
    /// Create an empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resource by logical ID.
    pub fn get(&self, logical_id: &str) -> Option<&ResourceSummary> {
        self.by_logical_id.get(logical_id)
    }

    /// Physical ID of the resource with the given logical ID.
    pub fn physical_id(&self, logical_id: &str) -> Option<&str> {
        self.get(logical_id).map(|r| r.physical_id.as_str())
    }

    /// Number of resources in the listing.
    pub fn len(&self) -> usize {
        self.by_logical_id.len()
    }

    /// Whether the listing is empty.
    pub fn is_empty(&self) -> bool {
        self.by_logical_id.is_empty()
    }

    /// Iterate over the listed resources in logical ID order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceSummary> {
        self.by_logical_id.values()
    }
}

impl FromIterator<ResourceSummary> for StackResources {
    fn from_iter<I: IntoIterator<Item = ResourceSummary>>(iter: I) -> Self {
        Self {
            by_logical_id: iter
                .into_iter()
                .map(|summary| (summary.logical_id.clone(), summary))
                .collect(),
        }
    }
}

impl From<Vec<ResourceSummary>> for StackResources {
    fn from(summaries: Vec<ResourceSummary>) -> Self {
        summaries.into_iter().collect()
    }
}

//! Nested stack walker.
//!
//! Work is split in two phases. [`load_stack_tree`] performs all I/O: it
//! fetches deployed templates and resource listings of every nested stack,
//! loading siblings concurrently, and produces an immutable [`StackSnapshot`]
//! tree. [`classify_stack`] then walks that tree synchronously, giving every
//! stack level its own [`EvaluationContext`].

mod loader;

pub use loader::load_stack_tree;

use crate::classify::{
    HotswapVerdict, HotswappableChange, NonHotswappableChange, RejectionReason, ResourceKind,
    classify_resource,
};
use crate::diff::{ChangeKind, ResourceDiff, diff_templates};
use crate::error::Result;
use crate::evaluate::EvaluationContext;
use crate::template::{NESTED_STACK_TYPE, StackResources, Template};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything known about one stack level at the start of an attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackSnapshot {
    /// Name or ID of the deployed stack; `None` when it does not exist yet.
    pub stack_name: Option<String>,
    /// Template CloudFormation currently has deployed.
    pub deployed_template: Template,
    /// Newly synthesized template.
    pub generated_template: Template,
    /// Deployed resources.
    pub resources: StackResources,
    /// Snapshots of nested stacks, keyed by the logical ID of their stack resource.
    pub nested_stacks: BTreeMap<String, Arc<StackSnapshot>>,
}

impl StackSnapshot {
    /// Create the snapshot of a deployed stack without resources.
    pub fn new(
        stack_name: impl Into<String>,
        deployed_template: Template,
        generated_template: Template,
    ) -> Self {
        Self {
            stack_name: Some(stack_name.into()),
            deployed_template,
            generated_template,
            ..Default::default()
        }
    }

    /// Snapshot of a stack that has not been deployed yet.
    pub fn not_deployed(generated_template: Template) -> Self {
        Self {
            generated_template,
            ..Default::default()
        }
    }

    /// Set the deployed resources.
    pub fn with_resources(mut self, resources: impl Into<StackResources>) -> Self {
        self.resources = resources.into();
        self
    }

    /// Attach the snapshot of a nested stack.
    pub fn with_nested_stack(mut self, logical_id: impl Into<String>, snapshot: StackSnapshot) -> Self {
        self.nested_stacks.insert(logical_id.into(), Arc::new(snapshot));
        self
    }

    /// Whether the stack exists in CloudFormation.
    pub fn is_deployed(&self) -> bool {
        self.stack_name.is_some()
    }

    /// Whether this stack or any nested stack uses an intrinsic function.
    pub fn uses_function(&self, function: &str) -> bool {
        self.generated_template.uses_function(function)
            || self.nested_stacks.values().any(|s| s.uses_function(function))
    }
}

/// Classification results of a whole stack tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedChanges {
    /// Changes that can be hotswapped.
    pub hotswappable: Vec<HotswappableChange>,
    /// Changes that need a full deployment.
    pub non_hotswappable: Vec<NonHotswappableChange>,
}

impl ClassifiedChanges {
    /// Append the results of another stack level.
    pub fn merge(&mut self, other: ClassifiedChanges) {
        self.hotswappable.extend(other.hotswappable);
        self.non_hotswappable.extend(other.non_hotswappable);
    }

    /// Total number of operations over all hotswappable changes.
    pub fn operation_count(&self) -> usize {
        self.hotswappable.iter().map(|c| c.operations.len()).sum()
    }

    fn push(&mut self, verdict: HotswapVerdict) {
        match verdict {
            HotswapVerdict::Hotswappable(change) => self.hotswappable.push(change),
            HotswapVerdict::RequiresFullDeployment(change) => self.non_hotswappable.push(change),
            HotswapVerdict::NoChange => {}
        }
    }
}

/// Classify every change of the stack `ctx` evaluates, recursing into nested stacks.
///
/// # Errors
///
/// Fails on the first expression, at any level, that cannot be evaluated.
pub fn classify_stack(ctx: &EvaluationContext) -> Result<ClassifiedChanges> {
    let stack = ctx.stack();
    let diff = diff_templates(&stack.deployed_template, &stack.generated_template);

    let mut changes = ClassifiedChanges::default();
    for output in &diff.changed_outputs {
        changes.non_hotswappable.push(NonHotswappableChange::new(
            output,
            "",
            RejectionReason::OutputChanged,
        ));
    }

    let mut modified_nested_stacks = Vec::new();
    for resource in pair_renamed_resources(diff.resources) {
        if resource.kind == ChangeKind::Modified
            && ResourceKind::of(&resource.resource_type) == ResourceKind::NestedStack
        {
            modified_nested_stacks.push(resource.logical_id);
            continue;
        }
        changes.push(classify_resource(&resource, ctx)?);
    }

    for logical_id in nested_stacks_in_both(stack) {
        let modified = modified_nested_stacks.iter().any(|id| id == logical_id);
        let Some(child) = ctx.nested_stack_context(logical_id)? else {
            if modified {
                changes.non_hotswappable.push(NonHotswappableChange::new(
                    logical_id,
                    NESTED_STACK_TYPE,
                    RejectionReason::NestedTemplateUnavailable,
                ));
            }
            continue;
        };

        if !child.stack().is_deployed() {
            let child_diff =
                diff_templates(&child.stack().deployed_template, &child.stack().generated_template);
            if modified || !child_diff.is_empty() {
                changes.non_hotswappable.push(NonHotswappableChange::new(
                    logical_id,
                    NESTED_STACK_TYPE,
                    RejectionReason::NewNestedStack,
                ));
            }
            continue;
        }

        tracing::debug!(logical_id, stack = ?child.stack().stack_name, "classifying nested stack");
        changes.merge(classify_stack(&child)?);
    }

    Ok(changes)
}

/// Nested stack resources present in both templates with the nested stack type.
fn nested_stacks_in_both(stack: &StackSnapshot) -> impl Iterator<Item = &str> {
    stack
        .generated_template
        .resources
        .iter()
        .filter(|(id, resource)| {
            resource.is_nested_stack()
                && stack
                    .deployed_template
                    .resource(id)
                    .is_some_and(|old| old.is_nested_stack())
        })
        .map(|(id, _)| id.as_str())
}

/// Drop added/removed pairs that are the same resource under a new logical ID.
///
/// A pair matches when type and properties are identical.
fn pair_renamed_resources(diffs: Vec<ResourceDiff>) -> Vec<ResourceDiff> {
    let mut paired = vec![false; diffs.len()];
    for (added_index, added) in diffs.iter().enumerate() {
        let Some(new) = added.new.as_ref().filter(|_| added.kind == ChangeKind::Added) else {
            continue;
        };
        let removed_index = diffs.iter().enumerate().position(|(index, removed)| {
            !paired[index]
                && removed.kind == ChangeKind::Removed
                && removed.old.as_ref().is_some_and(|old| {
                    old.resource_type == new.resource_type && old.properties == new.properties
                })
        });
        if let Some(removed_index) = removed_index {
            paired[added_index] = true;
            paired[removed_index] = true;
        }
    }

    diffs
        .into_iter()
        .zip(paired)
        .filter(|(_, paired)| !paired)
        .map(|(diff, _)| diff)
        .collect()
}

//! Per-resource hotswap classification.
//!
//! A classifier looks at one [`ResourceDiff`] of one stack level and decides
//! whether the change can be applied with direct service API calls. The
//! outcome is data, never an error: only evaluation failures abort.
//!
//! Dispatch is by exact resource type. Anything outside the known set is
//! rejected as an unsupported resource type, whatever properties it has.

mod codebuild;
mod lambda;
mod operation;
mod stepfunctions;

pub use operation::{
    ChangeOperation, CodeBuildProjectUpdate, LambdaCodeUpdate, LambdaConfigurationUpdate,
    LambdaVersionPublish, Service, StateMachineUpdate,
};

use crate::diff::{ChangeKind, ResourceDiff};
use crate::error::Result;
use crate::evaluate::EvaluationContext;
use crate::template::NESTED_STACK_TYPE;
use std::fmt;

/// Outcome of classifying one resource change.
#[derive(Debug, Clone, PartialEq)]
pub enum HotswapVerdict {
    /// The change can be applied with the given operations.
    Hotswappable(HotswappableChange),
    /// The change needs a full CloudFormation deployment.
    RequiresFullDeployment(NonHotswappableChange),
    /// Nothing relevant changed.
    NoChange,
}

/// A change that can be hotswapped.
#[derive(Debug, Clone, PartialEq)]
pub struct HotswappableChange {
    /// Logical ID of the resource.
    pub logical_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Service the operations call.
    pub service: Service,
    /// Human readable names of the affected resources, for reporting.
    pub resource_names: Vec<String>,
    /// Top-level properties that changed.
    pub properties_changed: Vec<String>,
    /// Operations to run in order. May be empty.
    pub operations: Vec<ChangeOperation>,
}

/// A change that cannot be hotswapped.
#[derive(Debug, Clone, PartialEq)]
pub struct NonHotswappableChange {
    /// Logical ID of the resource, or the output name for output changes.
    pub logical_id: String,
    /// Resource type; empty for output changes.
    pub resource_type: String,
    /// Properties that blocked the hotswap.
    pub rejected_properties: Vec<String>,
    /// Why the change was rejected.
    pub reason: RejectionReason,
    /// Whether the change is reported in hotswap-only mode.
    pub hotswap_only_visible: bool,
}

impl NonHotswappableChange {
    pub(crate) fn new(
        logical_id: impl Into<String>,
        resource_type: impl Into<String>,
        reason: RejectionReason,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            rejected_properties: Vec::new(),
            reason,
            hotswap_only_visible: true,
        }
    }

    fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.rejected_properties = properties;
        self
    }

    fn hidden_in_hotswap_only(mut self) -> Self {
        self.hotswap_only_visible = false;
        self
    }
}

impl fmt::Display for NonHotswappableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.logical_id;
        match self.reason {
            RejectionReason::ResourceCreated => {
                write!(f, "resource '{id}' was created by this deployment")
            }
            RejectionReason::ResourceDestroyed => {
                write!(f, "resource '{id}' was destroyed by this deployment")
            }
            RejectionReason::UnsupportedResourceType => {
                write!(f, "This resource type is not supported for hotswap deployments")
            }
            RejectionReason::NonHotswappableProperties => write!(
                f,
                "resource properties '{}' are not hotswappable on this resource type",
                self.rejected_properties.join(",")
            ),
            RejectionReason::TagsOnly => write!(f, "Tags are not hotswappable"),
            RejectionReason::OutputChanged => write!(f, "output was changed"),
            RejectionReason::NewNestedStack => write!(
                f,
                "physical name for {NESTED_STACK_TYPE} '{id}' could not be found in CloudFormation, \
                 so this is a newly created nested stack and cannot be hotswapped"
            ),
            RejectionReason::NestedTemplateUnavailable => {
                write!(f, "the template of nested stack '{id}' could not be found")
            }
            RejectionReason::PhysicalNameUnknown => {
                write!(f, "could not determine the physical name of resource '{id}'")
            }
        }
    }
}

/// Why a change needs a full deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The resource is new.
    ResourceCreated,
    /// The resource was deleted.
    ResourceDestroyed,
    /// No classifier handles the resource type.
    UnsupportedResourceType,
    /// Properties outside the hotswappable set changed.
    NonHotswappableProperties,
    /// Only `Tags` changed.
    TagsOnly,
    /// A stack output changed.
    OutputChanged,
    /// A nested stack that has not been deployed yet changed.
    NewNestedStack,
    /// The generated template of a nested stack was not provided.
    NestedTemplateUnavailable,
    /// Neither a name property nor a deployed physical ID identify the resource.
    PhysicalNameUnknown,
}

impl RejectionReason {
    /// Short machine readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceCreated => "resource-created",
            Self::ResourceDestroyed => "resource-destroyed",
            Self::UnsupportedResourceType => "unsupported-resource-type",
            Self::NonHotswappableProperties => "non-hotswappable-properties",
            Self::TagsOnly => "tags-only",
            Self::OutputChanged => "output-changed",
            Self::NewNestedStack => "new-nested-stack",
            Self::NestedTemplateUnavailable => "nested-template-unavailable",
            Self::PhysicalNameUnknown => "physical-name-unknown",
        }
    }
}

/// Resource types the classifiers know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `AWS::Lambda::Function`
    LambdaFunction,
    /// `AWS::Lambda::Version`
    LambdaVersion,
    /// `AWS::Lambda::Alias`
    LambdaAlias,
    /// `AWS::CodeBuild::Project`
    CodeBuildProject,
    /// `AWS::StepFunctions::StateMachine`
    StateMachine,
    /// `AWS::CloudFormation::Stack`
    NestedStack,
    /// `AWS::CDK::Metadata`
    CdkMetadata,
    /// Anything else.
    Unsupported,
}

impl ResourceKind {
    /// Look up the kind of a resource type. Matching is exact and case-sensitive.
    pub fn of(resource_type: &str) -> Self {
        match resource_type {
            "AWS::Lambda::Function" => Self::LambdaFunction,
            "AWS::Lambda::Version" => Self::LambdaVersion,
            "AWS::Lambda::Alias" => Self::LambdaAlias,
            "AWS::CodeBuild::Project" => Self::CodeBuildProject,
            "AWS::StepFunctions::StateMachine" => Self::StateMachine,
            NESTED_STACK_TYPE => Self::NestedStack,
            "AWS::CDK::Metadata" => Self::CdkMetadata,
            _ => Self::Unsupported,
        }
    }
}

/// Classify one resource change of the stack `ctx` evaluates.
///
/// Modified nested stacks are not handled here; the nested stack walker
/// recurses into them instead. Passed one anyway, this rejects it.
///
/// # Errors
///
/// Fails only if an expression the hotswap needs cannot be evaluated.
pub fn classify_resource(diff: &ResourceDiff, ctx: &EvaluationContext) -> Result<HotswapVerdict> {
    let kind = ResourceKind::of(&diff.resource_type);
    if kind == ResourceKind::CdkMetadata {
        return Ok(HotswapVerdict::NoChange);
    }

    match diff.kind {
        ChangeKind::Added => {
            return Ok(reject(diff, RejectionReason::ResourceCreated));
        }
        ChangeKind::Removed => {
            let change = NonHotswappableChange::new(
                &diff.logical_id,
                &diff.resource_type,
                RejectionReason::ResourceDestroyed,
            );
            let change = if kind == ResourceKind::NestedStack {
                change.hidden_in_hotswap_only()
            } else {
                change
            };
            return Ok(HotswapVerdict::RequiresFullDeployment(change));
        }
        ChangeKind::Modified => {}
    }

    if !diff.has_property_changes() {
        return Ok(HotswapVerdict::NoChange);
    }

    match kind {
        ResourceKind::LambdaFunction => lambda::classify_function(diff, ctx),
        ResourceKind::LambdaVersion => Ok(lambda::classify_version(diff)),
        ResourceKind::LambdaAlias => Ok(lambda::classify_alias(diff)),
        ResourceKind::CodeBuildProject => codebuild::classify_project(diff, ctx),
        ResourceKind::StateMachine => stepfunctions::classify_state_machine(diff, ctx),
        ResourceKind::NestedStack | ResourceKind::CdkMetadata | ResourceKind::Unsupported => {
            Ok(reject(diff, RejectionReason::UnsupportedResourceType))
        }
    }
}

fn reject(diff: &ResourceDiff, reason: RejectionReason) -> HotswapVerdict {
    HotswapVerdict::RequiresFullDeployment(NonHotswappableChange::new(
        &diff.logical_id,
        &diff.resource_type,
        reason,
    ))
}

/// Split the changed top-level properties into allowed and rejected ones.
///
/// Returns `Err` with the full-deployment verdict when anything is rejected.
fn partition_properties(
    diff: &ResourceDiff,
    allowed: &[&str],
) -> std::result::Result<Vec<String>, HotswapVerdict> {
    let (hotswappable, rejected): (Vec<&str>, Vec<&str>) = diff
        .changed_properties()
        .into_iter()
        .partition(|name| allowed.contains(name));

    if rejected.is_empty() {
        return Ok(hotswappable.into_iter().map(str::to_string).collect());
    }

    let reason = if rejected == ["Tags"] {
        RejectionReason::TagsOnly
    } else {
        RejectionReason::NonHotswappableProperties
    };
    let change = NonHotswappableChange::new(&diff.logical_id, &diff.resource_type, reason)
        .with_properties(rejected.into_iter().map(str::to_string).collect());
    Err(HotswapVerdict::RequiresFullDeployment(change))
}

fn physical_name_unknown(diff: &ResourceDiff) -> HotswapVerdict {
    reject(diff, RejectionReason::PhysicalNameUnknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_resources;
    use crate::evaluate::test_support::context;
    use crate::template::{ResourceSummary, Template};
    use serde_json::{Value, json};

    fn single_diff(old: Value, new: Value) -> ResourceDiff {
        let old = Template::from_value(old).unwrap();
        let new = Template::from_value(new).unwrap();
        let mut diffs = diff_resources(&old, &new);
        assert_eq!(diffs.len(), 1);
        diffs.remove(0)
    }

    #[test]
    fn test_unknown_type_with_code_property_is_rejected() {
        let diff = single_diff(
            json!({ "Resources": { "Func": { "Type": "AWS::NotLambda::NotAFunction", "Properties": { "Code": "old" } } } }),
            json!({ "Resources": { "Func": { "Type": "AWS::NotLambda::NotAFunction", "Properties": { "Code": "new" } } } }),
        );
        let ctx = context(json!({}), vec![]);
        let HotswapVerdict::RequiresFullDeployment(change) = classify_resource(&diff, &ctx).unwrap() else {
            panic!("expected a full deployment");
        };
        assert_eq!(change.reason, RejectionReason::UnsupportedResourceType);
        assert_eq!(
            change.to_string(),
            "This resource type is not supported for hotswap deployments"
        );
    }

    #[test]
    fn test_type_matching_is_case_sensitive() {
        assert_eq!(ResourceKind::of("AWS::Lambda::Function"), ResourceKind::LambdaFunction);
        assert_eq!(ResourceKind::of("aws::lambda::function"), ResourceKind::Unsupported);
        for resource_type in [
            "AWS::ECS::Service",
            "AWS::ECS::TaskDefinition",
            "AWS::AppSync::Resolver",
            "AWS::AppSync::FunctionConfiguration",
            "Custom::CDKBucketDeployment",
        ] {
            assert_eq!(ResourceKind::of(resource_type), ResourceKind::Unsupported, "{resource_type}");
        }
    }

    #[test]
    fn test_added_and_removed_resources() {
        let ctx = context(json!({}), vec![]);
        let diff = single_diff(
            json!({ "Resources": {} }),
            json!({ "Resources": { "Queue": { "Type": "AWS::SQS::Queue" } } }),
        );
        let HotswapVerdict::RequiresFullDeployment(change) = classify_resource(&diff, &ctx).unwrap() else {
            panic!("expected a full deployment");
        };
        assert_eq!(change.reason, RejectionReason::ResourceCreated);
        assert_eq!(change.to_string(), "resource 'Queue' was created by this deployment");

        let diff = single_diff(
            json!({ "Resources": { "Child": { "Type": "AWS::CloudFormation::Stack" } } }),
            json!({ "Resources": {} }),
        );
        let HotswapVerdict::RequiresFullDeployment(change) = classify_resource(&diff, &ctx).unwrap() else {
            panic!("expected a full deployment");
        };
        assert_eq!(change.reason, RejectionReason::ResourceDestroyed);
        assert!(!change.hotswap_only_visible);
    }

    #[test]
    fn test_metadata_only_change_is_no_change() {
        let diff = single_diff(
            json!({ "Resources": { "Func": { "Type": "AWS::Lambda::Function", "Metadata": { "a": 1 } } } }),
            json!({ "Resources": { "Func": { "Type": "AWS::Lambda::Function", "Metadata": { "a": 2 } } } }),
        );
        let ctx = context(json!({}), vec![]);
        assert_eq!(classify_resource(&diff, &ctx).unwrap(), HotswapVerdict::NoChange);
    }

    #[test]
    fn test_cdk_metadata_is_ignored() {
        let diff = single_diff(
            json!({ "Resources": {} }),
            json!({ "Resources": { "CDKMetadata": { "Type": "AWS::CDK::Metadata", "Properties": { "Analytics": "v2" } } } }),
        );
        let ctx = context(json!({}), vec![]);
        assert_eq!(classify_resource(&diff, &ctx).unwrap(), HotswapVerdict::NoChange);
    }

    #[test]
    fn test_tags_only_change() {
        let diff = single_diff(
            json!({ "Resources": { "Machine": { "Type": "AWS::StepFunctions::StateMachine", "Properties": { "Tags": [] } } } }),
            json!({ "Resources": { "Machine": { "Type": "AWS::StepFunctions::StateMachine", "Properties": { "Tags": [{ "Key": "a", "Value": "b" }] } } } }),
        );
        let ctx = context(
            json!({}),
            vec![ResourceSummary::new("Machine", "AWS::StepFunctions::StateMachine", "arn:machine")],
        );
        let HotswapVerdict::RequiresFullDeployment(change) = classify_resource(&diff, &ctx).unwrap() else {
            panic!("expected a full deployment");
        };
        assert_eq!(change.reason, RejectionReason::TagsOnly);
        assert_eq!(change.rejected_properties, vec!["Tags".to_string()]);
        assert_eq!(change.to_string(), "Tags are not hotswappable");
    }
}

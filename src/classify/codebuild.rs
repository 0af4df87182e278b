//! CodeBuild projects.

use super::{
    ChangeOperation, CodeBuildProjectUpdate, HotswapVerdict, HotswappableChange,
    NonHotswappableChange, RejectionReason, Service, partition_properties, physical_name_unknown,
};
use crate::diff::ResourceDiff;
use crate::error::Result;
use crate::evaluate::EvaluationContext;
use serde_json::Value;

const PROJECT_PROPERTIES: &[&str] = &["Source", "Environment", "SourceVersion"];

pub(super) fn classify_project(
    diff: &ResourceDiff,
    ctx: &EvaluationContext,
) -> Result<HotswapVerdict> {
    let changed = match partition_properties(diff, PROJECT_PROPERTIES) {
        Ok(changed) => changed,
        Err(verdict) => return Ok(verdict),
    };

    // UpdateProject cannot unset a property
    let removed: Vec<String> = changed
        .iter()
        .filter(|property| diff.new_property(property).is_none())
        .cloned()
        .collect();
    if !removed.is_empty() {
        return Ok(HotswapVerdict::RequiresFullDeployment(
            NonHotswappableChange::new(
                &diff.logical_id,
                &diff.resource_type,
                RejectionReason::NonHotswappableProperties,
            )
            .with_properties(removed),
        ));
    }

    let Some(name) = ctx.resolve_physical_name(&diff.logical_id, diff.new_property("Name")) else {
        return Ok(physical_name_unknown(diff));
    };

    let mut update = CodeBuildProjectUpdate {
        name: name.clone(),
        ..Default::default()
    };
    for property in &changed {
        let Some(expression) = diff.new_property(property) else {
            continue;
        };
        match property.as_str() {
            "Source" => {
                update.source = Some(transform_keys(&ctx.evaluate(expression)?, &source_key));
            }
            "Environment" => {
                update.environment =
                    Some(transform_keys(&ctx.evaluate(expression)?, &lower_case_first));
            }
            "SourceVersion" => update.source_version = Some(ctx.evaluate_string(expression)?),
            _ => {}
        }
    }

    Ok(HotswapVerdict::Hotswappable(HotswappableChange {
        logical_id: diff.logical_id.clone(),
        resource_type: diff.resource_type.clone(),
        service: Service::CodeBuild,
        resource_names: vec![format!("CodeBuild Project '{name}'")],
        properties_changed: changed,
        operations: vec![ChangeOperation::UpdateCodeBuildProject(update)],
    }))
}

/// Rename every object key in `value`, recursively.
fn transform_keys(value: &Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (rename(key), transform_keys(item, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|i| transform_keys(i, rename)).collect()),
        scalar => scalar.clone(),
    }
}

fn source_key(key: &str) -> String {
    if key.eq_ignore_ascii_case("buildspec") {
        key.to_ascii_lowercase()
    } else {
        lower_case_first(key)
    }
}

fn lower_case_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_resource;
    use crate::diff::diff_resources;
    use crate::evaluate::test_support::context;
    use crate::template::{ResourceSummary, Template};
    use serde_json::json;

    fn project(properties: Value) -> Value {
        json!({ "Resources": { "Project": { "Type": "AWS::CodeBuild::Project", "Properties": properties } } })
    }

    fn classify(old: Value, new: Value) -> HotswapVerdict {
        let ctx = context(
            new.clone(),
            vec![ResourceSummary::new("Project", "AWS::CodeBuild::Project", "my-project")],
        );
        let diffs = diff_resources(&Template::from_value(old).unwrap(), &Template::from_value(new).unwrap());
        classify_resource(&diffs[0], &ctx).unwrap()
    }

    #[test]
    fn test_key_casing() {
        assert_eq!(source_key("BuildSpec"), "buildspec");
        assert_eq!(source_key("GitCloneDepth"), "gitCloneDepth");
        assert_eq!(lower_case_first("EnvironmentVariables"), "environmentVariables");
        assert_eq!(lower_case_first(""), "");
    }

    #[test]
    fn test_source_and_environment_update() {
        let verdict = classify(
            project(json!({
                "Source": { "BuildSpec": "old", "Type": "NO_SOURCE" },
                "Environment": { "ComputeType": "BUILD_GENERAL1_SMALL", "EnvironmentVariables": [{ "Name": "A", "Value": "1" }] }
            })),
            project(json!({
                "Source": { "BuildSpec": { "Fn::Join": ["", ["new", "-spec"]] }, "Type": "NO_SOURCE" },
                "Environment": { "ComputeType": "BUILD_GENERAL1_SMALL", "EnvironmentVariables": [{ "Name": "A", "Value": "2" }] }
            })),
        );

        let HotswapVerdict::Hotswappable(change) = verdict else {
            panic!("expected a hotswappable change");
        };
        assert_eq!(change.resource_names, vec!["CodeBuild Project 'my-project'".to_string()]);
        assert_eq!(
            change.operations,
            vec![ChangeOperation::UpdateCodeBuildProject(CodeBuildProjectUpdate {
                name: "my-project".to_string(),
                source: Some(json!({ "buildspec": "new-spec", "type": "NO_SOURCE" })),
                source_version: None,
                environment: Some(json!({
                    "computeType": "BUILD_GENERAL1_SMALL",
                    "environmentVariables": [{ "name": "A", "value": "2" }]
                })),
            })]
        );
    }

    #[test]
    fn test_source_version_with_explicit_name() {
        let verdict = classify(
            project(json!({ "Name": "named", "SourceVersion": "v1" })),
            project(json!({ "Name": "named", "SourceVersion": "v2" })),
        );
        let HotswapVerdict::Hotswappable(change) = verdict else {
            panic!("expected a hotswappable change");
        };
        let ChangeOperation::UpdateCodeBuildProject(update) = &change.operations[0] else {
            panic!("expected a project update");
        };
        assert_eq!(update.name, "named");
        assert_eq!(update.source_version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_other_property_requires_full_deployment() {
        let verdict = classify(
            project(json!({ "SourceVersion": "v1", "ConcurrentBuildLimit": 1 })),
            project(json!({ "SourceVersion": "v2", "ConcurrentBuildLimit": 2 })),
        );
        let HotswapVerdict::RequiresFullDeployment(change) = verdict else {
            panic!("expected a full deployment");
        };
        assert_eq!(change.reason, RejectionReason::NonHotswappableProperties);
        assert_eq!(change.rejected_properties, vec!["ConcurrentBuildLimit".to_string()]);
    }

    #[test]
    fn test_removed_property_requires_full_deployment() {
        let verdict = classify(
            project(json!({ "SourceVersion": "v1", "Source": { "Type": "NO_SOURCE", "BuildSpec": "a" } })),
            project(json!({ "Source": { "Type": "NO_SOURCE", "BuildSpec": "b" } })),
        );
        let HotswapVerdict::RequiresFullDeployment(change) = verdict else {
            panic!("expected a full deployment");
        };
        assert_eq!(change.reason, RejectionReason::NonHotswappableProperties);
        assert_eq!(change.rejected_properties, vec!["SourceVersion".to_string()]);
    }
}

//! Lambda functions, versions and aliases.

use super::{
    ChangeOperation, HotswapVerdict, HotswappableChange, LambdaCodeUpdate,
    LambdaConfigurationUpdate, LambdaVersionPublish, Service, partition_properties,
    physical_name_unknown,
};
use crate::diff::ResourceDiff;
use crate::error::{EvaluationError, HotswapError, Result};
use crate::evaluate::{EvaluationContext, scalar_to_string};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};

const FUNCTION_PROPERTIES: &[&str] = &["Code", "Environment", "Description"];
const VERSION_TYPE: &str = "AWS::Lambda::Version";
const ALIAS_TYPE: &str = "AWS::Lambda::Alias";

pub(super) fn classify_function(
    diff: &ResourceDiff,
    ctx: &EvaluationContext,
) -> Result<HotswapVerdict> {
    let changed = match partition_properties(diff, FUNCTION_PROPERTIES) {
        Ok(changed) => changed,
        Err(verdict) => return Ok(verdict),
    };

    let Some(function_name) =
        ctx.resolve_physical_name(&diff.logical_id, diff.new_property("FunctionName"))
    else {
        return Ok(physical_name_unknown(diff));
    };

    let mut operations = Vec::new();
    if changed.iter().any(|p| p == "Code") {
        operations.push(ChangeOperation::UpdateLambdaCode(code_update(
            diff,
            ctx,
            &function_name,
        )?));
    }
    if changed.iter().any(|p| p == "Description" || p == "Environment") {
        operations.push(ChangeOperation::UpdateLambdaConfiguration(
            configuration_update(diff, ctx, &function_name, &changed)?,
        ));
    }

    let mut resource_names = vec![format!("Lambda Function '{function_name}'")];
    let versions: Vec<&str> = ctx
        .find_references_to(&diff.logical_id)
        .filter(|(_, resource)| resource.resource_type == VERSION_TYPE)
        .map(|(id, _)| id)
        .collect();
    if !versions.is_empty() {
        let aliases = alias_names(ctx, &versions)?;
        resource_names.push(format!("Lambda Version for Function '{function_name}'"));
        resource_names.extend(
            aliases
                .iter()
                .map(|alias| format!("Lambda Alias '{alias}' for Function '{function_name}'")),
        );
        operations.push(ChangeOperation::PublishLambdaVersion(LambdaVersionPublish {
            function_name: function_name.clone(),
            aliases,
        }));
    }

    Ok(HotswapVerdict::Hotswappable(HotswappableChange {
        logical_id: diff.logical_id.clone(),
        resource_type: diff.resource_type.clone(),
        service: Service::Lambda,
        resource_names,
        properties_changed: changed,
        operations,
    }))
}

/// Versions are immutable; a new one is published when the function is hotswapped.
pub(super) fn classify_version(diff: &ResourceDiff) -> HotswapVerdict {
    HotswapVerdict::Hotswappable(HotswappableChange {
        logical_id: diff.logical_id.clone(),
        resource_type: diff.resource_type.clone(),
        service: Service::Lambda,
        resource_names: Vec::new(),
        properties_changed: Vec::new(),
        operations: Vec::new(),
    })
}

/// Aliases follow their function's published version.
pub(super) fn classify_alias(diff: &ResourceDiff) -> HotswapVerdict {
    match partition_properties(diff, &["FunctionVersion"]) {
        Ok(_) => classify_version(diff),
        Err(verdict) => verdict,
    }
}

fn code_update(
    diff: &ResourceDiff,
    ctx: &EvaluationContext,
    function_name: &str,
) -> Result<LambdaCodeUpdate> {
    let mut update = LambdaCodeUpdate {
        function_name: function_name.to_string(),
        ..Default::default()
    };
    let empty = Map::new();
    let code = diff
        .new_property("Code")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    for (key, expression) in code {
        match key.as_str() {
            "S3Bucket" => update.s3_bucket = Some(ctx.evaluate_string(expression)?),
            "S3Key" => update.s3_key = Some(ctx.evaluate_string(expression)?),
            "S3ObjectVersion" => update.s3_object_version = Some(ctx.evaluate_string(expression)?),
            "ImageUri" => update.image_uri = Some(ctx.evaluate_string(expression)?),
            "ZipFile" => {
                let source = ctx.evaluate_string(expression)?;
                let runtime = diff.new_property("Runtime").ok_or_else(|| {
                    EvaluationError::invalid_arguments("Code.ZipFile", "inline code requires a Runtime")
                })?;
                let runtime = ctx.evaluate_string(runtime)?;
                let file_name = format!("index.{}", inline_code_extension(&runtime)?);
                update.zip_file = Some(zip_inline_code(&file_name, &source)?);
            }
            _ => {}
        }
    }
    Ok(update)
}

fn configuration_update(
    diff: &ResourceDiff,
    ctx: &EvaluationContext,
    function_name: &str,
    changed: &[String],
) -> Result<LambdaConfigurationUpdate> {
    let mut update = LambdaConfigurationUpdate {
        function_name: function_name.to_string(),
        ..Default::default()
    };

    if changed.iter().any(|p| p == "Description") {
        update.description = Some(match diff.new_property("Description") {
            Some(expression) => ctx.evaluate_string(expression)?,
            None => String::new(),
        });
    }

    if changed.iter().any(|p| p == "Environment") {
        let variables = match diff.new_property("Environment") {
            Some(expression) => environment_variables(&ctx.evaluate(expression)?)?,
            None => BTreeMap::new(),
        };
        update.environment = Some(variables);
    }

    Ok(update)
}

fn environment_variables(
    environment: &Value,
) -> std::result::Result<BTreeMap<String, String>, EvaluationError> {
    let invalid = |reason: String| EvaluationError::invalid_arguments("Environment", reason);
    let Some(variables) = environment.get("Variables") else {
        return Ok(BTreeMap::new());
    };
    let variables = variables
        .as_object()
        .ok_or_else(|| invalid(format!("Variables must be an object, got {variables}")))?;

    variables
        .iter()
        .map(|(name, value)| {
            scalar_to_string(value)
                .map(|value| (name.clone(), value))
                .ok_or_else(|| invalid(format!("variable '{name}' is not a string")))
        })
        .collect()
}

/// Names of the aliases that point at any of `versions`.
fn alias_names(ctx: &EvaluationContext, versions: &[&str]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for version in versions {
        for (alias_id, alias) in ctx.find_references_to(version) {
            if alias.resource_type != ALIAS_TYPE {
                continue;
            }
            let name = alias.property("Name").ok_or_else(|| {
                EvaluationError::invalid_arguments("Name", format!("alias '{alias_id}' has no Name"))
            })?;
            names.push(ctx.evaluate_string(name)?);
        }
    }
    Ok(names)
}

fn inline_code_extension(runtime: &str) -> std::result::Result<&'static str, EvaluationError> {
    if runtime.starts_with("node") {
        Ok("js")
    } else if runtime.starts_with("python") {
        Ok("py")
    } else {
        Err(EvaluationError::UnsupportedInlineRuntime(runtime.to_string()))
    }
}

/// Package inline source into a zip archive with a single entry.
///
/// Entries carry a fixed timestamp so the same source always yields the same bytes.
fn zip_inline_code(file_name: &str, source: &str) -> Result<Vec<u8>> {
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(file_name, options)
        .map_err(|e| HotswapError::Packaging(e.to_string()))?;
    writer.write_all(source.as_bytes())?;
    let archive = writer
        .finish()
        .map_err(|e| HotswapError::Packaging(e.to_string()))?;
    Ok(archive.into_inner())
}

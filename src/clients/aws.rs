//! Client implementations backed by the AWS SDK for Rust.
//!
//! The adapters wrap SDK clients the caller constructed, so credentials,
//! region and retry behaviour stay under the caller's control.

use super::{
    CloudFormationApi, CodeBuildApi, FunctionConfiguration, LambdaApi, LastUpdateStatus,
    StepFunctionsApi,
};
use crate::classify::{
    CodeBuildProjectUpdate, LambdaCodeUpdate, LambdaConfigurationUpdate, StateMachineUpdate,
};
use crate::error::{HotswapError, Result};
use crate::template::{ResourceSummary, Template};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// [`LambdaApi`] over `aws_sdk_lambda::Client`.
#[derive(Debug, Clone)]
pub struct AwsLambda {
    client: aws_sdk_lambda::Client,
}

impl AwsLambda {
    /// Wrap an SDK client.
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

fn lambda_error<E>(operation: &'static str, error: E) -> HotswapError
where
    E: std::error::Error + 'static,
{
    HotswapError::api(operation, aws_sdk_lambda::error::DisplayErrorContext(&error))
}

fn function_configuration(
    function_name: Option<&str>,
    vpc_id: Option<&str>,
    package_type: Option<&aws_sdk_lambda::types::PackageType>,
    status: Option<&aws_sdk_lambda::types::LastUpdateStatus>,
    reason: Option<&str>,
) -> FunctionConfiguration {
    let last_update_status = status.and_then(|status| match status.as_str() {
        "Successful" => Some(LastUpdateStatus::Successful),
        "Failed" => Some(LastUpdateStatus::Failed),
        "InProgress" => Some(LastUpdateStatus::InProgress),
        _ => None,
    });
    FunctionConfiguration {
        function_name: function_name.unwrap_or_default().to_string(),
        vpc_id: vpc_id.map(str::to_string),
        package_type: package_type.map(|p| p.as_str().to_string()),
        last_update_status,
        last_update_status_reason: reason.map(str::to_string),
    }
}

#[async_trait]
impl LambdaApi for AwsLambda {
    async fn update_function_code(&self, update: &LambdaCodeUpdate) -> Result<FunctionConfiguration> {
        let output = self
            .client
            .update_function_code()
            .function_name(&update.function_name)
            .set_s3_bucket(update.s3_bucket.clone())
            .set_s3_key(update.s3_key.clone())
            .set_s3_object_version(update.s3_object_version.clone())
            .set_image_uri(update.image_uri.clone())
            .set_zip_file(update.zip_file.clone().map(aws_sdk_lambda::primitives::Blob::new))
            .send()
            .await
            .map_err(|e| lambda_error("UpdateFunctionCode", e))?;
        Ok(function_configuration(
            output.function_name(),
            output.vpc_config().and_then(|v| v.vpc_id()),
            output.package_type(),
            output.last_update_status(),
            output.last_update_status_reason(),
        ))
    }

    async fn update_function_configuration(
        &self,
        update: &LambdaConfigurationUpdate,
    ) -> Result<FunctionConfiguration> {
        let environment = update.environment.as_ref().map(|variables| {
            aws_sdk_lambda::types::Environment::builder()
                .set_variables(Some(variables.clone().into_iter().collect::<HashMap<_, _>>()))
                .build()
        });
        let output = self
            .client
            .update_function_configuration()
            .function_name(&update.function_name)
            .set_description(update.description.clone())
            .set_environment(environment)
            .send()
            .await
            .map_err(|e| lambda_error("UpdateFunctionConfiguration", e))?;
        Ok(function_configuration(
            output.function_name(),
            output.vpc_config().and_then(|v| v.vpc_id()),
            output.package_type(),
            output.last_update_status(),
            output.last_update_status_reason(),
        ))
    }

    async fn get_function_configuration(&self, function_name: &str) -> Result<FunctionConfiguration> {
        let output = self
            .client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| lambda_error("GetFunctionConfiguration", e))?;
        Ok(function_configuration(
            output.function_name(),
            output.vpc_config().and_then(|v| v.vpc_id()),
            output.package_type(),
            output.last_update_status(),
            output.last_update_status_reason(),
        ))
    }

    async fn publish_version(&self, function_name: &str) -> Result<String> {
        let output = self
            .client
            .publish_version()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| lambda_error("PublishVersion", e))?;
        output
            .version()
            .map(str::to_string)
            .ok_or_else(|| HotswapError::api("PublishVersion", "response did not include a version"))
    }

    async fn update_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()> {
        self.client
            .update_alias()
            .function_name(function_name)
            .name(alias)
            .function_version(version)
            .send()
            .await
            .map_err(|e| lambda_error("UpdateAlias", e))?;
        Ok(())
    }
}

/// [`CodeBuildApi`] over `aws_sdk_codebuild::Client`.
#[derive(Debug, Clone)]
pub struct AwsCodeBuild {
    client: aws_sdk_codebuild::Client,
}

impl AwsCodeBuild {
    /// Wrap an SDK client.
    pub fn new(client: aws_sdk_codebuild::Client) -> Self {
        Self { client }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

fn codebuild_input_error(message: impl std::fmt::Display) -> HotswapError {
    HotswapError::api("UpdateProject", message)
}

/// Build the SDK source from the SDK-cased JSON the classifier produced.
fn project_source(source: &Value) -> Result<aws_sdk_codebuild::types::ProjectSource> {
    use aws_sdk_codebuild::types::{ProjectSource, SourceType};

    ProjectSource::builder()
        .set_type(str_field(source, "type").map(|t| SourceType::from(t.as_str())))
        .set_location(str_field(source, "location"))
        .set_buildspec(str_field(source, "buildspec"))
        .set_git_clone_depth(
            source
                .get("gitCloneDepth")
                .and_then(Value::as_i64)
                .and_then(|depth| i32::try_from(depth).ok()),
        )
        .set_insecure_ssl(bool_field(source, "insecureSsl"))
        .set_report_build_status(bool_field(source, "reportBuildStatus"))
        .set_source_identifier(str_field(source, "sourceIdentifier"))
        .build()
        .map_err(codebuild_input_error)
}

fn project_environment(environment: &Value) -> Result<aws_sdk_codebuild::types::ProjectEnvironment> {
    use aws_sdk_codebuild::types::{
        ComputeType, EnvironmentType, EnvironmentVariable, EnvironmentVariableType,
        ImagePullCredentialsType, ProjectEnvironment,
    };

    let variables = environment
        .get("environmentVariables")
        .and_then(Value::as_array)
        .map(|variables| {
            variables
                .iter()
                .map(|variable| {
                    EnvironmentVariable::builder()
                        .set_name(str_field(variable, "name"))
                        .set_value(str_field(variable, "value"))
                        .set_type(
                            str_field(variable, "type")
                                .map(|t| EnvironmentVariableType::from(t.as_str())),
                        )
                        .build()
                        .map_err(codebuild_input_error)
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    ProjectEnvironment::builder()
        .set_type(str_field(environment, "type").map(|t| EnvironmentType::from(t.as_str())))
        .set_image(str_field(environment, "image"))
        .set_compute_type(
            str_field(environment, "computeType").map(|t| ComputeType::from(t.as_str())),
        )
        .set_privileged_mode(bool_field(environment, "privilegedMode"))
        .set_certificate(str_field(environment, "certificate"))
        .set_image_pull_credentials_type(
            str_field(environment, "imagePullCredentialsType")
                .map(|t| ImagePullCredentialsType::from(t.as_str())),
        )
        .set_environment_variables(variables)
        .build()
        .map_err(codebuild_input_error)
}

#[async_trait]
impl CodeBuildApi for AwsCodeBuild {
    async fn update_project(&self, update: &CodeBuildProjectUpdate) -> Result<()> {
        let source = update.source.as_ref().map(project_source).transpose()?;
        let environment = update
            .environment
            .as_ref()
            .map(project_environment)
            .transpose()?;
        self.client
            .update_project()
            .name(&update.name)
            .set_source(source)
            .set_source_version(update.source_version.clone())
            .set_environment(environment)
            .send()
            .await
            .map_err(|e| {
                HotswapError::api("UpdateProject", aws_sdk_codebuild::error::DisplayErrorContext(&e))
            })?;
        Ok(())
    }
}

/// [`StepFunctionsApi`] over `aws_sdk_sfn::Client`.
#[derive(Debug, Clone)]
pub struct AwsStepFunctions {
    client: aws_sdk_sfn::Client,
}

impl AwsStepFunctions {
    /// Wrap an SDK client.
    pub fn new(client: aws_sdk_sfn::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepFunctionsApi for AwsStepFunctions {
    async fn update_state_machine(&self, update: &StateMachineUpdate) -> Result<()> {
        self.client
            .update_state_machine()
            .state_machine_arn(&update.state_machine_arn)
            .definition(&update.definition)
            .send()
            .await
            .map_err(|e| {
                HotswapError::api("UpdateStateMachine", aws_sdk_sfn::error::DisplayErrorContext(&e))
            })?;
        Ok(())
    }
}

/// [`CloudFormationApi`] over `aws_sdk_cloudformation::Client`.
#[derive(Debug, Clone)]
pub struct AwsCloudFormation {
    client: aws_sdk_cloudformation::Client,
}

impl AwsCloudFormation {
    /// Wrap an SDK client.
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

fn cloudformation_error<E>(operation: &'static str, error: E) -> HotswapError
where
    E: std::error::Error + 'static,
{
    HotswapError::api(operation, aws_sdk_cloudformation::error::DisplayErrorContext(&error))
}

#[async_trait]
impl CloudFormationApi for AwsCloudFormation {
    async fn get_template(&self, stack_name: &str) -> Result<Option<Template>> {
        use aws_sdk_cloudformation::error::ProvideErrorMetadata;
        use aws_sdk_cloudformation::types::TemplateStage;

        let output = match self
            .client
            .get_template()
            .stack_name(stack_name)
            .template_stage(TemplateStage::Original)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .and_then(|service_error| service_error.message())
                    .is_some_and(|message| message.contains("does not exist"));
                if missing {
                    tracing::debug!(stack = stack_name, "stack does not exist");
                    return Ok(None);
                }
                return Err(cloudformation_error("GetTemplate", e));
            }
        };

        match output.template_body() {
            Some(body) => Template::parse(body).map(Some),
            None => Ok(Some(Template::default())),
        }
    }

    async fn list_stack_resources(&self, stack_name: &str) -> Result<Vec<ResourceSummary>> {
        let mut pages = self
            .client
            .list_stack_resources()
            .stack_name(stack_name)
            .into_paginator()
            .send();

        let mut resources = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| cloudformation_error("ListStackResources", e))?;
            resources.extend(page.stack_resource_summaries().iter().map(|summary| {
                ResourceSummary::new(
                    summary.logical_resource_id().unwrap_or_default(),
                    summary.resource_type().unwrap_or_default(),
                    summary.physical_resource_id().unwrap_or_default(),
                )
            }));
        }
        Ok(resources)
    }

    async fn stack_parameters(&self, stack_name: &str) -> Result<BTreeMap<String, String>> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| cloudformation_error("DescribeStacks", e))?;

        Ok(output
            .stacks()
            .first()
            .map(|stack| {
                stack
                    .parameters()
                    .iter()
                    .filter_map(|parameter| {
                        let value = parameter
                            .resolved_value()
                            .or_else(|| parameter.parameter_value())?;
                        Some((parameter.parameter_key()?.to_string(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_exports(&self) -> Result<BTreeMap<String, String>> {
        let mut pages = self.client.list_exports().into_paginator().send();

        let mut exports = BTreeMap::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| cloudformation_error("ListExports", e))?;
            exports.extend(page.exports().iter().filter_map(|export| {
                Some((export.name()?.to_string(), export.value()?.to_string()))
            }));
        }
        Ok(exports)
    }
}

//! Service API calls produced by the classifiers.
//!
//! Every value in an operation is already fully evaluated: executing an
//! operation never touches the evaluator again.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// AWS service an operation is sent to.
///
/// Execution concurrency is bounded per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    /// AWS Lambda
    Lambda,
    /// AWS CodeBuild
    CodeBuild,
    /// AWS Step Functions
    StepFunctions,
}

impl Service {
    /// Short lowercase name used in logs and metric attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lambda => "lambda",
            Self::CodeBuild => "codebuild",
            Self::StepFunctions => "stepfunctions",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One API call (or ordered group of calls) that applies part of a hotswap.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOperation {
    /// Lambda `UpdateFunctionCode`, followed by the function-updated waiter.
    UpdateLambdaCode(LambdaCodeUpdate),
    /// Lambda `UpdateFunctionConfiguration`, followed by the function-updated waiter.
    UpdateLambdaConfiguration(LambdaConfigurationUpdate),
    /// Lambda `PublishVersion`, then `UpdateAlias` for every listed alias.
    PublishLambdaVersion(LambdaVersionPublish),
    /// CodeBuild `UpdateProject`.
    UpdateCodeBuildProject(CodeBuildProjectUpdate),
    /// Step Functions `UpdateStateMachine`.
    UpdateStateMachine(StateMachineUpdate),
}

impl ChangeOperation {
    /// The service the operation calls.
    pub fn service(&self) -> Service {
        match self {
            Self::UpdateLambdaCode(_)
            | Self::UpdateLambdaConfiguration(_)
            | Self::PublishLambdaVersion(_) => Service::Lambda,
            Self::UpdateCodeBuildProject(_) => Service::CodeBuild,
            Self::UpdateStateMachine(_) => Service::StepFunctions,
        }
    }

    /// Name of the first API operation this issues.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::UpdateLambdaCode(_) => "UpdateFunctionCode",
            Self::UpdateLambdaConfiguration(_) => "UpdateFunctionConfiguration",
            Self::PublishLambdaVersion(_) => "PublishVersion",
            Self::UpdateCodeBuildProject(_) => "UpdateProject",
            Self::UpdateStateMachine(_) => "UpdateStateMachine",
        }
    }
}

/// New code for a Lambda function.
///
/// Only the keys present in the new `Code` property are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LambdaCodeUpdate {
    /// Function name or ARN.
    pub function_name: String,
    /// Bucket holding the deployment package.
    pub s3_bucket: Option<String>,
    /// Key of the deployment package.
    pub s3_key: Option<String>,
    /// Object version of the deployment package.
    pub s3_object_version: Option<String>,
    /// Container image URI.
    pub image_uri: Option<String>,
    /// Zip archive built from inline code.
    pub zip_file: Option<Vec<u8>>,
}

/// New configuration for a Lambda function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LambdaConfigurationUpdate {
    /// Function name or ARN.
    pub function_name: String,
    /// New description; empty when the description was removed.
    pub description: Option<String>,
    /// New environment variables; empty when the environment was removed.
    pub environment: Option<BTreeMap<String, String>>,
}

/// Publish a new version of a function and move aliases to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LambdaVersionPublish {
    /// Function name or ARN.
    pub function_name: String,
    /// Aliases to point at the published version.
    pub aliases: Vec<String>,
}

/// New settings for a CodeBuild project, in SDK key casing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBuildProjectUpdate {
    /// Project name.
    pub name: String,
    /// New `source` structure.
    pub source: Option<Value>,
    /// New source version.
    pub source_version: Option<String>,
    /// New `environment` structure.
    pub environment: Option<Value>,
}

/// New definition of a state machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateMachineUpdate {
    /// ARN of the state machine.
    pub state_machine_arn: String,
    /// Fully evaluated definition document.
    pub definition: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_services() {
        let op = ChangeOperation::UpdateStateMachine(StateMachineUpdate::default());
        assert_eq!(op.service(), Service::StepFunctions);
        assert_eq!(op.api_name(), "UpdateStateMachine");

        let op = ChangeOperation::PublishLambdaVersion(LambdaVersionPublish::default());
        assert_eq!(op.service(), Service::Lambda);
        assert_eq!(op.service().to_string(), "lambda");
    }
}

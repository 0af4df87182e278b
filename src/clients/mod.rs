//! Service client seams.
//!
//! The engine never constructs AWS clients itself. Callers hand it
//! implementations of these traits: the SDK backed ones from the `aws`
//! feature, or their own (tests use recording mocks).

mod templates;
mod waiter;

#[cfg(feature = "aws")]
pub mod aws;

pub use templates::{DirectoryTemplateSource, NestedTemplateLocation, StaticTemplateSource};
pub use waiter::{WaiterConfig, poll_until_function_updated};

use crate::classify::{
    CodeBuildProjectUpdate, LambdaCodeUpdate, LambdaConfigurationUpdate, StateMachineUpdate,
};
use crate::error::{HotswapError, Result};
use crate::template::{ResourceSummary, Template};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Update status Lambda reports for a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastUpdateStatus {
    /// The last update finished.
    Successful,
    /// The last update failed.
    Failed,
    /// An update is still being applied.
    InProgress,
}

/// The parts of a Lambda function configuration the engine reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionConfiguration {
    /// Function name.
    pub function_name: String,
    /// VPC the function is attached to, if any.
    pub vpc_id: Option<String>,
    /// `Zip` or `Image`.
    pub package_type: Option<String>,
    /// Status of the last update.
    pub last_update_status: Option<LastUpdateStatus>,
    /// Reason reported with the last update status.
    pub last_update_status_reason: Option<String>,
}

impl FunctionConfiguration {
    /// Whether updates of this function take long to settle.
    ///
    /// True for VPC-attached functions and container image functions.
    pub fn needs_slow_waiter(&self) -> bool {
        self.vpc_id.as_deref().is_some_and(|id| !id.is_empty())
            || self.package_type.as_deref() == Some("Image")
    }
}

/// Lambda API operations used by hotswaps.
#[async_trait]
pub trait LambdaApi: Send + Sync {
    /// `UpdateFunctionCode`
    async fn update_function_code(&self, update: &LambdaCodeUpdate) -> Result<FunctionConfiguration>;

    /// `UpdateFunctionConfiguration`
    async fn update_function_configuration(
        &self,
        update: &LambdaConfigurationUpdate,
    ) -> Result<FunctionConfiguration>;

    /// `GetFunctionConfiguration`
    async fn get_function_configuration(&self, function_name: &str) -> Result<FunctionConfiguration>;

    /// `PublishVersion`; returns the new version.
    async fn publish_version(&self, function_name: &str) -> Result<String>;

    /// `UpdateAlias`
    async fn update_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()>;

    /// Wait until the last update of a function has finished.
    ///
    /// The default polls [`get_function_configuration`](Self::get_function_configuration).
    async fn wait_until_function_updated(
        &self,
        function_name: &str,
        config: &WaiterConfig,
    ) -> Result<()> {
        poll_until_function_updated(self, function_name, config).await
    }
}

/// CodeBuild API operations used by hotswaps.
#[async_trait]
pub trait CodeBuildApi: Send + Sync {
    /// `UpdateProject`
    async fn update_project(&self, update: &CodeBuildProjectUpdate) -> Result<()>;
}

/// Step Functions API operations used by hotswaps.
#[async_trait]
pub trait StepFunctionsApi: Send + Sync {
    /// `UpdateStateMachine`
    async fn update_state_machine(&self, update: &StateMachineUpdate) -> Result<()>;
}

/// Read-only CloudFormation lookups.
#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    /// The deployed template of a stack; `None` if the stack does not exist.
    async fn get_template(&self, stack_name: &str) -> Result<Option<Template>>;

    /// Every resource of a stack.
    async fn list_stack_resources(&self, stack_name: &str) -> Result<Vec<ResourceSummary>>;

    /// Current parameter values of a stack.
    async fn stack_parameters(&self, stack_name: &str) -> Result<BTreeMap<String, String>>;

    /// All exports of the account and region, by export name.
    async fn list_exports(&self) -> Result<BTreeMap<String, String>>;
}

/// Provides the synthesized templates of nested stacks.
#[async_trait]
pub trait NestedTemplateSource: Send + Sync {
    /// The generated template for a nested stack, or `None` if unknown.
    async fn nested_template(&self, location: &NestedTemplateLocation) -> Result<Option<Template>>;
}

/// The set of clients a deployer may use.
///
/// Every client is optional; an operation that needs a missing client fails
/// with [`HotswapError::ClientNotConfigured`].
#[derive(Clone, Default)]
pub struct ServiceClients {
    pub(crate) lambda: Option<Arc<dyn LambdaApi>>,
    pub(crate) codebuild: Option<Arc<dyn CodeBuildApi>>,
    pub(crate) stepfunctions: Option<Arc<dyn StepFunctionsApi>>,
    pub(crate) cloudformation: Option<Arc<dyn CloudFormationApi>>,
    pub(crate) nested_templates: Option<Arc<dyn NestedTemplateSource>>,
}

impl ServiceClients {
    /// The Lambda client.
    pub fn lambda(&self) -> Result<&dyn LambdaApi> {
        self.lambda
            .as_deref()
            .ok_or(HotswapError::ClientNotConfigured("Lambda"))
    }

    /// The CodeBuild client.
    pub fn codebuild(&self) -> Result<&dyn CodeBuildApi> {
        self.codebuild
            .as_deref()
            .ok_or(HotswapError::ClientNotConfigured("CodeBuild"))
    }

    /// The Step Functions client.
    pub fn stepfunctions(&self) -> Result<&dyn StepFunctionsApi> {
        self.stepfunctions
            .as_deref()
            .ok_or(HotswapError::ClientNotConfigured("Step Functions"))
    }

    /// The CloudFormation client.
    pub fn cloudformation(&self) -> Result<&dyn CloudFormationApi> {
        self.cloudformation
            .as_deref()
            .ok_or(HotswapError::ClientNotConfigured("CloudFormation"))
    }

    /// The nested template source.
    pub fn nested_templates(&self) -> Result<&dyn NestedTemplateSource> {
        self.nested_templates
            .as_deref()
            .ok_or(HotswapError::ClientNotConfigured("nested template source"))
    }
}

impl std::fmt::Debug for ServiceClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClients")
            .field("lambda", &self.lambda.is_some())
            .field("codebuild", &self.codebuild.is_some())
            .field("stepfunctions", &self.stepfunctions.is_some())
            .field("cloudformation", &self.cloudformation.is_some())
            .field("nested_templates", &self.nested_templates.is_some())
            .finish()
    }
}

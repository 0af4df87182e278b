//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cfn_hotswap::classify::{
    CodeBuildProjectUpdate, LambdaCodeUpdate, LambdaConfigurationUpdate, StateMachineUpdate,
};
use cfn_hotswap::clients::{FunctionConfiguration, WaiterConfig};
use cfn_hotswap::prelude::*;
use cfn_hotswap::settings::EnvironmentSettings;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded service call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UpdateFunctionCode(LambdaCodeUpdate),
    UpdateFunctionConfiguration(LambdaConfigurationUpdate),
    WaitUntilFunctionUpdated(String, WaiterConfig),
    PublishVersion(String),
    UpdateAlias {
        function_name: String,
        alias: String,
        version: String,
    },
    UpdateProject(CodeBuildProjectUpdate),
    UpdateStateMachine(StateMachineUpdate),
}

#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    pub fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Every call except the waits.
    pub fn updates(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::WaitUntilFunctionUpdated(..)))
            .collect()
    }
}

/// Lambda fake; functions named in `vpc_functions` report a VPC attachment.
#[derive(Debug)]
pub struct RecordingLambda {
    log: Arc<CallLog>,
    vpc_functions: HashSet<String>,
}

impl RecordingLambda {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            vpc_functions: HashSet::new(),
        }
    }

    pub fn with_vpc_function(mut self, function_name: &str) -> Self {
        self.vpc_functions.insert(function_name.to_string());
        self
    }

    fn configuration(&self, function_name: &str) -> FunctionConfiguration {
        FunctionConfiguration {
            function_name: function_name.to_string(),
            vpc_id: self
                .vpc_functions
                .contains(function_name)
                .then(|| "vpc-123".to_string()),
            package_type: Some("Zip".to_string()),
            last_update_status: None,
            last_update_status_reason: None,
        }
    }
}

#[async_trait]
impl LambdaApi for RecordingLambda {
    async fn update_function_code(&self, update: &LambdaCodeUpdate) -> Result<FunctionConfiguration> {
        self.log.push(Call::UpdateFunctionCode(update.clone()));
        Ok(self.configuration(&update.function_name))
    }

    async fn update_function_configuration(
        &self,
        update: &LambdaConfigurationUpdate,
    ) -> Result<FunctionConfiguration> {
        self.log.push(Call::UpdateFunctionConfiguration(update.clone()));
        Ok(self.configuration(&update.function_name))
    }

    async fn get_function_configuration(&self, function_name: &str) -> Result<FunctionConfiguration> {
        Ok(self.configuration(function_name))
    }

    async fn publish_version(&self, function_name: &str) -> Result<String> {
        self.log.push(Call::PublishVersion(function_name.to_string()));
        Ok("2".to_string())
    }

    async fn update_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()> {
        self.log.push(Call::UpdateAlias {
            function_name: function_name.to_string(),
            alias: alias.to_string(),
            version: version.to_string(),
        });
        Ok(())
    }

    async fn wait_until_function_updated(
        &self,
        function_name: &str,
        config: &WaiterConfig,
    ) -> Result<()> {
        self.log
            .push(Call::WaitUntilFunctionUpdated(function_name.to_string(), *config));
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingCodeBuild {
    log: Arc<CallLog>,
}

#[async_trait]
impl CodeBuildApi for RecordingCodeBuild {
    async fn update_project(&self, update: &CodeBuildProjectUpdate) -> Result<()> {
        self.log.push(Call::UpdateProject(update.clone()));
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingStepFunctions {
    log: Arc<CallLog>,
}

#[async_trait]
impl StepFunctionsApi for RecordingStepFunctions {
    async fn update_state_machine(&self, update: &StateMachineUpdate) -> Result<()> {
        self.log.push(Call::UpdateStateMachine(update.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct DeployedStack {
    template: Template,
    resources: Vec<ResourceSummary>,
    parameters: BTreeMap<String, String>,
}

/// In-memory CloudFormation with deployed stacks and exports.
#[derive(Debug, Default)]
pub struct FakeCloudFormation {
    stacks: HashMap<String, DeployedStack>,
    exports: BTreeMap<String, String>,
    pub list_exports_calls: AtomicUsize,
}

impl FakeCloudFormation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(mut self, name: &str, template: Value, resources: Vec<ResourceSummary>) -> Self {
        self.stacks.insert(
            name.to_string(),
            DeployedStack {
                template: template_of(template),
                resources,
                parameters: BTreeMap::new(),
            },
        );
        self
    }

    pub fn with_stack_parameter(mut self, stack: &str, name: &str, value: &str) -> Self {
        self.stacks
            .entry(stack.to_string())
            .or_default()
            .parameters
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_export(mut self, name: &str, value: &str) -> Self {
        self.exports.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl CloudFormationApi for FakeCloudFormation {
    async fn get_template(&self, stack_name: &str) -> Result<Option<Template>> {
        Ok(self.stacks.get(stack_name).map(|s| s.template.clone()))
    }

    async fn list_stack_resources(&self, stack_name: &str) -> Result<Vec<ResourceSummary>> {
        Ok(self
            .stacks
            .get(stack_name)
            .map(|s| s.resources.clone())
            .unwrap_or_default())
    }

    async fn stack_parameters(&self, stack_name: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .stacks
            .get(stack_name)
            .map(|s| s.parameters.clone())
            .unwrap_or_default())
    }

    async fn list_exports(&self) -> Result<BTreeMap<String, String>> {
        self.list_exports_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.exports.clone())
    }
}

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "here";
pub const STACK: &str = "test-stack";

pub fn template_of(value: Value) -> Template {
    Template::from_value(value).unwrap()
}

pub fn test_settings() -> HotswapSettings {
    HotswapSettings {
        environment: EnvironmentSettings {
            account: ACCOUNT.to_string(),
            region: REGION.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A deployer wired to recording fakes.
pub struct Harness {
    pub log: Arc<CallLog>,
    pub cloudformation: Arc<FakeCloudFormation>,
    pub deployer: HotswapDeployer,
}

impl Harness {
    pub async fn new(cloudformation: FakeCloudFormation) -> Self {
        Self::with_templates(cloudformation, StaticTemplateSource::new(), |lambda| lambda).await
    }

    pub async fn with_templates(
        cloudformation: FakeCloudFormation,
        templates: StaticTemplateSource,
        configure_lambda: impl FnOnce(RecordingLambda) -> RecordingLambda,
    ) -> Self {
        let log = Arc::new(CallLog::default());
        let cloudformation = Arc::new(cloudformation);
        let deployer = HotswapDeployer::builder()
            .with_cloudformation(Arc::clone(&cloudformation) as Arc<dyn CloudFormationApi>)
            .with_nested_templates(Arc::new(templates))
            .with_lambda(Arc::new(configure_lambda(RecordingLambda::new(Arc::clone(&log)))))
            .with_codebuild(Arc::new(RecordingCodeBuild {
                log: Arc::clone(&log),
            }))
            .with_stepfunctions(Arc::new(RecordingStepFunctions {
                log: Arc::clone(&log),
            }))
            .with_settings(test_settings())
            .build()
            .await
            .unwrap();
        Self {
            log,
            cloudformation,
            deployer,
        }
    }

    pub async fn hotswap(&self, template: Value, mode: HotswapMode) -> Result<Option<DeployResult>> {
        let request = HotswapRequest::new(STACK, template_of(template)).with_mode(mode);
        self.deployer.try_hotswap_deployment(&request).await
    }
}

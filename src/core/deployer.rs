//! The hotswap orchestrator.

use super::executor::Executor;
use super::report::log_non_hotswappable;
use super::{DeployResult, HotswapDeployerBuilder, HotswapMode, HotswapRequest};
use crate::clients::{CloudFormationApi, NestedTemplateSource, ServiceClients, StaticTemplateSource};
use crate::error::Result;
use crate::evaluate::{EvaluationContext, ParameterTable};
use crate::nested::{ClassifiedChanges, StackSnapshot, classify_stack, load_stack_tree};
use crate::settings::HotswapSettings;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::{AttemptOutcome, HotswapMetrics};

/// Classified changes of one attempt, before anything was executed.
#[derive(Debug, Clone, PartialEq)]
pub struct HotswapPlan {
    /// Name of the root stack.
    pub stack_name: String,
    /// Mode the plan is executed in.
    pub mode: HotswapMode,
    /// Changes of the whole stack tree.
    pub changes: ClassifiedChanges,
}

impl HotswapPlan {
    /// Whether the caller has to run a full deployment instead.
    pub fn requires_full_deployment(&self) -> bool {
        self.mode == HotswapMode::FallBack && !self.changes.non_hotswappable.is_empty()
    }

    /// Whether executing the plan calls no service API.
    pub fn is_no_op(&self) -> bool {
        self.changes.operation_count() == 0
    }
}

/// Decides whether a deployment can be hotswapped and applies it.
///
/// # Examples
///
/// ```rust,no_run
/// use cfn_hotswap::prelude::*;
/// # use std::sync::Arc;
///
/// # async fn example(
/// #     cloudformation: Arc<dyn CloudFormationApi>,
/// #     lambda: Arc<dyn LambdaApi>,
/// #     template: Template,
/// # ) -> Result<()> {
/// let deployer = HotswapDeployer::builder()
///     .with_cloudformation(cloudformation)
///     .with_lambda(lambda)
///     .with_env_overrides("HOTSWAP", "__")
///     .build()
///     .await?;
///
/// let request = HotswapRequest::new("my-stack", template).with_mode(HotswapMode::HotswapOnly);
/// match deployer.try_hotswap_deployment(&request).await? {
///     Some(result) if result.no_op => println!("nothing to hotswap"),
///     Some(result) => println!("hotswapped {:?}", result.hotswapped_resources),
///     None => println!("a full deployment is required"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct HotswapDeployer {
    pub(crate) clients: ServiceClients,
    pub(crate) settings: HotswapSettings,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<HotswapMetrics>,
}

impl HotswapDeployer {
    /// Create a new builder.
    pub fn builder() -> HotswapDeployerBuilder {
        HotswapDeployerBuilder::new()
    }

    /// The settings in effect.
    pub fn settings(&self) -> &HotswapSettings {
        &self.settings
    }

    /// The configured clients.
    pub fn clients(&self) -> &ServiceClients {
        &self.clients
    }

    /// Try to apply a deployment as a hotswap.
    ///
    /// Returns `Ok(None)` when the caller has to run a full deployment: the
    /// stack is not deployed yet, or the mode is fall-back and some change
    /// cannot be hotswapped. Otherwise the hotswappable changes are applied
    /// and the result says whether any API call was made.
    ///
    /// # Errors
    ///
    /// Fails if an expression cannot be evaluated, a stack cannot be loaded,
    /// or a service API call fails. Nothing is executed when planning fails.
    pub async fn try_hotswap_deployment(
        &self,
        request: &HotswapRequest,
    ) -> Result<Option<DeployResult>> {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_attempt());

        let result = self.attempt(request).await;

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            let outcome = match &result {
                Ok(Some(r)) if r.no_op => AttemptOutcome::NoOp,
                Ok(Some(_)) => AttemptOutcome::Hotswapped,
                Ok(None) => AttemptOutcome::FullDeployment,
                Err(_) => AttemptOutcome::Failed,
            };
            metrics.record_outcome(timer, outcome);
        }

        result
    }

    async fn attempt(&self, request: &HotswapRequest) -> Result<Option<DeployResult>> {
        match self.plan(request).await? {
            Some(plan) => self.execute_plan(&plan).await,
            None => Ok(None),
        }
    }

    /// Load the stack tree and classify every change without executing anything.
    ///
    /// Returns `Ok(None)` if the root stack is not deployed.
    ///
    /// # Errors
    ///
    /// Fails if no CloudFormation client is configured, a lookup fails, or an
    /// expression cannot be evaluated.
    pub async fn plan(&self, request: &HotswapRequest) -> Result<Option<HotswapPlan>> {
        let mode = request.mode.unwrap_or(self.settings.mode);
        let stack_name = request.stack_name.as_str();
        tracing::info!(stack = stack_name, %mode, "attempting hotswap deployment");

        let cloudformation = self.clients.cloudformation()?;
        let empty = StaticTemplateSource::new();
        let templates: &dyn NestedTemplateSource = match self.clients.nested_templates.as_deref() {
            Some(templates) => templates,
            None => &empty,
        };

        let Some(snapshot) =
            load_stack_tree(cloudformation, templates, stack_name, request.template.clone()).await?
        else {
            tracing::info!(stack = stack_name, "stack is not deployed, hotswap is not possible");
            return Ok(None);
        };

        let (current, exports) = futures::try_join!(
            cloudformation.stack_parameters(stack_name),
            exports_for(cloudformation, &snapshot),
        )?;

        let parameters = ParameterTable::layered(&request.parameters, &current);
        self.plan_snapshot(snapshot, parameters, exports, mode).map(Some)
    }

    /// Classify an already loaded stack tree.
    ///
    /// # Errors
    ///
    /// Fails if an expression cannot be evaluated.
    pub fn plan_snapshot(
        &self,
        snapshot: StackSnapshot,
        parameters: ParameterTable,
        exports: BTreeMap<String, String>,
        mode: HotswapMode,
    ) -> Result<HotswapPlan> {
        let stack_name = snapshot.stack_name.clone().unwrap_or_default();
        let ctx = EvaluationContext::new(
            Arc::new(snapshot),
            parameters,
            Arc::new(self.settings.environment.stack_environment()),
            Arc::new(exports),
        );
        let changes = classify_stack(&ctx)?;
        tracing::debug!(
            stack = %stack_name,
            hotswappable = changes.hotswappable.len(),
            non_hotswappable = changes.non_hotswappable.len(),
            "classified changes"
        );
        Ok(HotswapPlan {
            stack_name,
            mode,
            changes,
        })
    }

    /// Apply a plan according to its mode.
    ///
    /// # Errors
    ///
    /// Returns the first service API failure.
    pub async fn execute_plan(&self, plan: &HotswapPlan) -> Result<Option<DeployResult>> {
        log_non_hotswappable(&plan.stack_name, plan.mode, &plan.changes.non_hotswappable);
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            for change in &plan.changes.non_hotswappable {
                metrics.record_non_hotswappable(change.reason);
            }
        }

        if plan.requires_full_deployment() {
            return Ok(None);
        }
        if plan.is_no_op() {
            tracing::info!(stack = %plan.stack_name, "no hotswappable changes found");
            return Ok(Some(DeployResult::no_op()));
        }

        let executor = Executor::new(&self.clients, &self.settings);
        #[cfg(feature = "metrics")]
        let executor = executor.with_metrics(self.metrics.as_ref());
        executor.execute(&plan.changes.hotswappable).await?;

        let hotswapped_resources = plan
            .changes
            .hotswappable
            .iter()
            .filter(|c| !c.operations.is_empty())
            .flat_map(|c| c.resource_names.iter().cloned())
            .collect();
        Ok(Some(DeployResult {
            no_op: false,
            hotswapped_resources,
        }))
    }
}

impl std::fmt::Debug for HotswapDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotswapDeployer")
            .field("clients", &self.clients)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Exports are listed only when some template of the tree imports values.
async fn exports_for(
    cloudformation: &dyn CloudFormationApi,
    snapshot: &StackSnapshot,
) -> Result<BTreeMap<String, String>> {
    if snapshot.uses_function("Fn::ImportValue") {
        cloudformation.list_exports().await
    } else {
        Ok(BTreeMap::new())
    }
}

//! Execution of hotswappable changes.
//!
//! Changes are grouped by service. Every group runs with at most
//! `concurrency.per_service` changes in flight and all groups run at the same
//! time. The operations of one change run in order.

use crate::classify::{ChangeOperation, HotswappableChange, LambdaVersionPublish, Service};
use crate::clients::{FunctionConfiguration, LambdaApi, ServiceClients, WaiterConfig};
use crate::error::Result;
use crate::settings::HotswapSettings;
use futures::future::{join_all, try_join_all};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "metrics")]
use crate::metrics::HotswapMetrics;

pub(crate) struct Executor<'a> {
    clients: &'a ServiceClients,
    settings: &'a HotswapSettings,
    #[cfg(feature = "metrics")]
    metrics: Option<&'a HotswapMetrics>,
    failed: AtomicBool,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(clients: &'a ServiceClients, settings: &'a HotswapSettings) -> Self {
        Self {
            clients,
            settings,
            #[cfg(feature = "metrics")]
            metrics: None,
            failed: AtomicBool::new(false),
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: Option<&'a HotswapMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Apply every change.
    ///
    /// After the first failure no further change is started; changes already
    /// in flight run to completion and the first error is returned.
    pub(crate) async fn execute(&self, changes: &[HotswappableChange]) -> Result<()> {
        let mut groups: BTreeMap<Service, Vec<&HotswappableChange>> = BTreeMap::new();
        for change in changes.iter().filter(|c| !c.operations.is_empty()) {
            groups.entry(change.service).or_default().push(change);
        }

        let limit = self.settings.concurrency.per_service.max(1);
        let groups = groups.into_iter().map(|(service, group)| async move {
            tracing::debug!(%service, changes = group.len(), limit, "executing service group");
            stream::iter(group)
                .map(|change| self.execute_change(change))
                .buffer_unordered(limit)
                .collect::<Vec<_>>()
                .await
        });

        join_all(groups)
            .await
            .into_iter()
            .flatten()
            .collect::<Result<Vec<()>>>()
            .map(|_| ())
    }

    async fn execute_change(&self, change: &HotswappableChange) -> Result<()> {
        if self.failed.load(Ordering::Acquire) {
            return Ok(());
        }

        let names = change.resource_names.join(", ");
        tracing::info!(
            logical_id = %change.logical_id,
            resource_type = %change.resource_type,
            service = %change.service,
            "hotswapping: {names}"
        );

        for operation in &change.operations {
            if let Err(e) = self.apply(operation).await {
                self.failed.store(true, Ordering::Release);
                tracing::warn!(
                    logical_id = %change.logical_id,
                    operation = operation.api_name(),
                    error = %e,
                    "hotswap operation failed"
                );
                return Err(e);
            }
            #[cfg(feature = "metrics")]
            if let Some(metrics) = self.metrics {
                metrics.record_operation(operation.service());
            }
        }

        tracing::info!(
            logical_id = %change.logical_id,
            service = %change.service,
            "hotswapped: {names}"
        );
        Ok(())
    }

    async fn apply(&self, operation: &ChangeOperation) -> Result<()> {
        match operation {
            ChangeOperation::UpdateLambdaCode(update) => {
                let lambda = self.clients.lambda()?;
                let configuration = lambda.update_function_code(update).await?;
                self.wait_for_function(lambda, &update.function_name, &configuration)
                    .await
            }
            ChangeOperation::UpdateLambdaConfiguration(update) => {
                let lambda = self.clients.lambda()?;
                let configuration = lambda.update_function_configuration(update).await?;
                self.wait_for_function(lambda, &update.function_name, &configuration)
                    .await
            }
            ChangeOperation::PublishLambdaVersion(publish) => {
                self.publish_version(self.clients.lambda()?, publish).await
            }
            ChangeOperation::UpdateCodeBuildProject(update) => {
                self.clients.codebuild()?.update_project(update).await
            }
            ChangeOperation::UpdateStateMachine(update) => {
                self.clients.stepfunctions()?.update_state_machine(update).await
            }
        }
    }

    async fn wait_for_function(
        &self,
        lambda: &dyn LambdaApi,
        function_name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<()> {
        let waiter = &self.settings.lambda_waiter;
        let config: WaiterConfig = if configuration.needs_slow_waiter() {
            waiter.slow.into()
        } else {
            waiter.standard.into()
        };
        lambda.wait_until_function_updated(function_name, &config).await
    }

    async fn publish_version(
        &self,
        lambda: &dyn LambdaApi,
        publish: &LambdaVersionPublish,
    ) -> Result<()> {
        let version = lambda.publish_version(&publish.function_name).await?;
        tracing::debug!(function_name = %publish.function_name, %version, "published version");
        try_join_all(
            publish
                .aliases
                .iter()
                .map(|alias| lambda.update_alias(&publish.function_name, alias, &version)),
        )
        .await?;
        Ok(())
    }
}

//! Per-stack evaluation context.

use crate::error::EvaluationError;
use crate::nested::StackSnapshot;
use crate::template::{ResourceDefinition, StackResources, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Account, region and partition the stack is deployed to.
///
/// Supplies the values of the `AWS::*` pseudo parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnvironment {
    /// Value of `AWS::AccountId`.
    pub account_id: String,
    /// Value of `AWS::Region`.
    pub region: String,
    /// Value of `AWS::Partition`.
    pub partition: String,
    /// Value of `AWS::URLSuffix`.
    pub url_suffix: String,
}

impl StackEnvironment {
    /// Create an environment in the `aws` partition.
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            partition: "aws".to_string(),
            url_suffix: default_url_suffix("aws").to_string(),
        }
    }

    /// Set the partition; the URL suffix follows the partition.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self.url_suffix = default_url_suffix(&self.partition).to_string();
        self
    }

    /// Override the URL suffix.
    pub fn with_url_suffix(mut self, url_suffix: impl Into<String>) -> Self {
        self.url_suffix = url_suffix.into();
        self
    }

    /// Resolve a pseudo parameter such as `AWS::Region`.
    pub fn pseudo_parameter(&self, name: &str) -> Option<&str> {
        match name {
            "AWS::AccountId" => Some(&self.account_id),
            "AWS::Region" => Some(&self.region),
            "AWS::Partition" => Some(&self.partition),
            "AWS::URLSuffix" => Some(&self.url_suffix),
            _ => None,
        }
    }
}

/// URL suffix used by a partition's service endpoints.
pub fn default_url_suffix(partition: &str) -> &'static str {
    match partition {
        "aws-cn" => "amazonaws.com.cn",
        _ => "amazonaws.com",
    }
}

/// Resolved parameter values for one stack in one hotswap attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    values: BTreeMap<String, Value>,
}

impl ParameterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from explicit overrides layered over the stack's current values.
    ///
    /// Overrides win over current values. Declared defaults are not copied in;
    /// they are consulted at `Ref` time when a name is missing here.
    pub fn layered(
        overrides: &BTreeMap<String, String>,
        current: &BTreeMap<String, String>,
    ) -> Self {
        let values = current
            .iter()
            .chain(overrides.iter())
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        Self { values }
    }

    /// Set a value, returning the updated table.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Get the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Number of values in the table.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for ParameterTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Everything the intrinsic evaluator may consult for one stack level.
///
/// Contexts are immutable snapshots. A nested stack gets its own context from
/// [`EvaluationContext::nested_stack_context`]; a child context never sees the
/// parent's resources, only the parameter values the parent passed down.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub(super) stack: Arc<StackSnapshot>,
    pub(super) parameters: ParameterTable,
    pub(super) environment: Arc<StackEnvironment>,
    pub(super) exports: Arc<BTreeMap<String, String>>,
}

impl EvaluationContext {
    /// Create the context of a stack.
    pub fn new(
        stack: Arc<StackSnapshot>,
        parameters: ParameterTable,
        environment: Arc<StackEnvironment>,
        exports: Arc<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            stack,
            parameters,
            environment,
            exports,
        }
    }

    /// The stack this context evaluates against.
    pub fn stack(&self) -> &StackSnapshot {
        &self.stack
    }

    /// The synthesized template of this stack.
    pub fn template(&self) -> &Template {
        &self.stack.generated_template
    }

    /// Deployed resources of this stack.
    pub fn resources(&self) -> &StackResources {
        &self.stack.resources
    }

    /// Parameter values of this stack.
    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    /// The deployment environment.
    pub fn environment(&self) -> &StackEnvironment {
        &self.environment
    }

    /// Build the context of the nested stack declared by `logical_id`.
    ///
    /// The nested stack resource's `Parameters` are evaluated in this context
    /// and become the child's parameter table. Returns `Ok(None)` if no nested
    /// stack was loaded under that logical ID.
    ///
    /// # Errors
    ///
    /// Fails if any parameter expression cannot be evaluated.
    pub fn nested_stack_context(
        &self,
        logical_id: &str,
    ) -> Result<Option<EvaluationContext>, EvaluationError> {
        let Some(child) = self.stack.nested_stacks.get(logical_id) else {
            return Ok(None);
        };

        let parameters = match self
            .template()
            .resource(logical_id)
            .and_then(|r| r.property("Parameters"))
        {
            Some(expression) => match self.evaluate(expression)? {
                Value::Object(values) => values.into_iter().collect(),
                other => {
                    return Err(EvaluationError::invalid_arguments(
                        "Parameters",
                        format!("expected an object of nested stack parameters, got {other}"),
                    ));
                }
            },
            None => ParameterTable::new(),
        };

        Ok(Some(EvaluationContext {
            stack: Arc::clone(child),
            parameters,
            environment: Arc::clone(&self.environment),
            exports: Arc::clone(&self.exports),
        }))
    }

    /// Determine the physical name of a resource.
    ///
    /// `name_expression` is the value of the resource's name property
    /// (`FunctionName`, `Name`, ...). It is evaluated if present; if it is
    /// absent or cannot be evaluated, the physical ID from the live stack is used.
    pub fn resolve_physical_name(
        &self,
        logical_id: &str,
        name_expression: Option<&Value>,
    ) -> Option<String> {
        if let Some(expression) = name_expression {
            match self.evaluate(expression) {
                Ok(Value::String(name)) => return Some(name),
                Ok(other) => {
                    tracing::debug!(logical_id, value = %other, "physical name is not a string");
                }
                Err(e) => {
                    tracing::debug!(
                        logical_id,
                        error = %e,
                        "could not evaluate physical name, using the deployed physical id"
                    );
                }
            }
        }
        self.resources().physical_id(logical_id).map(str::to_string)
    }

    /// Resources of this stack's template that reference `logical_id`.
    pub fn find_references_to<'a>(
        &'a self,
        logical_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ResourceDefinition)> + 'a {
        self.template().resources_referencing(logical_id)
    }
}

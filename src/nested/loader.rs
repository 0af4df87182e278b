//! Asynchronous loading of a stack tree.

use super::StackSnapshot;
use crate::clients::{CloudFormationApi, NestedTemplateLocation, NestedTemplateSource};
use crate::error::{HotswapError, Result};
use crate::template::{StackResources, Template};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Load the snapshot of a deployed stack and all of its nested stacks.
///
/// Returns `Ok(None)` if the stack has not been deployed. Nested stacks that
/// exist only in the generated template get a snapshot with an empty deployed
/// template; nested stacks whose generated template the source does not know
/// are left out.
///
/// # Errors
///
/// Propagates the first client or template source failure.
pub async fn load_stack_tree(
    cloudformation: &dyn CloudFormationApi,
    templates: &dyn NestedTemplateSource,
    stack_name: &str,
    generated_template: Template,
) -> Result<Option<StackSnapshot>> {
    let (deployed, resources) = futures::try_join!(
        cloudformation.get_template(stack_name),
        cloudformation.list_stack_resources(stack_name),
    )?;
    let Some(deployed) = deployed else {
        return Ok(None);
    };

    let mut snapshot = StackSnapshot::new(stack_name, deployed, generated_template)
        .with_resources(resources);
    snapshot.nested_stacks = load_nested_stacks(
        cloudformation,
        templates,
        &snapshot.generated_template,
        &snapshot.resources,
    )
    .await?;
    Ok(Some(snapshot))
}

/// Load every nested stack of one level; siblings load concurrently.
fn load_nested_stacks<'a>(
    cloudformation: &'a dyn CloudFormationApi,
    templates: &'a dyn NestedTemplateSource,
    parent_template: &'a Template,
    parent_resources: &'a StackResources,
) -> BoxFuture<'a, Result<BTreeMap<String, Arc<StackSnapshot>>>> {
    async move {
        let loads = parent_template
            .resources
            .iter()
            .filter(|(_, resource)| resource.is_nested_stack())
            .map(|(logical_id, resource)| {
                let location = NestedTemplateLocation::of(logical_id, resource);
                let physical_id = parent_resources.physical_id(logical_id);
                load_nested_stack(cloudformation, templates, location, physical_id)
            });

        let children = try_join_all(loads).await?;
        Ok(children.into_iter().flatten().collect())
    }
    .boxed()
}

async fn load_nested_stack(
    cloudformation: &dyn CloudFormationApi,
    templates: &dyn NestedTemplateSource,
    location: NestedTemplateLocation,
    physical_id: Option<&str>,
) -> Result<Option<(String, Arc<StackSnapshot>)>> {
    let generated = templates
        .nested_template(&location)
        .await
        .map_err(|e| nested_error(&location, e))?;
    let Some(generated) = generated else {
        tracing::debug!(logical_id = %location.logical_id, "no generated template for nested stack");
        return Ok(None);
    };

    let mut snapshot = match physical_id {
        Some(stack_name) => {
            let (deployed, resources) = futures::try_join!(
                cloudformation.get_template(stack_name),
                cloudformation.list_stack_resources(stack_name),
            )
            .map_err(|e| nested_error(&location, e))?;
            match deployed {
                Some(deployed) => {
                    StackSnapshot::new(stack_name, deployed, generated).with_resources(resources)
                }
                None => StackSnapshot::not_deployed(generated),
            }
        }
        None => StackSnapshot::not_deployed(generated),
    };

    snapshot.nested_stacks = load_nested_stacks(
        cloudformation,
        templates,
        &snapshot.generated_template,
        &snapshot.resources,
    )
    .await?;
    Ok(Some((location.logical_id, Arc::new(snapshot))))
}

fn nested_error(location: &NestedTemplateLocation, error: HotswapError) -> HotswapError {
    match error {
        HotswapError::NestedStack { .. } => error,
        other => HotswapError::NestedStack {
            logical_id: location.logical_id.clone(),
            message: other.to_string(),
        },
    }
}

//! Step Functions state machines.

use super::{
    ChangeOperation, HotswapVerdict, HotswappableChange, NonHotswappableChange, RejectionReason,
    Service, StateMachineUpdate, partition_properties, physical_name_unknown,
};
use crate::diff::ResourceDiff;
use crate::error::Result;
use crate::evaluate::EvaluationContext;
use serde_json::{Value, json};

pub(super) fn classify_state_machine(
    diff: &ResourceDiff,
    ctx: &EvaluationContext,
) -> Result<HotswapVerdict> {
    let changed = match partition_properties(diff, &["DefinitionString"]) {
        Ok(changed) => changed,
        Err(verdict) => return Ok(verdict),
    };

    let Some(definition) = diff.new_property("DefinitionString") else {
        let mut change = NonHotswappableChange::new(
            &diff.logical_id,
            &diff.resource_type,
            RejectionReason::NonHotswappableProperties,
        );
        change.rejected_properties = changed;
        return Ok(HotswapVerdict::RequiresFullDeployment(change));
    };

    let arn_expression = diff.new_property("StateMachineName").map(state_machine_arn);
    let Some(state_machine_arn) =
        ctx.resolve_physical_name(&diff.logical_id, arn_expression.as_ref())
    else {
        return Ok(physical_name_unknown(diff));
    };

    let definition = match ctx.evaluate(definition)? {
        Value::String(definition) => definition,
        document => document.to_string(),
    };
    let display_name = state_machine_arn
        .split(':')
        .nth(6)
        .unwrap_or(&state_machine_arn)
        .to_string();

    Ok(HotswapVerdict::Hotswappable(HotswappableChange {
        logical_id: diff.logical_id.clone(),
        resource_type: diff.resource_type.clone(),
        service: Service::StepFunctions,
        resource_names: vec![format!("{} '{display_name}'", diff.resource_type)],
        properties_changed: changed,
        operations: vec![ChangeOperation::UpdateStateMachine(StateMachineUpdate {
            state_machine_arn,
            definition,
        })],
    }))
}

/// Expression for the ARN of a state machine with an explicit name.
fn state_machine_arn(name: &Value) -> Value {
    json!({ "Fn::Join": [":", [
        "arn",
        { "Ref": "AWS::Partition" },
        "states",
        { "Ref": "AWS::Region" },
        { "Ref": "AWS::AccountId" },
        "stateMachine",
        name,
    ]] })
}

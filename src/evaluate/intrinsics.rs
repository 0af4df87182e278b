//! Intrinsic function resolution.

use super::attributes::{ArnParts, format_attribute};
use super::context::EvaluationContext;
use crate::error::EvaluationError;
use serde_json::{Map, Value};

/// Whether a JSON object is an intrinsic function node.
///
/// An intrinsic node is an object with exactly one key that is either `Ref`
/// or starts with `Fn::`.
pub fn is_intrinsic(map: &Map<String, Value>) -> bool {
    map.len() == 1
        && map
            .keys()
            .next()
            .is_some_and(|key| key == "Ref" || key.starts_with("Fn::"))
}

impl EvaluationContext {
    /// Resolve every intrinsic node in `value`.
    ///
    /// Values without intrinsic nodes are returned as an unchanged copy; the
    /// input is never mutated.
    ///
    /// # Errors
    ///
    /// Any unresolvable reference, unknown attribute or unsupported function
    /// fails the whole evaluation.
    pub fn evaluate(&self, value: &Value) -> Result<Value, EvaluationError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) if is_intrinsic(map) => {
                let Some((name, args)) = map.iter().next() else {
                    return Ok(Value::Object(Map::new()));
                };
                self.evaluate_function(name, args)
            }
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.evaluate(item)?)))
                .collect::<Result<Map<_, _>, EvaluationError>>()
                .map(Value::Object),
            scalar => Ok(scalar.clone()),
        }
    }

    /// Resolve `value` and require the result to be a string.
    ///
    /// Numbers and booleans are rendered the way CloudFormation renders them.
    ///
    /// # Errors
    ///
    /// Fails if evaluation fails or the result is an array, object or null.
    pub fn evaluate_string(&self, value: &Value) -> Result<String, EvaluationError> {
        let evaluated = self.evaluate(value)?;
        scalar_to_string(&evaluated).ok_or_else(|| {
            EvaluationError::invalid_arguments("expression", format!("expected a string, got {evaluated}"))
        })
    }

    fn evaluate_function(&self, name: &str, args: &Value) -> Result<Value, EvaluationError> {
        let args = self.evaluate(args)?;
        match name {
            "Ref" => {
                let target = args
                    .as_str()
                    .ok_or_else(|| EvaluationError::invalid_arguments("Ref", "expected a logical ID"))?;
                self.resolve_ref(target)
            }
            "Fn::GetAtt" => {
                let (logical_id, attribute) = get_att_args(&args)?;
                self.resolve_get_att(&logical_id, &attribute)
            }
            "Fn::Join" => join(&args),
            "Fn::Split" => split(&args),
            "Fn::Select" => select(args),
            "Fn::Sub" => self.substitute(&args),
            "Fn::ImportValue" => {
                let export = args.as_str().ok_or_else(|| {
                    EvaluationError::invalid_arguments("Fn::ImportValue", "expected an export name")
                })?;
                self.exports
                    .get(export)
                    .map(|value| Value::String(value.clone()))
                    .ok_or_else(|| EvaluationError::ExportNotFound(export.to_string()))
            }
            other => Err(EvaluationError::UnsupportedFunction(other.to_string())),
        }
    }

    /// Resolve a `Ref` target.
    ///
    /// Lookup order: pseudo parameters, the parameter table, the template's
    /// declared parameter default, then the physical ID of a deployed resource.
    pub(super) fn resolve_ref(&self, name: &str) -> Result<Value, EvaluationError> {
        if let Some(value) = self.environment.pseudo_parameter(name) {
            return Ok(Value::String(value.to_string()));
        }
        if let Some(value) = self.parameters.get(name) {
            return Ok(value.clone());
        }
        if let Some(default) = self
            .template()
            .parameters
            .get(name)
            .and_then(|declaration| declaration.default.as_ref())
        {
            return Ok(default.clone());
        }
        if let Some(physical_id) = self.resources().physical_id(name) {
            return Ok(Value::String(physical_id.to_string()));
        }
        Err(EvaluationError::RefNotFound(name.to_string()))
    }

    pub(super) fn resolve_get_att(
        &self,
        logical_id: &str,
        attribute: &str,
    ) -> Result<Value, EvaluationError> {
        let not_found = || EvaluationError::AttributeNotFound {
            logical_id: logical_id.to_string(),
            attribute: attribute.to_string(),
        };

        // the stack's own outputs, used to pass values between nested stacks
        if logical_id == "Outputs" {
            let output = self.template().outputs.get(attribute).ok_or_else(not_found)?;
            return self.evaluate(&output.value);
        }

        let resource = self.resources().get(logical_id).ok_or_else(not_found)?;

        if let Some(output_name) = attribute.strip_prefix("Outputs.") {
            if resource.resource_type == crate::template::NESTED_STACK_TYPE {
                let child = self.nested_stack_context(logical_id)?.ok_or_else(not_found)?;
                if child.stack().stack_name.is_none() {
                    return Err(not_found());
                }
                return child.resolve_get_att("Outputs", output_name);
            }
        }

        let environment = self.environment();
        let parts = ArnParts {
            partition: &environment.partition,
            region: &environment.region,
            account: &environment.account_id,
            resource_type: &resource.resource_type,
            physical_id: &resource.physical_id,
        };
        format_attribute(attribute, &parts).map(Value::String)
    }
}

/// Render a scalar the way CloudFormation stringifies it.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get_att_args(args: &Value) -> Result<(String, String), EvaluationError> {
    let invalid = || EvaluationError::invalid_arguments("Fn::GetAtt", "expected [LogicalId, Attribute]");
    match args {
        Value::Array(parts) if parts.len() == 2 => {
            let logical_id = parts[0].as_str().ok_or_else(invalid)?;
            let attribute = scalar_to_string(&parts[1]).ok_or_else(invalid)?;
            Ok((logical_id.to_string(), attribute))
        }
        Value::String(dotted) => dotted
            .split_once('.')
            .map(|(id, attr)| (id.to_string(), attr.to_string()))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn join(args: &Value) -> Result<Value, EvaluationError> {
    let invalid = |reason: &str| EvaluationError::invalid_arguments("Fn::Join", reason);
    let Value::Array(parts) = args else {
        return Err(invalid("expected [delimiter, [values]]"));
    };
    let [delimiter, Value::Array(values)] = parts.as_slice() else {
        return Err(invalid("expected [delimiter, [values]]"));
    };
    let delimiter = delimiter.as_str().ok_or_else(|| invalid("delimiter must be a string"))?;

    let strings = values
        .iter()
        .map(|v| scalar_to_string(v).ok_or_else(|| invalid("values must be strings")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::String(strings.join(delimiter)))
}

fn split(args: &Value) -> Result<Value, EvaluationError> {
    let invalid = || EvaluationError::invalid_arguments("Fn::Split", "expected [delimiter, string]");
    let Value::Array(parts) = args else {
        return Err(invalid());
    };
    let [Value::String(delimiter), Value::String(source)] = parts.as_slice() else {
        return Err(invalid());
    };
    Ok(Value::Array(
        source
            .split(delimiter.as_str())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    ))
}

fn select(args: Value) -> Result<Value, EvaluationError> {
    let invalid = |reason: String| EvaluationError::invalid_arguments("Fn::Select", reason);
    let Value::Array(parts) = args else {
        return Err(invalid("expected [index, [values]]".to_string()));
    };
    let mut parts = parts.into_iter();
    let (Some(index), Some(Value::Array(values)), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("expected [index, [values]]".to_string()));
    };

    let index = match &index {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(format!("index {index} is not a non-negative integer")))?;

    let len = values.len();
    usize::try_from(index)
        .ok()
        .and_then(|i| values.into_iter().nth(i))
        .ok_or_else(|| invalid(format!("index {index} is out of bounds for {len} values")))
}

//! `Fn::Sub` template substitution.

use super::context::EvaluationContext;
use super::intrinsics::scalar_to_string;
use crate::error::EvaluationError;
use serde_json::{Map, Value};

impl EvaluationContext {
    /// Evaluate `Fn::Sub` arguments that have already had their nested
    /// intrinsics resolved.
    ///
    /// Accepts either a template string or `[template, {variables}]`. A
    /// placeholder is looked up in the variables first, then resolved as
    /// `Fn::GetAtt` when it contains a dot and as `Ref` otherwise. `${!Text}`
    /// renders the literal `${Text}`.
    pub(super) fn substitute(&self, args: &Value) -> Result<Value, EvaluationError> {
        let empty = Map::new();
        let (body, variables) = match args {
            Value::String(body) => (body.as_str(), &empty),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(body)] => (body.as_str(), &empty),
                [Value::String(body), Value::Object(variables)] => (body.as_str(), variables),
                _ => {
                    return Err(EvaluationError::invalid_arguments(
                        "Fn::Sub",
                        "expected a string or [string, {variables}]",
                    ));
                }
            },
            _ => {
                return Err(EvaluationError::invalid_arguments(
                    "Fn::Sub",
                    "expected a string or [string, {variables}]",
                ));
            }
        };

        let mut output = String::with_capacity(body.len());
        let mut rest = body;
        while let Some(start) = rest.find("${") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // unterminated placeholder is literal text
                output.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let token = &after[..end];
            if let Some(literal) = token.strip_prefix('!') {
                output.push_str("${");
                output.push_str(literal);
                output.push('}');
            } else {
                output.push_str(&self.resolve_placeholder(token, variables)?);
            }
            rest = &after[end + 1..];
        }
        output.push_str(rest);

        Ok(Value::String(output))
    }

    fn resolve_placeholder(
        &self,
        token: &str,
        variables: &Map<String, Value>,
    ) -> Result<String, EvaluationError> {
        let resolved = match variables.get(token) {
            Some(value) => value.clone(),
            None => match token.split_once('.') {
                Some((logical_id, attribute)) => self.resolve_get_att(logical_id, attribute)?,
                None => self.resolve_ref(token)?,
            },
        };
        scalar_to_string(&resolved).ok_or_else(|| {
            EvaluationError::invalid_arguments(
                "Fn::Sub",
                format!("placeholder '{token}' does not resolve to a string"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use crate::error::EvaluationError;
    use crate::template::ResourceSummary;
    use serde_json::json;

    #[test]
    fn test_sub_pseudo_parameters_and_attributes() {
        let ctx = context(
            json!({}),
            vec![ResourceSummary::new("Func", "AWS::Lambda::Function", "my-function")],
        );
        let value = json!({
            "Fn::Sub": "arn:${AWS::Partition}:states:${AWS::Region}:${AWS::AccountId}:stateMachine:${Func}/${Func.Arn}"
        });
        assert_eq!(
            ctx.evaluate(&value).unwrap(),
            json!(
                "arn:swa:states:here:123456789012:stateMachine:my-function/arn:swa:lambda:here:123456789012:function:my-function"
            )
        );
    }

    #[test]
    fn test_sub_with_variables() {
        let ctx = context(json!({}), vec![]);
        let value = json!({
            "Fn::Sub": ["${Greeting}, ${Name}!", { "Greeting": "Hello", "Name": { "Fn::Join": ["", ["wor", "ld"]] } }]
        });
        assert_eq!(ctx.evaluate(&value).unwrap(), json!("Hello, world!"));
    }

    #[test]
    fn test_sub_literal_escape() {
        let ctx = context(json!({}), vec![]);
        let value = json!({ "Fn::Sub": "${!Literal} and ${AWS::URLSuffix}" });
        assert_eq!(ctx.evaluate(&value).unwrap(), json!("${Literal} and amazonaws.com"));
    }

    #[test]
    fn test_sub_unresolvable_token() {
        let ctx = context(json!({}), vec![]);
        let err = ctx.evaluate(&json!({ "Fn::Sub": "prefix-${Missing}" })).unwrap_err();
        assert_eq!(err, EvaluationError::RefNotFound("Missing".to_string()));
    }

    #[test]
    fn test_sub_unterminated_placeholder() {
        let ctx = context(json!({}), vec![]);
        assert_eq!(
            ctx.evaluate(&json!({ "Fn::Sub": "a-${b" })).unwrap(),
            json!("a-${b")
        );
    }
}

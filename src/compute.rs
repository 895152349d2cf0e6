// Computed mapping values
// The forms a mapping field can take: expression source, literal, if/then/else,
// switch, function call or array operation

use indexmap::IndexMap;
use tracing::trace;

use crate::array_ops::{ArrayError, ArrayOperation};
use crate::ast::AstNode;
use crate::evaluator::{EvaluationContext, Scope};
use crate::executor::evaluate_array_operation_in;
use crate::parser;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ComputeExpression {
    /// Expression source, parsed once at decode time
    Source(AstNode),

    /// Number, boolean, null, array or plain object
    Literal(Value),

    /// `{if, then, else?}`
    Conditional {
        condition: Box<ComputeExpression>,
        then_branch: Box<ComputeExpression>,
        else_branch: Option<Box<ComputeExpression>>,
    },

    /// `{switch, cases, default?}`; the subject's string form selects a case
    Switch {
        subject: Box<ComputeExpression>,
        cases: IndexMap<String, ComputeExpression>,
        default: Option<Box<ComputeExpression>>,
    },

    /// `{call, args?}`
    Call {
        function: String,
        args: Vec<ComputeExpression>,
    },

    /// `{op, array, ...}`
    ArrayOp(ArrayOperation),
}

impl ComputeExpression {
    /// Decode a mapping value. Strings are expression source; objects are
    /// recognized by their `op`, `if`, `switch` or `call` key and any other
    /// object is a literal.
    pub fn from_json(value: &Value) -> Result<ComputeExpression, ArrayError> {
        let object = match value {
            Value::String(source) => return Ok(ComputeExpression::Source(parser::parse(source)?)),
            Value::Object(object) => object,
            other => return Ok(ComputeExpression::Literal(other.clone())),
        };

        if object.contains_key("op") {
            return Ok(ComputeExpression::ArrayOp(ArrayOperation::from_json(value)?));
        }

        if let Some(condition) = object.get("if") {
            let then_branch = object
                .get("then")
                .ok_or_else(|| ArrayError::InvalidExpression("conditional requires 'then'".to_string()))?;
            return Ok(ComputeExpression::Conditional {
                condition: Box::new(Self::from_json(condition)?),
                then_branch: Box::new(Self::from_json(then_branch)?),
                else_branch: optional(object.get("else"))?,
            });
        }

        if let Some(subject) = object.get("switch") {
            let cases = object
                .get("cases")
                .and_then(Value::as_object)
                .ok_or_else(|| ArrayError::InvalidExpression("switch requires a 'cases' object".to_string()))?
                .iter()
                .map(|(key, case)| Self::from_json(case).map(|case| (key.clone(), case)))
                .collect::<Result<IndexMap<_, _>, ArrayError>>()?;
            return Ok(ComputeExpression::Switch {
                subject: Box::new(Self::from_json(subject)?),
                cases,
                default: optional(object.get("default"))?,
            });
        }

        if let Some(function) = object.get("call") {
            let function = function
                .as_str()
                .ok_or_else(|| ArrayError::InvalidExpression("'call' must name a function".to_string()))?;
            let args = match object.get("args") {
                None => Vec::new(),
                Some(Value::Array(args)) => args.iter().map(Self::from_json).collect::<Result<Vec<_>, ArrayError>>()?,
                Some(other) => {
                    return Err(ArrayError::InvalidExpression(format!(
                        "'args' must be an array, got {}",
                        other.type_name()
                    )))
                }
            };
            return Ok(ComputeExpression::Call {
                function: function.to_string(),
                args,
            });
        }

        Ok(ComputeExpression::Literal(value.clone()))
    }

    pub fn evaluate<C>(&self, ctx: &C, scope: &Scope) -> Result<Value, ArrayError>
    where
        C: EvaluationContext + ?Sized,
    {
        match self {
            ComputeExpression::Source(ast) => Ok(ctx.evaluate_expression(ast, scope)?),
            ComputeExpression::Literal(value) => Ok(value.clone()),
            ComputeExpression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if condition.evaluate(ctx, scope)?.is_truthy() {
                    then_branch.evaluate(ctx, scope)
                } else {
                    match else_branch {
                        Some(branch) => branch.evaluate(ctx, scope),
                        None => Ok(Value::Undefined),
                    }
                }
            }
            ComputeExpression::Switch {
                subject,
                cases,
                default,
            } => {
                let key = subject.evaluate(ctx, scope)?.to_display_string();
                trace!(key = %key, "switch");
                match (cases.get(&key), default) {
                    (Some(case), _) => case.evaluate(ctx, scope),
                    (None, Some(default)) => default.evaluate(ctx, scope),
                    (None, None) => Ok(Value::Undefined),
                }
            }
            ComputeExpression::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(ctx, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.call_function(function, &args)?)
            }
            ComputeExpression::ArrayOp(op) => evaluate_array_operation_in(op, ctx, scope),
        }
    }
}

fn optional(value: Option<&Value>) -> Result<Option<Box<ComputeExpression>>, ArrayError> {
    value
        .map(|v| ComputeExpression::from_json(v).map(Box::new))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Evaluator, EvaluatorOptions};
    use crate::functions;
    use crate::value;

    fn context(variables: Value) -> Evaluator {
        let mut evaluator = Evaluator::with_options(EvaluatorOptions {
            variables: variables.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        });
        evaluator
            .register_function("sum", |args| {
                Ok(Value::Number(args.iter().map(functions::to_number).sum()))
            })
            .unwrap();
        evaluator
    }

    fn run(definition: Value, variables: Value) -> Result<Value, ArrayError> {
        ComputeExpression::from_json(&definition)?.evaluate(&context(variables), &Scope::new())
    }

    #[test]
    fn test_source_and_literal() {
        assert_eq!(run(value!("price * 2"), value!({"price": 21})).unwrap(), value!(42));
        assert_eq!(run(value!(7), value!({})).unwrap(), value!(7));
        assert_eq!(run(value!({"k": "v"}), value!({})).unwrap(), value!({"k": "v"}));
    }

    #[test]
    fn test_conditional() {
        let definition = value!({"if": "side == 'buy'", "then": "'bid'", "else": "'ask'"});
        assert_eq!(run(definition.clone(), value!({"side": "buy"})).unwrap(), value!("bid"));
        assert_eq!(run(definition, value!({"side": "sell"})).unwrap(), value!("ask"));

        let no_else = value!({"if": false, "then": "'yes'"});
        assert_eq!(run(no_else, value!({})).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_switch() {
        let definition = value!({
            "switch": "status",
            "cases": {"open": "'active'", "closed": "'done'"},
            "default": "'unknown'"
        });
        assert_eq!(run(definition.clone(), value!({"status": "open"})).unwrap(), value!("active"));
        assert_eq!(run(definition, value!({"status": "weird"})).unwrap(), value!("unknown"));

        let no_default = value!({"switch": "code", "cases": {"1": "'one'"}});
        assert_eq!(run(no_default.clone(), value!({"code": 1})).unwrap(), value!("one"));
        assert_eq!(run(no_default, value!({"code": 2})).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_call() {
        let definition = value!({"call": "sum", "args": [5, "x"]});
        assert_eq!(run(definition, value!({"x": 3})).unwrap(), value!(8));

        let err = run(value!({"call": "unknown", "args": []}), value!({})).unwrap_err();
        assert_eq!(err.to_string(), "Undefined function: unknown");
    }

    #[test]
    fn test_array_op_in_scope() {
        let definition = value!({
            "op": "map",
            "array": "items",
            "transform": {"param": "x", "body": "x.price"}
        });
        let result = run(definition, value!({"items": [{"price": 100}, {"price": 200}]})).unwrap();
        assert_eq!(result, value!([100, 200]));
    }

    #[test]
    fn test_decode_errors() {
        let err = ComputeExpression::from_json(&value!({"if": true})).unwrap_err();
        assert!(matches!(err, ArrayError::InvalidExpression(_)));

        let err = ComputeExpression::from_json(&value!({"switch": "x", "cases": 3})).unwrap_err();
        assert!(err.to_string().contains("cases"));

        let err = ComputeExpression::from_json(&value!("1 +")).unwrap_err();
        assert!(matches!(err, ArrayError::Parse(_)));
    }
}

// Array DSL AST
// Pipeline stages, lambdas and decoding from the mapping-definition object form

use std::fmt;

use thiserror::Error;

use crate::ast::AstNode;
use crate::evaluator::EvaluatorError;
use crate::parser::{self, ParserError};
use crate::value::Value;

/// Array DSL errors
///
/// Unlike [`crate::Evaluator::evaluate`], the array layer reports failures as
/// `Err`; evaluator and parser messages pass through unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrayError {
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error(transparent)]
    Expression(#[from] EvaluatorError),

    #[error("Invalid array operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown array operation: {0}")]
    UnknownOperation(String),

    #[error("Expected array, got {0}")]
    ExpectedArray(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid compute expression: {0}")]
    InvalidExpression(String),
}

/// Operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayOp {
    Map,
    Filter,
    Reduce,
    Slice,
    FlatMap,
}

impl ArrayOp {
    pub const ALL: [ArrayOp; 5] = [
        ArrayOp::Map,
        ArrayOp::Filter,
        ArrayOp::Reduce,
        ArrayOp::Slice,
        ArrayOp::FlatMap,
    ];

    pub fn from_name(name: &str) -> Option<ArrayOp> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ArrayOp::Map => "map",
            ArrayOp::Filter => "filter",
            ArrayOp::Reduce => "reduce",
            ArrayOp::Slice => "slice",
            ArrayOp::FlatMap => "flatMap",
        }
    }

    /// Lambda parameter count the compiler requires; `None` for `slice`
    pub fn lambda_arity(self) -> Option<usize> {
        match self {
            ArrayOp::Reduce => Some(2),
            ArrayOp::Slice => None,
            ArrayOp::Map | ArrayOp::Filter | ArrayOp::FlatMap => Some(1),
        }
    }

    /// Human-readable stage description used in compiled plans
    pub fn description(self) -> &'static str {
        match self {
            ArrayOp::Map => "Transform each element",
            ArrayOp::Filter => "Filter elements by predicate",
            ArrayOp::Reduce => "Reduce to single value",
            ArrayOp::Slice => "Slice elements",
            ArrayOp::FlatMap => "Transform and flatten each element",
        }
    }
}

impl fmt::Display for ArrayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inline function literal: `x => body` or `(acc, x) => body`
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpression {
    pub params: Vec<String>,
    pub body: AstNode,
}

impl LambdaExpression {
    pub fn new(params: Vec<String>, body: AstNode) -> Self {
        LambdaExpression { params, body }
    }
}

impl fmt::Display for LambdaExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params.as_slice() {
            [single] => write!(f, "{} => {}", single, self.body),
            params => write!(f, "({}) => {}", params.join(", "), self.body),
        }
    }
}

/// Input of a pipeline stage: a dotted variable path or the previous stage
#[derive(Debug, Clone, PartialEq)]
pub enum ArraySource {
    Path(String),
    Operation(Box<ArrayOperation>),
}

impl From<&str> for ArraySource {
    fn from(path: &str) -> Self {
        ArraySource::Path(path.to_string())
    }
}

impl From<ArrayOperation> for ArraySource {
    fn from(op: ArrayOperation) -> Self {
        ArraySource::Operation(Box::new(op))
    }
}

/// One pipeline stage. Stages nest through `array`, innermost first.
///
/// Required arguments are optional here so that a decoded definition missing
/// one can still be represented and rejected by the compiler or executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOperation {
    Map {
        array: ArraySource,
        transform: Option<LambdaExpression>,
    },
    Filter {
        array: ArraySource,
        predicate: Option<LambdaExpression>,
    },
    Reduce {
        array: ArraySource,
        reducer: Option<LambdaExpression>,
        initial: Option<AstNode>,
    },
    Slice {
        array: ArraySource,
        start: Option<AstNode>,
        end: Option<AstNode>,
        step: Option<AstNode>,
    },
    FlatMap {
        array: ArraySource,
        transform: Option<LambdaExpression>,
    },
}

impl ArrayOperation {
    pub fn kind(&self) -> ArrayOp {
        match self {
            ArrayOperation::Map { .. } => ArrayOp::Map,
            ArrayOperation::Filter { .. } => ArrayOp::Filter,
            ArrayOperation::Reduce { .. } => ArrayOp::Reduce,
            ArrayOperation::Slice { .. } => ArrayOp::Slice,
            ArrayOperation::FlatMap { .. } => ArrayOp::FlatMap,
        }
    }

    pub fn source(&self) -> &ArraySource {
        match self {
            ArrayOperation::Map { array, .. }
            | ArrayOperation::Filter { array, .. }
            | ArrayOperation::Reduce { array, .. }
            | ArrayOperation::Slice { array, .. }
            | ArrayOperation::FlatMap { array, .. } => array,
        }
    }

    /// The stage's transform, predicate or reducer
    pub fn lambda(&self) -> Option<&LambdaExpression> {
        match self {
            ArrayOperation::Map { transform, .. } | ArrayOperation::FlatMap { transform, .. } => {
                transform.as_ref()
            }
            ArrayOperation::Filter { predicate, .. } => predicate.as_ref(),
            ArrayOperation::Reduce { reducer, .. } => reducer.as_ref(),
            ArrayOperation::Slice { .. } => None,
        }
    }

    /// Dotted path at the bottom of the chain
    pub fn source_path(&self) -> &str {
        match self.source() {
            ArraySource::Path(path) => path,
            ArraySource::Operation(inner) => inner.source_path(),
        }
    }

    /// Decode the object form used in mapping definitions:
    /// `{op, array, transform|predicate|reducer, initial, start, end, step}`.
    ///
    /// `array` is a path string or a nested operation object. Lambdas are
    /// `{param, body}` or `{params, body}` with the body in expression
    /// syntax. String `start`/`end`/`step` values are expressions, other
    /// values (and `initial`) are literals.
    pub fn from_json(value: &Value) -> Result<ArrayOperation, ArrayError> {
        let object = value.as_object().ok_or_else(|| {
            ArrayError::InvalidOperation(format!("expected an object, got {}", value.type_name()))
        })?;
        let op_name = object
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| ArrayError::InvalidOperation("missing 'op'".to_string()))?;
        let op = ArrayOp::from_name(op_name)
            .ok_or_else(|| ArrayError::UnknownOperation(op_name.to_string()))?;

        let array = match object.get("array") {
            Some(Value::String(path)) => ArraySource::Path(path.to_string()),
            Some(nested @ Value::Object(_)) => ArraySource::from(ArrayOperation::from_json(nested)?),
            Some(other) => {
                return Err(ArrayError::InvalidOperation(format!(
                    "{} source must be a path or an operation, got {}",
                    op,
                    other.type_name()
                )))
            }
            None => return Err(ArrayError::InvalidOperation(format!("{} requires an array", op))),
        };

        let lambda = |field: &str| object.get(field).map(lambda_from_json).transpose();
        let expression = |field: &str| object.get(field).map(expression_from_json).transpose();

        Ok(match op {
            ArrayOp::Map => ArrayOperation::Map {
                array,
                transform: lambda("transform")?,
            },
            ArrayOp::Filter => ArrayOperation::Filter {
                array,
                predicate: lambda("predicate")?,
            },
            ArrayOp::Reduce => ArrayOperation::Reduce {
                array,
                reducer: lambda("reducer")?,
                initial: object.get("initial").cloned().map(AstNode::Literal),
            },
            ArrayOp::Slice => ArrayOperation::Slice {
                array,
                start: expression("start")?,
                end: expression("end")?,
                step: expression("step")?,
            },
            ArrayOp::FlatMap => ArrayOperation::FlatMap {
                array,
                transform: lambda("transform")?,
            },
        })
    }
}

fn lambda_from_json(value: &Value) -> Result<LambdaExpression, ArrayError> {
    let params = match (value.get("param"), value.get("params")) {
        (Some(Value::String(param)), _) => vec![param.to_string()],
        (_, Some(Value::Array(params))) => params
            .iter()
            .map(|p| {
                p.as_str().map(str::to_string).ok_or_else(|| {
                    ArrayError::InvalidOperation("lambda parameters must be strings".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ArrayError::InvalidOperation(
                "lambda requires 'param' or 'params'".to_string(),
            ))
        }
    };
    let body = value
        .get("body")
        .ok_or_else(|| ArrayError::InvalidOperation("lambda requires a body".to_string()))?;
    Ok(LambdaExpression::new(params, expression_from_json(body)?))
}

fn expression_from_json(value: &Value) -> Result<AstNode, ArrayError> {
    match value {
        Value::String(source) => Ok(parser::parse(source)?),
        other => Ok(AstNode::Literal(other.clone())),
    }
}

/// Renders back to pipe syntax, e.g. `items | filter(x => x > 2) | map(x => x * 2)`
impl fmt::Display for ArrayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            ArraySource::Path(path) => write!(f, "{}", path)?,
            ArraySource::Operation(inner) => write!(f, "{}", inner)?,
        }
        write!(f, " | {}(", self.kind())?;

        let mut args: Vec<String> = Vec::new();
        match self {
            ArrayOperation::Reduce { reducer, initial, .. } => {
                args.extend(reducer.iter().map(ToString::to_string));
                args.extend(initial.iter().map(ToString::to_string));
            }
            ArrayOperation::Slice { start, end, step, .. } => {
                args.extend([start, end, step].into_iter().flatten().map(ToString::to_string));
            }
            other => args.extend(other.lambda().map(ToString::to_string)),
        }
        write!(f, "{})", args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;

    #[test]
    fn test_op_names() {
        for op in ArrayOp::ALL {
            assert_eq!(ArrayOp::from_name(op.name()), Some(op));
        }
        assert_eq!(ArrayOp::from_name("flatMap"), Some(ArrayOp::FlatMap));
        assert_eq!(ArrayOp::from_name("flatmap"), None);
        assert_eq!(ArrayOp::Reduce.lambda_arity(), Some(2));
        assert_eq!(ArrayOp::Slice.lambda_arity(), None);
    }

    #[test]
    fn test_from_json_map() {
        let op = ArrayOperation::from_json(&value!({
            "op": "map",
            "array": "items",
            "transform": {"param": "x", "body": "x.price"}
        }))
        .unwrap();
        assert_eq!(
            op,
            ArrayOperation::Map {
                array: ArraySource::from("items"),
                transform: Some(LambdaExpression::new(
                    vec!["x".to_string()],
                    AstNode::path("x.price").unwrap()
                )),
            }
        );
    }

    #[test]
    fn test_from_json_nested_and_literals() {
        let op = ArrayOperation::from_json(&value!({
            "op": "reduce",
            "array": {"op": "slice", "array": "data.items", "start": 1, "end": "count"},
            "reducer": {"params": ["acc", "x"], "body": "acc + x"},
            "initial": 0
        }))
        .unwrap();
        assert_eq!(op.kind(), ArrayOp::Reduce);
        assert_eq!(op.source_path(), "data.items");
        assert_eq!(op.lambda().map(|l| l.params.len()), Some(2));

        match op.source() {
            ArraySource::Operation(inner) => match inner.as_ref() {
                ArrayOperation::Slice { start, end, step, .. } => {
                    assert_eq!(start, &Some(AstNode::number(1.0)));
                    assert_eq!(end, &Some(AstNode::identifier("count")));
                    assert_eq!(step, &None);
                }
                other => panic!("expected slice, got {:?}", other),
            },
            other => panic!("expected nested operation, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_errors() {
        let err = ArrayOperation::from_json(&value!({"op": "unknown", "array": "items"})).unwrap_err();
        assert_eq!(err.to_string(), "Unknown array operation: unknown");

        let err = ArrayOperation::from_json(&value!({"array": "items"})).unwrap_err();
        assert!(matches!(err, ArrayError::InvalidOperation(_)));

        let err = ArrayOperation::from_json(&value!({
            "op": "map",
            "array": "items",
            "transform": {"param": "x", "body": "x +"}
        }))
        .unwrap_err();
        assert!(matches!(err, ArrayError::Parse(_)));
    }

    #[test]
    fn test_missing_lambda_is_representable() {
        let op = ArrayOperation::from_json(&value!({"op": "filter", "array": "items"})).unwrap();
        assert_eq!(op.lambda(), None);
    }

    #[test]
    fn test_display() {
        let op = ArrayOperation::from_json(&value!({
            "op": "map",
            "array": {"op": "filter", "array": "numbers", "predicate": {"param": "x", "body": "x > 2"}},
            "transform": {"params": ["x", "i"], "body": "x * i"}
        }))
        .unwrap();
        assert_eq!(op.to_string(), "numbers | filter(x => x > 2) | map((x, i) => x * i)");
    }
}

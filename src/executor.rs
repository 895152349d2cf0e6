//! Array DSL executor: runs pipelines against an `EvaluationContext`.
//!
//! `execute` (compiled plan) and `evaluate_array_operation` (raw AST) share the
//! same per-stage evaluators. Stages recurse innermost-first; lambda bodies are
//! evaluated through the context in a child scope that still sees outer
//! bindings.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::array_ops::{ArrayError, ArrayOperation, ArraySource, LambdaExpression};
use crate::array_parser::parse_array_expression;
use crate::ast::AstNode;
use crate::compiler::{compile, CompiledArrayOp};
use crate::evaluator::{EvaluationContext, Evaluator, EvaluatorError, EvaluatorOptions, Scope};
use crate::utils::is_denied_key;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run a compiled pipeline
pub fn execute<C>(compiled: &CompiledArrayOp, ctx: &C) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    debug!(source_array = %compiled.source_array, stages = compiled.steps.len(), "executing array operation");
    evaluate_array_operation(&compiled.operation, ctx)
}

/// Run an uncompiled pipeline
pub fn evaluate_array_operation<C>(op: &ArrayOperation, ctx: &C) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    evaluate_array_operation_in(op, ctx, &Scope::new())
}

/// Run an uncompiled pipeline under an existing scope
pub fn evaluate_array_operation_in<C>(
    op: &ArrayOperation,
    ctx: &C,
    scope: &Scope,
) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let items = source_items(op.source(), ctx, scope)?;
    trace!(stage = op.kind().name(), len = items.len(), "evaluating stage");

    match op {
        ArrayOperation::Map { transform, .. } => {
            evaluate_map_operation(&items, required(op, transform.as_ref(), "a transform")?, ctx, scope)
        }
        ArrayOperation::Filter { predicate, .. } => {
            evaluate_filter_operation(&items, required(op, predicate.as_ref(), "a predicate")?, ctx, scope)
        }
        ArrayOperation::Reduce { reducer, initial, .. } => {
            let reducer = required(op, reducer.as_ref(), "a reducer")?;
            let initial = required(op, initial.as_ref(), "an initial value")?;
            let initial = ctx.evaluate_expression(initial, scope)?;
            evaluate_reduce_operation(&items, reducer, initial, ctx, scope)
        }
        ArrayOperation::Slice { start, end, step, .. } => {
            let start = required(op, start.as_ref(), "a start index")?;
            let bounds = SliceBounds {
                start: slice_argument("start", Some(start), ctx, scope)?,
                end: slice_argument("end", end.as_ref(), ctx, scope)?,
                step: slice_argument("step", step.as_ref(), ctx, scope)?,
            };
            evaluate_slice_operation(&items, bounds)
        }
        ArrayOperation::FlatMap { transform, .. } => {
            evaluate_flat_map_operation(&items, required(op, transform.as_ref(), "a transform")?, ctx, scope)
        }
    }
}

fn required<'o, T>(op: &ArrayOperation, field: Option<&'o T>, what: &str) -> Result<&'o T, ArrayError> {
    field.ok_or_else(|| ArrayError::InvalidOperation(format!("{} requires {}", op.kind(), what)))
}

fn source_items<C>(source: &ArraySource, ctx: &C, scope: &Scope) -> Result<Arc<Vec<Value>>, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    match source {
        ArraySource::Path(path) => get_array_from_expression(path, ctx, scope),
        ArraySource::Operation(inner) => match evaluate_array_operation_in(inner, ctx, scope)? {
            Value::Array(items) => Ok(items),
            other => Err(ArrayError::ExpectedArray(other.type_name().to_string())),
        },
    }
}

/// Resolve a dotted path to an array. Scope bindings shadow context variables;
/// a missing segment resolves to `undefined`.
pub fn get_array_from_expression<C>(
    path: &str,
    ctx: &C,
    scope: &Scope,
) -> Result<Arc<Vec<Value>>, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();
    deny(root)?;

    let mut value = scope
        .lookup(root)
        .cloned()
        .or_else(|| ctx.lookup(root))
        .unwrap_or(Value::Undefined);
    for segment in segments {
        deny(segment)?;
        value = match value.get(segment) {
            Some(next) => next.clone(),
            None if segment == "length" => match &value {
                Value::Array(items) => Value::from(items.len()),
                _ => Value::Undefined,
            },
            None => Value::Undefined,
        };
    }

    match value {
        Value::Array(items) => Ok(items),
        other => Err(ArrayError::ExpectedArray(other.type_name().to_string())),
    }
}

fn deny(key: &str) -> Result<(), ArrayError> {
    if is_denied_key(key) {
        Err(EvaluatorError::AccessDenied(key.to_string()).into())
    } else {
        Ok(())
    }
}

/// Bind `args` to the lambda's parameters positionally and evaluate the body.
/// Extra arguments (such as the element index) are ignored unless the lambda
/// declares a parameter for them.
pub fn evaluate_lambda<C>(
    lambda: &LambdaExpression,
    args: &[Value],
    ctx: &C,
    scope: &Scope,
) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let mut local = scope.child();
    for (param, arg) in lambda.params.iter().zip(args) {
        local.bind(param.as_str(), arg.clone());
    }
    Ok(ctx.evaluate_expression(&lambda.body, &local)?)
}

// ---------------------------------------------------------------------------
// Stage evaluators
// ---------------------------------------------------------------------------

pub fn evaluate_map_operation<C>(
    items: &[Value],
    transform: &LambdaExpression,
    ctx: &C,
    scope: &Scope,
) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let mut result = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        result.push(evaluate_lambda(transform, &[item.clone(), Value::from(i)], ctx, scope)?);
    }
    Ok(Value::array(result))
}

/// Keeps the original elements whose predicate is truthy
pub fn evaluate_filter_operation<C>(
    items: &[Value],
    predicate: &LambdaExpression,
    ctx: &C,
    scope: &Scope,
) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let mut result = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if evaluate_lambda(predicate, &[item.clone(), Value::from(i)], ctx, scope)?.is_truthy() {
            result.push(item.clone());
        }
    }
    Ok(Value::array(result))
}

/// Left fold; an empty input returns `initial` without calling the reducer
pub fn evaluate_reduce_operation<C>(
    items: &[Value],
    reducer: &LambdaExpression,
    initial: Value,
    ctx: &C,
    scope: &Scope,
) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let mut acc = initial;
    for (i, item) in items.iter().enumerate() {
        acc = evaluate_lambda(reducer, &[acc, item.clone(), Value::from(i)], ctx, scope)?;
    }
    Ok(acc)
}

/// Evaluated slice arguments; `None` means "use the default"
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SliceBounds {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step: Option<i64>,
}

fn slice_argument<C>(
    name: &str,
    expr: Option<&AstNode>,
    ctx: &C,
    scope: &Scope,
) -> Result<Option<i64>, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let Some(expr) = expr else {
        return Ok(None);
    };
    match ctx.evaluate_expression(expr, scope)? {
        Value::Undefined | Value::Null => Ok(None),
        Value::Number(n) if n.is_finite() => Ok(Some(n.trunc() as i64)),
        Value::Number(n) => Ok(Some(if n > 0.0 { i64::MAX } else { i64::MIN })),
        other => Err(ArrayError::InvalidArgument(format!(
            "slice {} must be a number, got {}",
            name,
            other.type_name()
        ))),
    }
}

/// Python-style slice: negative indices count from the end, a negative step
/// walks backwards, and out-of-range bounds are clamped
pub fn evaluate_slice_operation(items: &[Value], bounds: SliceBounds) -> Result<Value, ArrayError> {
    let len = items.len() as i64;
    let step = bounds.step.unwrap_or(1);
    if step == 0 {
        return Err(ArrayError::InvalidArgument("Slice step cannot be zero".to_string()));
    }

    let mut result = Vec::new();
    if step > 0 {
        let clamp = |i: i64| if i < 0 { (i + len).max(0) } else { i.min(len) };
        let start = bounds.start.map_or(0, clamp);
        let end = bounds.end.map_or(len, clamp);
        let mut i = start;
        while i < end {
            result.push(items[i as usize].clone());
            i = i.saturating_add(step);
        }
    } else {
        let clamp = |i: i64| if i < 0 { (i + len).max(-1) } else { i.min(len - 1) };
        let start = bounds.start.map_or(len - 1, clamp);
        let end = bounds.end.map_or(-1, clamp);
        let mut i = start;
        while i > end {
            result.push(items[i as usize].clone());
            i = i.saturating_add(step);
        }
    }
    Ok(Value::array(result))
}

/// Map, then splice array results in exactly one level deep
pub fn evaluate_flat_map_operation<C>(
    items: &[Value],
    transform: &LambdaExpression,
    ctx: &C,
    scope: &Scope,
) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let mut result = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match evaluate_lambda(transform, &[item.clone(), Value::from(i)], ctx, scope)? {
            Value::Array(inner) => result.extend(inner.iter().cloned()),
            other => result.push(other),
        }
    }
    Ok(Value::array(result))
}

// ---------------------------------------------------------------------------
// Convenience wrappers
// ---------------------------------------------------------------------------

/// Parse and compile array DSL source
pub fn parse_array_dsl(source: &str) -> Result<CompiledArrayOp, ArrayError> {
    compile(parse_array_expression(source)?)
}

/// Outcome of [`validate_array_dsl`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Parse and compile without raising; failures are collected as messages
pub fn validate_array_dsl(source: &str) -> ValidationResult {
    match parse_array_dsl(source) {
        Ok(_) => ValidationResult {
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => {
            debug!(source, error = %e, "array expression failed validation");
            ValidationResult {
                valid: false,
                errors: vec![e.to_string()],
            }
        }
    }
}

/// Parse, compile and execute against a fresh evaluator holding `variables`
/// (an object)
pub fn execute_array_dsl(source: &str, variables: &Value) -> Result<Value, ArrayError> {
    let variables = match variables {
        Value::Object(map) => (**map).clone(),
        Value::Null | Value::Undefined => Default::default(),
        other => {
            return Err(ArrayError::InvalidArgument(format!(
                "variables must be an object, got {}",
                other.type_name()
            )))
        }
    };
    let evaluator = Evaluator::with_options(EvaluatorOptions {
        variables,
        ..Default::default()
    });
    execute_array_dsl_with(source, &evaluator)
}

/// Parse, compile and execute against a caller-supplied context
pub fn execute_array_dsl_with<C>(source: &str, ctx: &C) -> Result<Value, ArrayError>
where
    C: EvaluationContext + ?Sized,
{
    let compiled = parse_array_dsl(source)?;
    execute(&compiled, ctx)
}

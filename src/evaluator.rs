// Expression evaluator
// Tree-walking interpreter over the AST with a property sandbox and a depth bound

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{AstNode, BinaryOp, UnaryOp};
use crate::functions::{self, array, is_builtin, Builtin, FunctionError, NativeFunction};
use crate::parser::{self, ParserError, DEFAULT_MAX_DEPTH};
use crate::utils::is_denied_key;
use crate::value::{Value, ValueType};

/// Evaluator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    #[error("Cannot access property '{property}' of {target}")]
    PropertyOfNullish { property: String, target: &'static str },

    #[error("Cannot access index {index} of {target}")]
    IndexOfNullish { index: String, target: &'static str },

    #[error("Access to '{0}' is not allowed")]
    AccessDenied(String),

    #[error("Cannot override built-in function: {0}")]
    BuiltinOverride(String),

    #[error("Maximum expression depth ({0}) exceeded")]
    MaxDepthExceeded(usize),

    #[error("Type error: {0}")]
    TypeError(String),
}

/// Reject sandbox-denied keys in every access form
fn check_key(key: &str) -> Result<(), EvaluatorError> {
    if is_denied_key(key) {
        Err(EvaluatorError::AccessDenied(key.to_string()))
    } else {
        Ok(())
    }
}

fn nullish_name(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => Some("null"),
        Value::Undefined => Some("undefined"),
        _ => None,
    }
}

/// Lexical bindings layered over the evaluator's variable table
///
/// Lambda parameters and per-call variables live here; lookups walk the
/// parent chain before falling back to the evaluator.
#[derive(Debug, Default)]
pub struct Scope<'a> {
    bindings: IndexMap<String, Value>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Scope {
            bindings: IndexMap::new(),
            parent: None,
        }
    }

    pub fn from_bindings(bindings: IndexMap<String, Value>) -> Self {
        Scope {
            bindings,
            parent: None,
        }
    }

    /// Empty scope whose lookups fall through to `self`
    pub fn child(&self) -> Scope<'_> {
        Scope {
            bindings: IndexMap::new(),
            parent: Some(self),
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }
}

/// What the array DSL needs from an expression engine: variables, functions
/// and evaluation of lambda bodies under a scope.
pub trait EvaluationContext {
    /// Instance-level variable by name
    fn lookup(&self, name: &str) -> Option<Value>;

    fn call_function(&self, name: &str, args: &[Value]) -> Result<Value, EvaluatorError>;

    fn evaluate_expression(&self, expr: &AstNode, scope: &Scope) -> Result<Value, EvaluatorError>;
}

/// Evaluator configuration
///
/// Deserializes from the `{variables, maxDepth}` block of a mapping definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorOptions {
    pub variables: IndexMap<String, Value>,
    /// Bound on sub-expression nesting during both parsing and evaluation.
    ///
    /// Every operator node is one level at evaluation time, so a flat chain
    /// such as `a + b + c` (which parses left-deep) uses one level per
    /// operator: `n` terms need `max_depth >= n`.
    pub max_depth: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        EvaluatorOptions {
            variables: IndexMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of [`Evaluator::evaluate`]: a value, its type tag, or an error
/// message with an `undefined` value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionResult {
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExpressionResult {
    pub fn ok(value: Value) -> Self {
        ExpressionResult {
            value_type: value.value_type(),
            value,
            error: None,
        }
    }

    pub fn err(error: impl fmt::Display) -> Self {
        ExpressionResult {
            value: Value::Undefined,
            value_type: ValueType::Undefined,
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Evaluator for expressions
///
/// Each instance owns its variable and function tables. Evaluation takes
/// `&self`, so a configured evaluator can be shared across threads.
#[derive(Clone)]
pub struct Evaluator {
    variables: IndexMap<String, Value>,
    functions: IndexMap<String, NativeFunction>,
    max_depth: usize,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("variables", &self.variables)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_options(EvaluatorOptions::default())
    }

    pub fn with_options(options: EvaluatorOptions) -> Self {
        Evaluator {
            variables: options.variables,
            functions: IndexMap::new(),
            max_depth: options.max_depth,
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Register a host function under `name`. Built-in names are reserved.
    pub fn register_function<F>(&mut self, name: impl Into<String>, f: F) -> Result<(), EvaluatorError>
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        let name = name.into();
        if is_builtin(&name) {
            return Err(EvaluatorError::BuiltinOverride(name));
        }
        debug!(function = %name, "registering custom function");
        self.functions.insert(name, std::sync::Arc::new(f));
        Ok(())
    }

    pub fn has_function(&self, name: &str) -> bool {
        is_builtin(name) || self.functions.contains_key(name)
    }

    /// Parse with this instance's depth bound
    pub fn parse_expression(&self, source: &str) -> Result<AstNode, ParserError> {
        parser::parse_with_max_depth(source, self.max_depth)
    }

    /// Parse and evaluate `source`. Never fails: errors are reported in
    /// [`ExpressionResult::error`].
    pub fn evaluate(&self, source: &str) -> ExpressionResult {
        self.evaluate_in(source, &Scope::new())
    }

    /// Like [`evaluate`](Self::evaluate) with per-call variables that shadow
    /// the instance's own
    pub fn evaluate_with(&self, source: &str, variables: &IndexMap<String, Value>) -> ExpressionResult {
        self.evaluate_in(source, &Scope::from_bindings(variables.clone()))
    }

    fn evaluate_in(&self, source: &str, scope: &Scope) -> ExpressionResult {
        debug!(source, "evaluating expression");
        match self.try_evaluate(source, scope) {
            Ok(value) => ExpressionResult::ok(value),
            Err(e) => {
                debug!(source, error = %e, "expression evaluation failed");
                ExpressionResult::err(e)
            }
        }
    }

    /// Parse and evaluate, propagating errors
    pub fn try_evaluate(&self, source: &str, scope: &Scope) -> Result<Value, EvaluatorError> {
        let ast = self.parse_expression(source)?;
        self.evaluate_ast(&ast, scope)
    }

    /// Evaluate an already-parsed AST
    pub fn evaluate_ast(&self, node: &AstNode, scope: &Scope) -> Result<Value, EvaluatorError> {
        self.eval(node, scope, 0)
    }

    fn enter(&self, depth: usize) -> Result<usize, EvaluatorError> {
        if depth >= self.max_depth {
            Err(EvaluatorError::MaxDepthExceeded(self.max_depth))
        } else {
            Ok(depth + 1)
        }
    }

    fn eval(&self, node: &AstNode, scope: &Scope, depth: usize) -> Result<Value, EvaluatorError> {
        let depth = self.enter(depth)?;

        match node {
            AstNode::Literal(value) => Ok(value.clone()),

            AstNode::Identifier(name) => self.resolve_identifier(name, scope),

            AstNode::Member { object, property } => {
                check_key(property)?;
                let target = self.eval(object, scope, depth)?;
                get_property(&target, property)
            }

            AstNode::Index { object, index } => {
                let target = self.eval(object, scope, depth)?;
                let index = self.eval(index, scope, depth)?;
                get_index(&target, &index)
            }

            AstNode::Unary { op, operand } => {
                let value = self.eval(operand, scope, depth)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Negate => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(EvaluatorError::TypeError(format!(
                            "Cannot negate {}",
                            other.type_name()
                        ))),
                    },
                }
            }

            AstNode::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, scope, depth),

            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, scope, depth)?.is_truthy() {
                    self.eval(then_branch, scope, depth)
                } else {
                    self.eval(else_branch, scope, depth)
                }
            }

            AstNode::Call { name, args } => {
                check_key(name)?;
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, scope, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_at(name, &values, depth)
            }
        }
    }

    /// Scope chain, then instance variables, then function names
    fn resolve_identifier(&self, name: &str, scope: &Scope) -> Result<Value, EvaluatorError> {
        check_key(name)?;
        if let Some(value) = scope.lookup(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.variables.get(name) {
            return Ok(value.clone());
        }
        if self.has_function(name) {
            return Ok(Value::function(name));
        }
        Err(EvaluatorError::UndefinedVariable(name.to_string()))
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        lhs: &AstNode,
        rhs: &AstNode,
        scope: &Scope,
        depth: usize,
    ) -> Result<Value, EvaluatorError> {
        let left = self.eval(lhs, scope, depth)?;

        // Short-circuiting operators never touch the right side unless needed
        match op {
            BinaryOp::And => {
                return if left.is_truthy() {
                    self.eval(rhs, scope, depth)
                } else {
                    Ok(left)
                }
            }
            BinaryOp::Or => {
                return if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs, scope, depth)
                }
            }
            BinaryOp::Coalesce => {
                return if left.is_nullish() {
                    self.eval(rhs, scope, depth)
                } else {
                    Ok(left)
                }
            }
            _ => {}
        }

        let right = self.eval(rhs, scope, depth)?;
        apply_binary(op, &left, &right)
    }

    /// Built-ins first, then registered functions
    fn call_at(&self, name: &str, args: &[Value], depth: usize) -> Result<Value, EvaluatorError> {
        if let Some(builtin) = Builtin::from_name(name) {
            return self.call_builtin(builtin, args, depth);
        }
        if let Some(f) = self.functions.get(name) {
            trace!(function = name, argc = args.len(), "calling custom function");
            return Ok(f(args)?);
        }
        Err(EvaluatorError::UndefinedFunction(name.to_string()))
    }

    fn call_builtin(&self, builtin: Builtin, args: &[Value], depth: usize) -> Result<Value, EvaluatorError> {
        trace!(function = builtin.name(), argc = args.len(), "calling builtin");
        if !builtin.takes_callback() {
            return Ok(functions::call_simple(builtin, args)?);
        }

        let depth = self.enter(depth)?;
        let items = args.first().unwrap_or(&Value::Undefined);
        if !items.is_array() {
            return Err(FunctionError::ExpectedArray {
                function: builtin.name().to_string(),
                got: items.type_name().to_string(),
            }
            .into());
        }
        let callback_arg = args.get(1).unwrap_or(&Value::Undefined);

        match builtin {
            Builtin::Map => array::map(items, self.callback(builtin, callback_arg, depth)?),
            Builtin::Filter => array::filter(items, self.callback(builtin, callback_arg, depth)?),
            Builtin::Find => array::find(items, self.callback(builtin, callback_arg, depth)?),
            Builtin::Some => array::some(items, self.callback(builtin, callback_arg, depth)?),
            Builtin::Every => array::every(items, self.callback(builtin, callback_arg, depth)?),
            Builtin::FlatMap => array::flat_map(items, self.callback(builtin, callback_arg, depth)?),
            Builtin::Reduce => array::reduce(
                items,
                self.callback(builtin, callback_arg, depth)?,
                args.get(2),
            ),
            Builtin::Sort => {
                if callback_arg.is_undefined() {
                    return array::sort::<EvaluatorError>(items, None);
                }
                let mut compare = self.callback(builtin, callback_arg, depth)?;
                let compare: &mut dyn FnMut(&[Value]) -> Result<Value, EvaluatorError> = &mut compare;
                array::sort(items, Some(compare))
            }
            _ => Ok(functions::call_simple(builtin, args)?),
        }
    }

    /// Turn a function reference argument into a callable
    fn callback<'s>(
        &'s self,
        builtin: Builtin,
        f: &Value,
        depth: usize,
    ) -> Result<impl FnMut(&[Value]) -> Result<Value, EvaluatorError> + 's, EvaluatorError> {
        match f {
            Value::Function(name) => {
                let name = name.clone();
                Ok(move |args: &[Value]| self.call_at(&name, args, depth))
            }
            other => Err(FunctionError::ArgumentError(format!(
                "{} requires a function, got {}",
                builtin.name(),
                other.type_name()
            ))
            .into()),
        }
    }
}

impl EvaluationContext for Evaluator {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.variable(name).cloned()
    }

    fn call_function(&self, name: &str, args: &[Value]) -> Result<Value, EvaluatorError> {
        self.call_at(name, args, 0)
    }

    fn evaluate_expression(&self, expr: &AstNode, scope: &Scope) -> Result<Value, EvaluatorError> {
        self.evaluate_ast(expr, scope)
    }
}

/// Dotted member access; `length` is available on arrays and strings
pub(crate) fn get_property(target: &Value, property: &str) -> Result<Value, EvaluatorError> {
    if let Some(target) = nullish_name(target) {
        return Err(EvaluatorError::PropertyOfNullish {
            property: property.to_string(),
            target,
        });
    }
    Ok(match target {
        Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) if property == "length" => Value::from(items.len()),
        Value::String(s) if property == "length" => Value::from(s.chars().count()),
        _ => Value::Undefined,
    })
}

/// Bracket access with a computed key
fn get_index(target: &Value, index: &Value) -> Result<Value, EvaluatorError> {
    if let Value::String(key) = index {
        check_key(key)?;
    }
    if let Some(target) = nullish_name(target) {
        return Err(EvaluatorError::IndexOfNullish {
            index: index.to_display_string(),
            target,
        });
    }

    let position = index
        .as_f64()
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as usize);

    Ok(match (target, position) {
        (Value::Array(_), Some(i)) => target.get_index(i).cloned().unwrap_or(Value::Undefined),
        (Value::String(s), Some(i)) => s
            .chars()
            .nth(i)
            .map(|c| Value::from(c.to_string()))
            .unwrap_or(Value::Undefined),
        (Value::Object(map), _) => {
            let key = index.to_display_string();
            check_key(&key)?;
            map.get(key.as_str()).cloned().unwrap_or(Value::Undefined)
        }
        (Value::Array(_) | Value::String(_), None) => match index {
            Value::String(key) => get_property(target, key)?,
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    })
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluatorError> {
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => return Ok(Value::Bool(left != right)),
        BinaryOp::Add if left.is_string() || right.is_string() => {
            let mut s = left.to_display_string();
            s.push_str(&right.to_display_string());
            return Ok(Value::from(s));
        }
        _ => {}
    }

    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (*a, *b);
            Ok(match op {
                BinaryOp::Add => Value::Number(a + b),
                BinaryOp::Subtract => Value::Number(a - b),
                BinaryOp::Multiply => Value::Number(a * b),
                // IEEE-754: x / 0 is ±Infinity, 0 / 0 is NaN
                BinaryOp::Divide => Value::Number(a / b),
                BinaryOp::Modulo => Value::Number(a % b),
                BinaryOp::LessThan => Value::Bool(a < b),
                BinaryOp::LessThanOrEqual => Value::Bool(a <= b),
                BinaryOp::GreaterThan => Value::Bool(a > b),
                BinaryOp::GreaterThanOrEqual => Value::Bool(a >= b),
                _ => return Err(unsupported(op, left, right)),
            })
        }
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(match op {
            BinaryOp::LessThan => a < b,
            BinaryOp::LessThanOrEqual => a <= b,
            BinaryOp::GreaterThan => a > b,
            BinaryOp::GreaterThanOrEqual => a >= b,
            _ => return Err(unsupported(op, left, right)),
        })),
        _ => Err(unsupported(op, left, right)),
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvaluatorError {
    EvaluatorError::TypeError(format!(
        "Operator '{}' cannot be applied to {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

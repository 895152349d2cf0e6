//! Array DSL compiler: validates a pipeline and lowers it to a `CompiledArrayOp`.
//!
//! The compiler walks the operation chain once, innermost stage first, checking
//! each stage's required arguments and lambda arity and recording a
//! human-readable step description in execution order.

use tracing::{debug, trace};

use crate::array_ops::{ArrayError, ArrayOperation, ArraySource};

/// A validated pipeline plus its execution plan
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledArrayOp {
    pub operation: ArrayOperation,
    /// Dotted path at the bottom of the chain
    pub source_array: String,
    /// One description per stage, in execution order
    pub steps: Vec<String>,
}

// ---------------------------------------------------------------------------
// Compiler state
// ---------------------------------------------------------------------------

pub(crate) struct ArrayCompiler {
    steps: Vec<String>,
}

impl ArrayCompiler {
    pub(crate) fn new() -> Self {
        ArrayCompiler {
            steps: Vec::with_capacity(4),
        }
    }

    /// Validate `op` and everything beneath it; returns the source path
    pub(crate) fn compile_stage(&mut self, op: &ArrayOperation) -> Result<String, ArrayError> {
        let source = match op.source() {
            ArraySource::Path(path) => {
                if path.is_empty() || path.split('.').any(str::is_empty) {
                    return Err(ArrayError::InvalidOperation(format!(
                        "{} has an invalid source path '{}'",
                        op.kind(),
                        path
                    )));
                }
                path.clone()
            }
            ArraySource::Operation(inner) => self.compile_stage(inner)?,
        };

        validate_arguments(op)?;
        trace!(stage = op.kind().name(), "compiled stage");
        self.steps.push(op.kind().description().to_string());
        Ok(source)
    }

    pub(crate) fn finish(self, operation: ArrayOperation, source_array: String) -> CompiledArrayOp {
        CompiledArrayOp {
            operation,
            source_array,
            steps: self.steps,
        }
    }
}

fn validate_arguments(op: &ArrayOperation) -> Result<(), ArrayError> {
    let kind = op.kind();
    let missing = |what: &str| ArrayError::InvalidOperation(format!("{} requires {}", kind, what));

    match op {
        ArrayOperation::Map { transform: None, .. } | ArrayOperation::FlatMap { transform: None, .. } => {
            return Err(missing("a transform"))
        }
        ArrayOperation::Filter { predicate: None, .. } => return Err(missing("a predicate")),
        ArrayOperation::Reduce { reducer: None, .. } => return Err(missing("a reducer")),
        ArrayOperation::Reduce { initial: None, .. } => return Err(missing("an initial value")),
        ArrayOperation::Slice { start: None, .. } => return Err(missing("a start index")),
        _ => {}
    }

    if let (Some(lambda), Some(arity)) = (op.lambda(), kind.lambda_arity()) {
        if lambda.params.len() != arity {
            return Err(ArrayError::InvalidOperation(format!(
                "{} lambda must take {} parameter{}, got {}",
                kind,
                arity,
                if arity == 1 { "" } else { "s" },
                lambda.params.len()
            )));
        }
    }
    Ok(())
}

/// Validate a pipeline and produce its execution plan
pub fn compile(operation: ArrayOperation) -> Result<CompiledArrayOp, ArrayError> {
    let mut compiler = ArrayCompiler::new();
    let source_array = compiler.compile_stage(&operation)?;
    debug!(source_array = %source_array, stages = compiler.steps.len(), "compiled array operation");
    Ok(compiler.finish(operation, source_array))
}

// edl-expr - Safe expression language and array pipeline DSL for EDL mappings
// Copyright (c) 2025 edl-expr contributors
// Licensed under the MIT License

//! # edl-expr
//!
//! The embedded-language core of the EDL compiler: a sandboxed expression
//! language for computed mapping fields, and a pipeline DSL for array
//! transformations (`items | filter(x => x.active) | map(x => x.id)`).
//!
//! ## Architecture
//!
//! - `parser` - Tokenizer and Pratt parser (expression source to AST)
//! - `ast` - Abstract Syntax Tree definitions
//! - `evaluator` - Expression evaluator (executes AST against variables)
//! - `functions` - Built-in function implementations
//! - `array_ops` - Array DSL operations and lambdas
//! - `array_parser` - Array DSL parser (pipe and method chains)
//! - `compiler` - Array DSL validation and execution plans
//! - `executor` - Array DSL execution
//! - `compute` - Computed mapping values (conditional, switch, call)
//! - `value` - Runtime value type
//! - `utils` - Property sandbox and number helpers
//!
//! The two layers report errors differently. [`Evaluator::evaluate`] never
//! fails and returns an [`ExpressionResult`] carrying the error message; the
//! array DSL returns `Result<_, ArrayError>`.
//!
//! ```
//! use edl_expr::{execute_array_dsl, value, Evaluator};
//!
//! let mut evaluator = Evaluator::new();
//! evaluator.set_variable("price", 10);
//! assert_eq!(evaluator.evaluate("price * 2 + 1").value, value!(21));
//!
//! let total = execute_array_dsl(
//!     "numbers | filter(x => x > 2) | map(x => x * 2) | reduce((acc, x) => acc + x, 0)",
//!     &value!({"numbers": [1, 2, 3, 4, 5]}),
//! )
//! .unwrap();
//! assert_eq!(total, value!(24));
//! ```

pub mod array_ops;
pub mod array_parser;
pub mod ast;
pub mod compiler;
pub mod compute;
pub mod evaluator;
pub mod executor;
pub mod functions;
pub mod parser;
pub mod utils;
pub mod value;

#[doc(hidden)]
pub use indexmap;

pub use array_ops::{ArrayError, ArrayOp, ArrayOperation, ArraySource, LambdaExpression};
pub use array_parser::parse_array_expression;
pub use ast::{AstNode, BinaryOp, UnaryOp};
pub use compiler::{compile, CompiledArrayOp};
pub use compute::ComputeExpression;
pub use evaluator::{
    EvaluationContext, Evaluator, EvaluatorError, EvaluatorOptions, ExpressionResult, Scope,
};
pub use executor::{
    evaluate_array_operation, execute, execute_array_dsl, execute_array_dsl_with, parse_array_dsl,
    validate_array_dsl, ValidationResult,
};
pub use functions::{FunctionError, NativeFunction};
pub use parser::{parse, ParserError, DEFAULT_MAX_DEPTH};
pub use value::{Value, ValueType};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_version() {
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    }

    #[test]
    fn test_reexports_cover_both_layers() {
        let ast = parse("a ?? 1").unwrap();
        assert!(matches!(ast, AstNode::Binary { op: BinaryOp::Coalesce, .. }));

        let compiled = parse_array_dsl("items | slice(1)").unwrap();
        assert_eq!(compiled.steps, vec!["Slice elements"]);
    }
}

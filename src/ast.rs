// Abstract Syntax Tree definitions for the expression language

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// AST Node types
///
/// Closed set of expression forms. Nodes are immutable once built and are
/// never cached between parse calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    /// Number, string, boolean, `null` or `undefined` literal
    Literal(Value),

    /// Bare variable reference (e.g. `price`)
    Identifier(String),

    /// Dotted member access (e.g. `user.name`)
    Member {
        object: Box<AstNode>,
        property: String,
    },

    /// Bracket access (e.g. `items[0]`, `obj["foo-bar"]`, `numbers[index]`)
    Index {
        object: Box<AstNode>,
        index: Box<AstNode>,
    },

    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<AstNode>,
    },

    /// Conditional expression (`cond ? a : b`)
    Conditional {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },

    /// Function call by name
    Call { name: String, args: Vec<AstNode> },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,

    // Coalescing
    Coalesce, // ??
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation (-)
    Negate,

    /// Logical NOT (!)
    Not,
}

impl BinaryOp {
    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl AstNode {
    /// Create a string literal node
    pub fn string(s: impl Into<String>) -> Self {
        AstNode::Literal(Value::from(s.into()))
    }

    /// Create a number literal node
    pub fn number(n: f64) -> Self {
        AstNode::Literal(Value::Number(n))
    }

    /// Create a boolean literal node
    pub fn boolean(b: bool) -> Self {
        AstNode::Literal(Value::Bool(b))
    }

    /// Create a null literal node
    pub fn null() -> Self {
        AstNode::Literal(Value::Null)
    }

    /// Create an undefined literal node
    pub fn undefined() -> Self {
        AstNode::Literal(Value::Undefined)
    }

    /// Create a variable reference node
    pub fn identifier(name: impl Into<String>) -> Self {
        AstNode::Identifier(name.into())
    }

    pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
        AstNode::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn member(object: AstNode, property: impl Into<String>) -> Self {
        AstNode::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    /// Dotted path (`a.b.c`) as an identifier followed by member accesses.
    /// Returns `None` for an empty path.
    pub fn path(path: &str) -> Option<Self> {
        let mut segments = path.split('.');
        let root = segments.next().filter(|s| !s.is_empty())?;
        Some(segments.fold(AstNode::identifier(root), AstNode::member))
    }
}

/// Operator precedence used by `Display` to decide where parentheses are needed
fn precedence(node: &AstNode) -> u8 {
    match node {
        AstNode::Conditional { .. } => 1,
        AstNode::Binary { op, .. } => match op {
            BinaryOp::Coalesce => 2,
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::Equal | BinaryOp::NotEqual => 5,
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => 6,
            BinaryOp::Add | BinaryOp::Subtract => 7,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 8,
        },
        AstNode::Unary { .. } => 9,
        _ => 10,
    }
}

struct Operand<'a>(&'a AstNode, u8);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if precedence(self.0) < self.1 {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Renders the node back to expression source; re-parsing the output yields
/// an equal tree.
impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = precedence(self);
        match self {
            AstNode::Literal(value) => write!(f, "{}", value),
            AstNode::Identifier(name) => write!(f, "{}", name),
            AstNode::Member { object, property } => {
                write!(f, "{}.{}", Operand(object, 10), property)
            }
            AstNode::Index { object, index } => write!(f, "{}[{}]", Operand(object, 10), index),
            AstNode::Binary { op, lhs, rhs } => {
                // left-associative: the right operand needs parens at equal precedence
                write!(f, "{} {} {}", Operand(lhs, prec), op.symbol(), Operand(rhs, prec + 1))
            }
            AstNode::Unary { op, operand } => write!(f, "{}{}", op.symbol(), Operand(operand, prec)),
            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => write!(
                f,
                "{} ? {} : {}",
                Operand(condition, prec + 1),
                then_branch,
                else_branch
            ),
            AstNode::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ast_node_creation() {
        assert!(matches!(AstNode::string("hello"), AstNode::Literal(Value::String(_))));
        assert!(matches!(AstNode::number(42.0), AstNode::Literal(Value::Number(_))));
        assert!(matches!(AstNode::boolean(true), AstNode::Literal(Value::Bool(true))));
        assert!(matches!(AstNode::null(), AstNode::Literal(Value::Null)));
        assert!(matches!(AstNode::undefined(), AstNode::Literal(Value::Undefined)));
    }

    #[test]
    fn test_path_builder() {
        let node = AstNode::path("order.items").unwrap();
        assert_eq!(node, AstNode::member(AstNode::identifier("order"), "items"));
        assert!(AstNode::path("").is_none());
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let node = AstNode::binary(
            BinaryOp::Multiply,
            AstNode::binary(BinaryOp::Add, AstNode::number(1.0), AstNode::number(2.0)),
            AstNode::number(3.0),
        );
        assert_eq!(node.to_string(), "(1 + 2) * 3");

        let node = AstNode::binary(
            BinaryOp::Subtract,
            AstNode::number(1.0),
            AstNode::binary(BinaryOp::Subtract, AstNode::number(2.0), AstNode::number(3.0)),
        );
        assert_eq!(node.to_string(), "1 - (2 - 3)");
    }

    #[test]
    fn test_display_member_and_call() {
        let node = AstNode::Call {
            name: "concat".to_string(),
            args: vec![AstNode::path("user.name").unwrap(), AstNode::string("!")],
        };
        assert_eq!(node.to_string(), r#"concat(user.name, "!")"#);
    }
}

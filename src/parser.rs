// Expression tokenizer and parser
// Pratt (binding-power) recursive descent over a pre-tokenized stream

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::ast::{AstNode, BinaryOp, UnaryOp};
use crate::value::Value;

/// Default nesting bound shared by the parser and the evaluator
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Empty expression")]
    EmptyExpression,

    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unclosed string literal")]
    UnclosedString,

    #[error("Invalid escape sequence: {0}")]
    InvalidEscape(String),

    #[error("Expected {expected}, found {found}")]
    Expected { expected: String, found: String },

    #[error("Maximum nesting depth ({0}) exceeded")]
    MaxDepthExceeded(usize),

    #[error("Unknown array operation: {0}")]
    UnknownArrayOperation(String),

    #[error("Array expression must contain at least one array operation")]
    MissingArrayOperation,
}

/// Token types for the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    True,
    False,
    Null,
    Undefined,

    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual, // == and ===
    NotEqual,   // != and !==
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Not,
    Coalesce,
    Question,
    Colon,
    Dot,

    // Array DSL
    Pipe,
    Arrow,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,

    Eof,
}

impl TokenKind {
    /// Upper-case token name used in `Expected X, found Y` messages
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Number(_) => "NUMBER",
            TokenKind::String(_) => "STRING",
            TokenKind::True | TokenKind::False => "BOOLEAN",
            TokenKind::Null => "NULL",
            TokenKind::Undefined => "UNDEFINED",
            TokenKind::Identifier(_) => "IDENTIFIER",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "STAR",
            TokenKind::Slash => "SLASH",
            TokenKind::Percent => "PERCENT",
            TokenKind::EqualEqual => "EQ",
            TokenKind::NotEqual => "NEQ",
            TokenKind::LessThan => "LT",
            TokenKind::LessThanOrEqual => "LTE",
            TokenKind::GreaterThan => "GT",
            TokenKind::GreaterThanOrEqual => "GTE",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Coalesce => "COALESCE",
            TokenKind::Question => "QUESTION",
            TokenKind::Colon => "COLON",
            TokenKind::Dot => "DOT",
            TokenKind::Pipe => "PIPE",
            TokenKind::Arrow => "ARROW",
            TokenKind::LeftParen => "LPAREN",
            TokenKind::RightParen => "RPAREN",
            TokenKind::LeftBracket => "LBRACKET",
            TokenKind::RightBracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "NUMBER({})", Value::Number(*n)),
            TokenKind::String(s) => write!(f, "STRING({:?})", s),
            TokenKind::Identifier(name) => write!(f, "IDENTIFIER({})", name),
            other => f.write_str(other.name()),
        }
    }
}

/// A lexical unit with the char offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Lexer for tokenizing expressions
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, ParserError> {
        let mut result = String::new();
        self.advance(); // skip opening quote

        loop {
            match self.current() {
                None => return Err(ParserError::UnclosedString),
                Some(ch) if ch == quote_char => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        None => return Err(ParserError::UnclosedString),
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some('/') => result.push('/'),
                        Some('u') => {
                            self.advance();
                            result.push(self.read_unicode_escape()?);
                            continue;
                        }
                        Some(ch) => return Err(ParserError::InvalidEscape(format!("\\{}", ch))),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    // \uXXXX, positioned after the `u`
    fn read_unicode_escape(&mut self) -> Result<char, ParserError> {
        let mut hex = String::with_capacity(4);
        for _ in 0..4 {
            match self.current() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(h);
                    self.advance();
                }
                _ => return Err(ParserError::InvalidEscape(format!("\\u{}", hex))),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| ParserError::InvalidEscape(format!("\\u{}", hex)))
    }

    /// Unsigned numeral; a leading `-` is always the unary operator
    fn read_number(&mut self) -> Result<f64, ParserError> {
        let start = self.position;

        while self.current().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // `1.foo` leaves the dot for member access
        if self.current() == Some('.') && self.peek(1).map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            while self.current().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.current(), Some('e') | Some('E')) {
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.current().map_or(false, |c| c.is_ascii_digit()) {
                let text: String = self.input[start..self.position].iter().collect();
                return Err(ParserError::InvalidNumber(text));
            }
            while self.current().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str: String = self.input[start..self.position].iter().collect();
        num_str
            .parse()
            .map_err(|_| ParserError::InvalidNumber(num_str))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.position].iter().collect()
    }

    // Consume `len` chars and produce `kind`
    fn symbol(&mut self, kind: TokenKind, len: usize) -> TokenKind {
        for _ in 0..len {
            self.advance();
        }
        kind
    }

    pub fn next_token(&mut self) -> Result<Token, ParserError> {
        self.skip_whitespace();
        let position = self.position;

        let kind = match self.current() {
            None => TokenKind::Eof,

            Some('"') => TokenKind::String(self.read_string('"')?),
            Some('\'') => TokenKind::String(self.read_string('\'')?),

            Some(ch) if ch.is_ascii_digit() => TokenKind::Number(self.read_number()?),

            // Three- and two-character operators
            Some('=') if self.peek(1) == Some('=') => {
                let len = if self.peek(2) == Some('=') { 3 } else { 2 };
                self.symbol(TokenKind::EqualEqual, len)
            }
            Some('!') if self.peek(1) == Some('=') => {
                let len = if self.peek(2) == Some('=') { 3 } else { 2 };
                self.symbol(TokenKind::NotEqual, len)
            }
            Some('=') if self.peek(1) == Some('>') => self.symbol(TokenKind::Arrow, 2),
            Some('<') if self.peek(1) == Some('=') => self.symbol(TokenKind::LessThanOrEqual, 2),
            Some('>') if self.peek(1) == Some('=') => {
                self.symbol(TokenKind::GreaterThanOrEqual, 2)
            }
            Some('&') if self.peek(1) == Some('&') => self.symbol(TokenKind::And, 2),
            Some('|') if self.peek(1) == Some('|') => self.symbol(TokenKind::Or, 2),
            Some('?') if self.peek(1) == Some('?') => self.symbol(TokenKind::Coalesce, 2),

            // Single-character operators and delimiters
            Some('+') => self.symbol(TokenKind::Plus, 1),
            Some('-') => self.symbol(TokenKind::Minus, 1),
            Some('*') => self.symbol(TokenKind::Star, 1),
            Some('/') => self.symbol(TokenKind::Slash, 1),
            Some('%') => self.symbol(TokenKind::Percent, 1),
            Some('<') => self.symbol(TokenKind::LessThan, 1),
            Some('>') => self.symbol(TokenKind::GreaterThan, 1),
            Some('!') => self.symbol(TokenKind::Not, 1),
            Some('?') => self.symbol(TokenKind::Question, 1),
            Some(':') => self.symbol(TokenKind::Colon, 1),
            Some('.') => self.symbol(TokenKind::Dot, 1),
            Some('|') => self.symbol(TokenKind::Pipe, 1),
            Some('(') => self.symbol(TokenKind::LeftParen, 1),
            Some(')') => self.symbol(TokenKind::RightParen, 1),
            Some('[') => self.symbol(TokenKind::LeftBracket, 1),
            Some(']') => self.symbol(TokenKind::RightBracket, 1),
            Some(',') => self.symbol(TokenKind::Comma, 1),

            // Identifiers and keywords
            Some(ch) if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                let ident = self.read_identifier();
                match ident.as_str() {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "undefined" => TokenKind::Undefined,
                    _ => TokenKind::Identifier(ident),
                }
            }

            Some(ch) => return Err(ParserError::UnexpectedCharacter { ch, position }),
        };

        Ok(Token { kind, position })
    }

    /// Tokenize the whole input; the result always ends with `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParserError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

static EOF: TokenKind = TokenKind::Eof;

/// Binding powers, higher binds tighter
const TERNARY_BP: u8 = 4;
const UNARY_BP: u8 = 80;
const POSTFIX_BP: u8 = 90;

/// Parser for expressions using Pratt parsing
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParserError> {
        Self::with_max_depth(input, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(input: &str, max_depth: usize) -> Result<Self, ParserError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Parser {
            tokens,
            position: 0,
            depth: 0,
            max_depth,
        })
    }

    pub(crate) fn current(&self) -> &TokenKind {
        self.peek_kind(0)
    }

    /// Look ahead without consuming; past the end is `Eof`
    pub(crate) fn peek_kind(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.position + offset)
            .or_else(|| self.tokens.last())
            .map_or(&EOF, |t| &t.kind)
    }

    pub(crate) fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        *self.current() == TokenKind::Eof
    }

    pub(crate) fn expect(&mut self, expected: TokenKind) -> Result<(), ParserError> {
        if std::mem::discriminant(self.current()) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected(expected.name()))
        }
    }

    pub(crate) fn expected(&self, expected: &str) -> ParserError {
        ParserError::Expected {
            expected: expected.to_string(),
            found: self.current().to_string(),
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParserError> {
        match self.current() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected("IDENTIFIER")),
        }
    }

    /// Returns (left_bp, right_bp) for infix and postfix operators
    fn binding_power(token: &TokenKind) -> Option<(u8, u8)> {
        match token {
            // right-associative: the else branch re-enters at the same level
            TokenKind::Question => Some((TERNARY_BP, TERNARY_BP)),
            TokenKind::Coalesce => Some((10, 11)),
            TokenKind::Or => Some((20, 21)),
            TokenKind::And => Some((30, 31)),
            TokenKind::EqualEqual | TokenKind::NotEqual => Some((40, 41)),
            TokenKind::LessThan
            | TokenKind::LessThanOrEqual
            | TokenKind::GreaterThan
            | TokenKind::GreaterThanOrEqual => Some((50, 51)),
            TokenKind::Plus | TokenKind::Minus => Some((60, 61)),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some((70, 71)),
            TokenKind::Dot | TokenKind::LeftBracket | TokenKind::LeftParen => {
                Some((POSTFIX_BP, POSTFIX_BP + 1))
            }
            _ => None,
        }
    }

    fn binary_op(token: &TokenKind) -> Option<BinaryOp> {
        let op = match token {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Subtract,
            TokenKind::Star => BinaryOp::Multiply,
            TokenKind::Slash => BinaryOp::Divide,
            TokenKind::Percent => BinaryOp::Modulo,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            TokenKind::LessThan => BinaryOp::LessThan,
            TokenKind::LessThanOrEqual => BinaryOp::LessThanOrEqual,
            TokenKind::GreaterThan => BinaryOp::GreaterThan,
            TokenKind::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            TokenKind::Coalesce => BinaryOp::Coalesce,
            _ => return None,
        };
        Some(op)
    }

    /// Parse a primary expression (literals, identifiers, grouping, prefix operators)
    fn parse_primary(&mut self) -> Result<AstNode, ParserError> {
        let node = match self.current().clone() {
            TokenKind::Number(n) => AstNode::number(n),
            TokenKind::String(s) => AstNode::string(s),
            TokenKind::True => AstNode::boolean(true),
            TokenKind::False => AstNode::boolean(false),
            TokenKind::Null => AstNode::null(),
            TokenKind::Undefined => AstNode::undefined(),
            TokenKind::Identifier(name) => AstNode::Identifier(name),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression(0)?;
                self.expect(TokenKind::RightParen)?;
                return Ok(inner);
            }
            TokenKind::Minus | TokenKind::Not => {
                let op = if *self.current() == TokenKind::Minus {
                    UnaryOp::Negate
                } else {
                    UnaryOp::Not
                };
                self.advance();
                let operand = self.parse_expression(UNARY_BP)?;
                return Ok(AstNode::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
            TokenKind::Eof => return Err(ParserError::UnexpectedEnd),
            other => return Err(ParserError::UnexpectedToken(other.to_string())),
        };
        self.advance();
        Ok(node)
    }

    /// Parse an expression with Pratt parsing; every nested call counts
    /// against the depth bound
    pub(crate) fn parse_expression(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(ParserError::MaxDepthExceeded(self.max_depth));
        }
        let result = self.parse_expression_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        let mut lhs = self.parse_primary()?;

        loop {
            let (left_bp, right_bp) = match Self::binding_power(self.current()) {
                Some(bp) => bp,
                None => break,
            };

            if left_bp < min_bp {
                break;
            }

            match self.current() {
                TokenKind::Dot => {
                    self.advance();
                    let property = match self.current().clone() {
                        TokenKind::Identifier(name) => name,
                        // keywords are valid property names after a dot
                        TokenKind::True => "true".to_string(),
                        TokenKind::False => "false".to_string(),
                        TokenKind::Null => "null".to_string(),
                        TokenKind::Undefined => "undefined".to_string(),
                        _ => return Err(self.expected("IDENTIFIER")),
                    };
                    self.advance();
                    lhs = AstNode::Member {
                        object: Box::new(lhs),
                        property,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression(0)?;
                    self.expect(TokenKind::RightBracket)?;
                    lhs = AstNode::Index {
                        object: Box::new(lhs),
                        index: Box::new(index),
                    };
                }
                TokenKind::LeftParen => {
                    let name = match &lhs {
                        AstNode::Identifier(name) => name.clone(),
                        _ => {
                            return Err(ParserError::InvalidSyntax(
                                "Invalid function call".to_string(),
                            ))
                        }
                    };
                    self.advance();
                    let args = self.parse_arguments()?;
                    lhs = AstNode::Call { name, args };
                }
                TokenKind::Question => {
                    self.advance();
                    let then_branch = self.parse_expression(0)?;
                    self.expect(TokenKind::Colon)?;
                    let else_branch = self.parse_expression(right_bp)?;
                    lhs = AstNode::Conditional {
                        condition: Box::new(lhs),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    };
                }
                token => {
                    let op = Self::binary_op(token)
                        .ok_or_else(|| ParserError::UnexpectedToken(token.to_string()))?;
                    self.advance();
                    let rhs = self.parse_expression(right_bp)?;
                    lhs = AstNode::binary(op, lhs, rhs);
                }
            }
        }

        Ok(lhs)
    }

    /// Comma-separated arguments, positioned after `(`; consumes the `)`
    fn parse_arguments(&mut self) -> Result<Vec<AstNode>, ParserError> {
        let mut args = Vec::new();
        if *self.current() != TokenKind::RightParen {
            loop {
                args.push(self.parse_expression(0)?);
                if *self.current() != TokenKind::Comma {
                    break;
                }
                self.advance();
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(args)
    }

    pub fn parse(&mut self) -> Result<AstNode, ParserError> {
        if self.at_end() {
            return Err(ParserError::EmptyExpression);
        }

        let ast = self.parse_expression(0)?;

        if !self.at_end() {
            return Err(self.expected("end of expression"));
        }

        Ok(ast)
    }
}

/// Parse an expression string into an AST
///
/// This is the main entry point for parsing.
pub fn parse(expression: &str) -> Result<AstNode, ParserError> {
    parse_with_max_depth(expression, DEFAULT_MAX_DEPTH)
}

pub fn parse_with_max_depth(expression: &str, max_depth: usize) -> Result<AstNode, ParserError> {
    debug!(source = expression, max_depth, "parsing expression");
    Parser::with_max_depth(expression, max_depth)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    // Lexer tests
    #[test]
    fn test_lexer_numbers() {
        assert_eq!(
            kinds("42 3.14 2.5e10 1E-5"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.14),
                TokenKind::Number(2.5e10),
                TokenKind::Number(1e-5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_minus_is_never_part_of_number() {
        assert_eq!(
            kinds("-10"),
            vec![TokenKind::Minus, TokenKind::Number(10.0), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lexer_strings() {
        assert_eq!(
            kinds(r#""hello" 'world' "with\nnewline" 'it\'s' "say \"hi\"""#),
            vec![
                TokenKind::String("hello".to_string()),
                TokenKind::String("world".to_string()),
                TokenKind::String("with\nnewline".to_string()),
                TokenKind::String("it's".to_string()),
                TokenKind::String("say \"hi\"".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_unclosed_string() {
        assert_eq!(
            Lexer::new("'abc").tokenize().unwrap_err(),
            ParserError::UnclosedString
        );
    }

    #[test]
    fn test_lexer_keywords() {
        assert_eq!(
            kinds("true false null undefined"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::Undefined,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_operators() {
        assert_eq!(
            kinds("== === != !== <= >= && || ?? ! ? : . | =>"),
            vec![
                TokenKind::EqualEqual,
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::NotEqual,
                TokenKind::LessThanOrEqual,
                TokenKind::GreaterThanOrEqual,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Coalesce,
                TokenKind::Not,
                TokenKind::Question,
                TokenKind::Colon,
                TokenKind::Dot,
                TokenKind::Pipe,
                TokenKind::Arrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_positions() {
        let tokens = Lexer::new("a + bc").tokenize().unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_lexer_rejects_single_equals() {
        assert_eq!(
            Lexer::new("a = 1").tokenize().unwrap_err(),
            ParserError::UnexpectedCharacter {
                ch: '=',
                position: 2
            }
        );
    }

    // Parser tests
    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42").unwrap(), AstNode::number(42.0));
        assert_eq!(parse("'hi'").unwrap(), AstNode::string("hi"));
        assert_eq!(parse("true").unwrap(), AstNode::boolean(true));
        assert_eq!(parse("null").unwrap(), AstNode::null());
        assert_eq!(parse("undefined").unwrap(), AstNode::undefined());
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 should parse as 1 + (2 * 3)
        let ast = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Add,
                AstNode::number(1.0),
                AstNode::binary(BinaryOp::Multiply, AstNode::number(2.0), AstNode::number(3.0)),
            )
        );
    }

    #[test]
    fn test_parse_parentheses() {
        let ast = parse("(1 + 2) * 3").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Multiply,
                AstNode::binary(BinaryOp::Add, AstNode::number(1.0), AstNode::number(2.0)),
                AstNode::number(3.0),
            )
        );
    }

    #[test]
    fn test_parse_unary_minus() {
        let ast = parse("-5 + 3").unwrap();
        assert_eq!(
            ast,
            AstNode::binary(
                BinaryOp::Add,
                AstNode::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(AstNode::number(5.0)),
                },
                AstNode::number(3.0),
            )
        );
    }

    #[test]
    fn test_parse_logical_precedence() {
        // a || b && c ?? d  →  (a || (b && c)) ?? d
        let ast = parse("a || b && c ?? d").unwrap();
        assert_eq!(ast.to_string(), "a || b && c ?? d");
        match ast {
            AstNode::Binary {
                op: BinaryOp::Coalesce,
                lhs,
                ..
            } => assert!(matches!(*lhs, AstNode::Binary { op: BinaryOp::Or, .. })),
            other => panic!("Expected coalesce at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ternary_is_right_associative() {
        let ast = parse("score >= 90 ? 'A' : score >= 80 ? 'B' : 'C'").unwrap();
        match ast {
            AstNode::Conditional { else_branch, .. } => {
                assert!(matches!(*else_branch, AstNode::Conditional { .. }))
            }
            other => panic!("Expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_member_index_call() {
        let ast = parse("data.orders[0].price").unwrap();
        assert_eq!(ast.to_string(), "data.orders[0].price");

        let ast = parse("floor(price) + 1").unwrap();
        match ast {
            AstNode::Binary { lhs, .. } => match *lhs {
                AstNode::Call { name, args } => {
                    assert_eq!(name, "floor");
                    assert_eq!(args, vec![AstNode::identifier("price")]);
                }
                other => panic!("Expected call, got {:?}", other),
            },
            other => panic!("Expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_strict_equality_alias() {
        assert_eq!(parse("a === 1").unwrap(), parse("a == 1").unwrap());
        assert_eq!(parse("a !== 1").unwrap(), parse("a != 1").unwrap());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("").unwrap_err(), ParserError::EmptyExpression);
        assert_eq!(parse("   ").unwrap_err(), ParserError::EmptyExpression);
        assert_eq!(parse("1 +").unwrap_err(), ParserError::UnexpectedEnd);
        assert_eq!(
            parse("(1 + 2").unwrap_err().to_string(),
            "Expected RPAREN, found EOF"
        );
        assert!(parse("1 + 2)").is_err());
        assert!(parse("a.b(1)").is_err());
        assert!(parse("items | map").is_err());
    }

    #[test]
    fn test_parse_division_by_zero_is_not_a_parse_error() {
        assert!(parse("10 / 0").is_ok());
    }

    #[test]
    fn test_parse_depth_limit() {
        let deep = "((((((((((1 + 1) + 1) + 1) + 1) + 1) + 1) + 1) + 1) + 1) + 1)";
        let err = parse_with_max_depth(deep, 5).unwrap_err();
        assert_eq!(err, ParserError::MaxDepthExceeded(5));
        assert!(err.to_string().contains("depth"));
        assert!(parse_with_max_depth(deep, 100).is_ok());
    }

    #[test]
    fn test_display_round_trips() {
        for source in [
            "1 + 2 * 3",
            "(1 + 2) * 3",
            "a ? b : c ? d : e",
            "-x.y",
            "!(a && b)",
            "obj[\"foo-bar\"]",
            "concat(\"a\", toString(n))",
        ] {
            let ast = parse(source).unwrap();
            assert_eq!(parse(&ast.to_string()).unwrap(), ast, "{}", source);
        }
    }
}

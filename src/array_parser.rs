// Array DSL parser
// Pipe chains (`items | map(x => x * 2)`) and method chains (`items.map(x => x * 2)`)

use tracing::debug;

use crate::array_ops::{ArrayOp, ArrayOperation, ArraySource, LambdaExpression};
use crate::ast::AstNode;
use crate::parser::{Parser, ParserError, TokenKind, DEFAULT_MAX_DEPTH};

impl Parser {
    /// Parse a whole pipeline: a source path followed by one or more stages
    pub fn parse_array_expression(&mut self) -> Result<ArrayOperation, ParserError> {
        if self.at_end() {
            return Err(ParserError::EmptyExpression);
        }

        let mut path = vec![self.expect_identifier()?];
        // `.name` extends the path unless it is a method call
        while *self.current() == TokenKind::Dot && *self.peek_kind(2) != TokenKind::LeftParen {
            self.advance();
            path.push(self.expect_identifier()?);
        }

        let mut source = ArraySource::Path(path.join("."));
        let mut stages = 0;
        loop {
            match self.current() {
                TokenKind::Pipe | TokenKind::Dot => self.advance(),
                TokenKind::Eof if stages > 0 => break,
                TokenKind::Eof => return Err(ParserError::MissingArrayOperation),
                _ => return Err(self.expected("'|' or '.'")),
            }
            let stage = self.parse_stage(source)?;
            source = ArraySource::from(stage);
            stages += 1;
        }

        match source {
            ArraySource::Operation(op) => Ok(*op),
            ArraySource::Path(_) => Err(ParserError::MissingArrayOperation),
        }
    }

    /// `name(args)` applied to `array`
    fn parse_stage(&mut self, array: ArraySource) -> Result<ArrayOperation, ParserError> {
        let name = self.expect_identifier()?;
        let op = ArrayOp::from_name(&name).ok_or(ParserError::UnknownArrayOperation(name))?;
        self.expect(TokenKind::LeftParen)?;

        let operation = match op {
            ArrayOp::Map => ArrayOperation::Map {
                array,
                transform: Some(self.parse_lambda()?),
            },
            ArrayOp::Filter => ArrayOperation::Filter {
                array,
                predicate: Some(self.parse_lambda()?),
            },
            ArrayOp::FlatMap => ArrayOperation::FlatMap {
                array,
                transform: Some(self.parse_lambda()?),
            },
            ArrayOp::Reduce => {
                let reducer = self.parse_lambda()?;
                if *self.current() == TokenKind::RightParen {
                    return Err(ParserError::InvalidSyntax(
                        "reduce requires an initial value".to_string(),
                    ));
                }
                self.expect(TokenKind::Comma)?;
                ArrayOperation::Reduce {
                    array,
                    reducer: Some(reducer),
                    initial: Some(self.parse_expression(0)?),
                }
            }
            ArrayOp::Slice => {
                let start = self.parse_expression(0)?;
                let end = self.parse_optional_argument()?;
                let step = match end {
                    Some(_) => self.parse_optional_argument()?,
                    None => None,
                };
                ArrayOperation::Slice {
                    array,
                    start: Some(start),
                    end,
                    step,
                }
            }
        };

        self.expect(TokenKind::RightParen)?;
        Ok(operation)
    }

    fn parse_optional_argument(&mut self) -> Result<Option<AstNode>, ParserError> {
        if *self.current() != TokenKind::Comma {
            return Ok(None);
        }
        self.advance();
        self.parse_expression(0).map(Some)
    }

    /// `x => body` or `(a, b) => body`
    fn parse_lambda(&mut self) -> Result<LambdaExpression, ParserError> {
        let params = match self.current() {
            TokenKind::LeftParen => {
                self.advance();
                let mut params = Vec::new();
                if *self.current() != TokenKind::RightParen {
                    loop {
                        params.push(self.expect_identifier()?);
                        if *self.current() != TokenKind::Comma {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(TokenKind::RightParen)?;
                params
            }
            TokenKind::Identifier(_) => vec![self.expect_identifier()?],
            _ => return Err(self.expected("lambda parameter")),
        };
        self.expect(TokenKind::Arrow)?;
        let body = self.parse_expression(0)?;
        Ok(LambdaExpression::new(params, body))
    }
}

/// Parse array DSL source into a nested [`ArrayOperation`]
pub fn parse_array_expression(source: &str) -> Result<ArrayOperation, ParserError> {
    parse_array_expression_with_max_depth(source, DEFAULT_MAX_DEPTH)
}

pub fn parse_array_expression_with_max_depth(
    source: &str,
    max_depth: usize,
) -> Result<ArrayOperation, ParserError> {
    debug!(source, "parsing array expression");
    Parser::with_max_depth(source, max_depth)?.parse_array_expression()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn lambda(params: &[&str], body: &str) -> Option<LambdaExpression> {
        Some(LambdaExpression::new(
            params.iter().map(|p| p.to_string()).collect(),
            crate::parser::parse(body).unwrap(),
        ))
    }

    #[test]
    fn test_pipe_and_method_chains_match() {
        let piped = parse_array_expression("items | map(x => x*2)").unwrap();
        let chained = parse_array_expression("items.map(x => x*2)").unwrap();
        assert_eq!(piped, chained);
        assert_eq!(
            piped,
            ArrayOperation::Map {
                array: ArraySource::from("items"),
                transform: lambda(&["x"], "x * 2"),
            }
        );
    }

    #[test]
    fn test_pipeline_nests_innermost_first() {
        let op = parse_array_expression(
            "numbers | filter(x => x > 2) | map(x => x * 2) | reduce((acc, x) => acc + x, 0)",
        )
        .unwrap();
        assert_eq!(op.kind(), ArrayOp::Reduce);
        assert_eq!(op.source_path(), "numbers");

        let ArraySource::Operation(map) = op.source() else {
            panic!("expected map stage");
        };
        assert_eq!(map.kind(), ArrayOp::Map);
        let ArraySource::Operation(filter) = map.source() else {
            panic!("expected filter stage");
        };
        assert_eq!(filter.kind(), ArrayOp::Filter);
        assert_eq!(filter.source(), &ArraySource::from("numbers"));
    }

    #[test]
    fn test_mixed_chain_with_dotted_source() {
        let op = parse_array_expression("response.data.items.filter(x => x.active) | map(x => x.id)")
            .unwrap();
        assert_eq!(op.source_path(), "response.data.items");
        assert_eq!(op.to_string(), "response.data.items | filter(x => x.active) | map(x => x.id)");
    }

    #[test]
    fn test_reduce_arguments() {
        let op = parse_array_expression("empty | reduce((acc, x) => acc + x, 100)").unwrap();
        assert_eq!(
            op,
            ArrayOperation::Reduce {
                array: ArraySource::from("empty"),
                reducer: lambda(&["acc", "x"], "acc + x"),
                initial: Some(AstNode::number(100.0)),
            }
        );

        let err = parse_array_expression("items | reduce((acc, x) => acc + x)").unwrap_err();
        assert!(err.to_string().contains("initial value"));
    }

    #[test]
    fn test_slice_arguments() {
        let op = parse_array_expression("numbers | slice(-3, -1)").unwrap();
        match op {
            ArrayOperation::Slice { start, end, step, .. } => {
                assert!(matches!(
                    start,
                    Some(AstNode::Unary { .. })
                ));
                assert!(end.is_some());
                assert_eq!(step, None);
            }
            other => panic!("expected slice, got {:?}", other),
        }

        let op = parse_array_expression("numbers | slice(0, 10, 2)").unwrap();
        assert!(matches!(op, ArrayOperation::Slice { step: Some(_), .. }));
    }

    #[test]
    fn test_lambda_body_uses_expression_grammar() {
        let op = parse_array_expression("orders | filter(o => o.total >= 100 && !o.cancelled)").unwrap();
        let predicate = op.lambda().unwrap();
        assert!(matches!(
            predicate.body,
            AstNode::Binary { op: BinaryOp::And, .. }
        ));
    }

    #[test]
    fn test_errors() {
        let err = parse_array_expression("items | explode(x => x)").unwrap_err();
        assert_eq!(err.to_string(), "Unknown array operation: explode");

        let err = parse_array_expression("items | map(x x * 2)").unwrap_err();
        assert!(err.to_string().starts_with("Expected ARROW"), "{}", err);

        let err = parse_array_expression("items | map((a, b => a)").unwrap_err();
        assert!(err.to_string().starts_with("Expected RPAREN"), "{}", err);

        let err = parse_array_expression("items | map(x => x * 2").unwrap_err();
        assert!(err.to_string().starts_with("Expected RPAREN"), "{}", err);

        let err = parse_array_expression("items").unwrap_err();
        assert!(err.to_string().contains("must contain at least one array operation"));

        let err = parse_array_expression("data.items").unwrap_err();
        assert_eq!(err, ParserError::MissingArrayOperation);

        assert_eq!(parse_array_expression("").unwrap_err(), ParserError::EmptyExpression);
    }

    #[test]
    fn test_lambda_depth_is_bounded() {
        let err = parse_array_expression_with_max_depth("items | map(x => ((((x)))))", 3).unwrap_err();
        assert!(err.to_string().contains("depth"));
    }
}

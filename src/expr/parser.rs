//! Precedence-climbing parser

use super::ast::{BinaryOp, Expr, Literal, Segment, UnaryOp};
use super::lexer::{Lexer, RawSegment, Token, TokenKind};
use super::SyntaxError;

// Operator priorities, loosest first
const PRIORITY_AND_OR: u8 = 1;
const PRIORITY_COMPARISON: u8 = 2;
const PRIORITY_ADDITIVE: u8 = 3;
const PRIORITY_MULTIPLICATIVE: u8 = 4;
// Unary sign and `not` bind tighter than all of these; function calls tightest.

fn binary_operator(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::And => (BinaryOp::And, PRIORITY_AND_OR),
        TokenKind::Or => (BinaryOp::Or, PRIORITY_AND_OR),
        TokenKind::Eq => (BinaryOp::Eq, PRIORITY_COMPARISON),
        TokenKind::Ne => (BinaryOp::Ne, PRIORITY_COMPARISON),
        TokenKind::Lt => (BinaryOp::Lt, PRIORITY_COMPARISON),
        TokenKind::Le => (BinaryOp::Le, PRIORITY_COMPARISON),
        TokenKind::Gt => (BinaryOp::Gt, PRIORITY_COMPARISON),
        TokenKind::Ge => (BinaryOp::Ge, PRIORITY_COMPARISON),
        TokenKind::Plus => (BinaryOp::Add, PRIORITY_ADDITIVE),
        TokenKind::Minus => (BinaryOp::Sub, PRIORITY_ADDITIVE),
        TokenKind::Star => (BinaryOp::Mul, PRIORITY_MULTIPLICATIVE),
        TokenKind::Div => (BinaryOp::Div, PRIORITY_MULTIPLICATIVE),
        TokenKind::Mod => (BinaryOp::Mod, PRIORITY_MULTIPLICATIVE),
        _ => return None,
    })
}

/// Parse an expression. An empty expression is `false`.
pub fn parse(source: &str) -> Result<Expr, SyntaxError> {
    parse_at(source, 0)
}

/// Parse a sub-expression whose offsets start at `base` in the outer source
fn parse_at(source: &str, base: usize) -> Result<Expr, SyntaxError> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| e.shifted(base))?;
    if tokens.is_empty() {
        return Ok(Expr::Literal(Literal::Bool(false)));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        base,
        end: base + source.len(),
    };
    let expr = parser.expression(PRIORITY_AND_OR)?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(SyntaxError::new(base + token.offset, "unexpected token"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    base: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| self.base + t.offset)
            .unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Binary operators with priority >= `min_priority`, left associative
    fn expression(&mut self, min_priority: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        while let Some((op, priority)) = self.peek().and_then(binary_operator) {
            if priority < min_priority {
                break;
            }
            self.pos += 1;
            let right = self.expression(priority + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Minus) => UnaryOp::Minus,
            Some(TokenKind::Not) => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let offset = self.offset();
        let Some(token) = self.next() else {
            return Err(SyntaxError::new(offset, "unexpected end of expression"));
        };
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(n.into())),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::True => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Literal::Null)),
            TokenKind::Path(raw) => self.path(raw),
            TokenKind::LParen => {
                let inner = self.expression(PRIORITY_AND_OR)?;
                self.expect_close()?;
                Ok(inner)
            }
            TokenKind::Function(name) => self.call(name),
            _ => Err(SyntaxError::new(offset, "unexpected token")),
        }
    }

    fn expect_close(&mut self) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(TokenKind::RParen) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(SyntaxError::new(self.offset(), "expected ')'")),
        }
    }

    /// Arguments up to the closing parenthesis; arity is the comma count + 1
    fn call(&mut self, name: String) -> Result<Expr, SyntaxError> {
        let mut args = Vec::new();
        if let Some(TokenKind::RParen) = self.peek() {
            self.pos += 1;
            return Ok(Expr::Call { name, args });
        }
        loop {
            args.push(self.expression(PRIORITY_AND_OR)?);
            match self.peek() {
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::RParen) => {
                    self.pos += 1;
                    return Ok(Expr::Call { name, args });
                }
                _ => return Err(SyntaxError::new(self.offset(), "expected ',' or ')'")),
            }
        }
    }

    fn path(&self, raw: Vec<RawSegment>) -> Result<Expr, SyntaxError> {
        let mut segments = Vec::with_capacity(raw.len());
        for segment in raw {
            segments.push(match segment {
                RawSegment::Root => Segment::Root,
                RawSegment::Current => Segment::Current,
                RawSegment::Parent => Segment::Parent,
                RawSegment::Name(name) => Segment::Name(name),
                RawSegment::Dynamic { source, offset } => {
                    Segment::Dynamic(Box::new(parse_at(&source, self.base + offset)?))
                }
            });
        }
        Ok(Expr::Path(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Int(i)))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary {
                op: BinaryOp::Add,
                left: int(1),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: int(2),
                    right: int(3),
                }),
            }
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(
            parse("8 - 3 - 2").unwrap(),
            Expr::Binary {
                op: BinaryOp::Sub,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Sub,
                    left: int(8),
                    right: int(3),
                }),
                right: int(2),
            }
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        assert_eq!(
            parse("- 3 + 1").unwrap(),
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Unary {
                    op: UnaryOp::Minus,
                    operand: int(3),
                }),
                right: int(1),
            }
        );
    }

    #[test]
    fn test_function_arity() {
        match parse("substr('abc', 1, 1 + 1)").unwrap() {
            Expr::Call { name, args } => {
                assert_eq!(name, "substr");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse("position()").unwrap() {
            Expr::Call { args, .. } => assert!(args.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dynamic_segment_is_parsed() {
        assert_eq!(
            parse("/map/[1 + 1]").unwrap(),
            Expr::Path(vec![
                Segment::Root,
                Segment::Name("map".to_string()),
                Segment::Dynamic(Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    left: int(1),
                    right: int(1),
                })),
            ])
        );
    }

    #[test]
    fn test_empty_expression_is_false() {
        assert_eq!(parse("  ").unwrap(), Expr::Literal(Literal::Bool(false)));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("(1 + 2").unwrap_err().offset, 6);
        assert_eq!(parse("1 2").unwrap_err().offset, 2);
        assert_eq!(parse("1 +").unwrap_err().offset, 3);
        assert_eq!(parse("f(1,,2)").unwrap_err().offset, 4);
        assert_eq!(parse("a/[1 +]").unwrap_err().offset, 6);
    }
}

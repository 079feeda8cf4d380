//! Expression language
//!
//! Expressions appear in directive attributes (`fig:cond="/count > 1"`) and
//! inside `{...}` runs of plain attributes. Parsing produces an immutable
//! [`Expr`] tree; evaluation walks it against an [`Environment`].

mod ast;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, Literal, Segment, UnaryOp};
pub use lexer::{Lexer, RawSegment, Token, TokenKind};
pub use parser::parse;

use crate::error::{Location, Result};
use crate::value::Value;
use std::fmt;

/// Malformed expression, with the byte offset of the offending token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }

    fn shifted(self, base: usize) -> Self {
        Self {
            offset: self.offset + base,
            ..self
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for SyntaxError {}

/// What an expression can see while it is evaluated
pub trait Environment {
    /// Resolve the first segment of a path. `/`, `.` and `..` name the root,
    /// innermost and enclosing scope frames.
    fn lookup(&self, name: &str) -> Value;

    /// Call a function by name with already evaluated arguments
    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

    /// Location reported by errors raised during evaluation
    fn location(&self) -> Location;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, FigError};

    struct TestEnv {
        root: Value,
        current: Value,
        bumps: usize,
    }

    impl TestEnv {
        fn new(json: serde_json::Value) -> Self {
            let root = Value::from_json(&json);
            Self {
                current: root.clone(),
                root,
                bumps: 0,
            }
        }
    }

    impl Environment for TestEnv {
        fn lookup(&self, name: &str) -> Value {
            match name {
                "/" => self.root.clone(),
                "." => self.current.clone(),
                ".." => Value::Null,
                other => self.current.get(other),
            }
        }

        fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
            match name {
                "bump" => {
                    self.bumps += 1;
                    Ok(Value::Bool(true))
                }
                "argc" => Ok(Value::from(args.len())),
                _ => Err(FigError::FunctionNotFound {
                    location: self.location(),
                    name: name.to_string(),
                }),
            }
        }

        fn location(&self) -> Location {
            Location::new("test", 1)
        }
    }

    fn eval_with(env: &mut TestEnv, source: &str) -> Result<Value> {
        let expr = parse(source).unwrap();
        expr.evaluate(env)
    }

    fn eval(source: &str) -> Value {
        eval_with(&mut TestEnv::new(serde_json::json!({})), source).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1+1"), Value::Int(2));
        assert_eq!(eval("2 + 3"), Value::Int(5));
        assert_eq!(eval("39 div 3 + 2"), Value::Int(15));
        assert_eq!(eval("(35 + 4) div (4 - 1)"), Value::Int(13));
        assert_eq!(eval(" +12 +1"), Value::Int(13));
        assert_eq!(eval("7 mod 4 * 2"), Value::Int(6));
        assert_eq!(eval("1 div 4"), Value::Float(0.25));
        match eval("- 3 + 0.14") {
            Value::Float(f) => assert!((f + 2.86).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(eval("39 div 0"), Value::Int(0));
    }

    #[test]
    fn test_plus_concatenates_non_numeric() {
        assert_eq!(eval("'a' + 2"), Value::from("a2"));
        assert_eq!(eval("'2' + '3'"), Value::Int(5));
        assert_eq!(eval("'1.5' + 1"), Value::Float(2.5));
        assert_eq!(eval("true + 1"), Value::from("11"));
        assert_eq!(eval("null + 'x'"), Value::from("x"));
    }

    #[test]
    fn test_boolean_logic() {
        assert_eq!(eval("false and 12"), Value::Bool(false));
        assert_eq!(eval("not(false)"), Value::Bool(true));
        assert_eq!(eval("false or 0 or ''"), Value::Bool(false));
        assert_eq!(eval("1 < 2 and 3 gte 3"), Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        let mut env = TestEnv::new(serde_json::json!({}));
        assert_eq!(eval_with(&mut env, "false and bump()").unwrap(), Value::Bool(false));
        assert_eq!(eval_with(&mut env, "true or bump()").unwrap(), Value::Bool(true));
        assert_eq!(env.bumps, 0);
        assert_eq!(eval_with(&mut env, "true and bump()").unwrap(), Value::Bool(true));
        assert_eq!(env.bumps, 1);
    }

    #[test]
    fn test_equality() {
        assert_eq!(eval("'' == 0"), Value::Bool(false));
        assert_eq!(eval("'abc' != 'ABC'"), Value::Bool(true));
        assert_eq!(eval("'12' == 12"), Value::Bool(true));
        assert_eq!(eval("'1.0' == 1"), Value::Bool(false));
        assert_eq!(eval("null == false"), Value::Bool(true));
        assert_eq!(eval("2 == 2.0"), Value::Bool(true));
        assert_eq!(eval("0.5 != '0.50'"), Value::Bool(true));
    }

    #[test]
    fn test_string_compared_with_array_fails() {
        let mut env = TestEnv::new(serde_json::json!({"list": [1, 2]}));
        let err = eval_with(&mut env, "'a' == /list").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArrayToString);
    }

    #[test]
    fn test_paths() {
        let mut env = TestEnv::new(serde_json::json!({
            "user": {"name": "Ann", "tags": ["x", "y"]},
            "key": "name",
        }));
        assert_eq!(eval_with(&mut env, "/user/name").unwrap(), Value::from("Ann"));
        assert_eq!(eval_with(&mut env, "user/tags/1").unwrap(), Value::from("y"));
        assert_eq!(eval_with(&mut env, "/user/[/key]").unwrap(), Value::from("Ann"));
        assert_eq!(eval_with(&mut env, "/user/missing/deeper").unwrap(), Value::Null);
        assert_eq!(eval_with(&mut env, "../user").unwrap(), Value::Null);
    }

    #[test]
    fn test_functions() {
        let mut env = TestEnv::new(serde_json::json!({}));
        assert_eq!(eval_with(&mut env, "argc(1, 'a', 2 + 2)").unwrap(), Value::Int(3));
        let err = eval_with(&mut env, "nope()").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FunctionNotFound);
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        assert!(parse("2 == true=").is_err());
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let expr = parse("/n * 2 + 1").unwrap();
        let mut env = TestEnv::new(serde_json::json!({"n": 4}));
        let first = expr.evaluate(&mut env).unwrap();
        let second = expr.evaluate(&mut env).unwrap();
        assert_eq!(first, Value::Int(9));
        assert_eq!(first, second);
    }
}

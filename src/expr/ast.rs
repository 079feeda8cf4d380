//! Expression tree and its evaluation

use super::Environment;
use crate::error::{FigError, Result};
use crate::value::{Number, Value};
use serde::{Deserialize, Serialize};

/// Literal constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<Number> for Literal {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Literal::Int(i),
            Number::Float(f) => Literal::Float(f),
        }
    }
}

/// One step of a data path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Root,
    Current,
    Parent,
    Name(String),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Parsed expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Path(Vec<Segment>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Evaluate against an environment. Holds no state between calls.
    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<Value> {
        match self {
            Expr::Literal(literal) => Ok(literal.to_value()),
            Expr::Path(segments) => evaluate_path(segments, env),
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(env)?;
                Ok(match op {
                    UnaryOp::Plus => value.to_number().into(),
                    UnaryOp::Minus => value.to_number().neg().into(),
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                })
            }
            Expr::Binary { op, left, right } => evaluate_binary(*op, left, right, env),
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.evaluate(env)?);
                }
                env.call(name, values)
            }
        }
    }
}

fn evaluate_path(segments: &[Segment], env: &mut dyn Environment) -> Result<Value> {
    let Some((head, tail)) = segments.split_first() else {
        return Ok(Value::Null);
    };
    let mut value = match head {
        Segment::Root => env.lookup("/"),
        Segment::Current => env.lookup("."),
        Segment::Parent => env.lookup(".."),
        Segment::Name(name) => env.lookup(name),
        Segment::Dynamic(expr) => {
            let key = dynamic_key(expr, env)?;
            env.lookup(&key)
        }
    };
    for segment in tail {
        if matches!(value, Value::Null) {
            break;
        }
        value = match segment {
            Segment::Current => value,
            Segment::Name(name) => value.get(name),
            Segment::Dynamic(expr) => {
                let key = dynamic_key(expr, env)?;
                value.get(&key)
            }
            Segment::Root | Segment::Parent => Value::Null,
        };
    }
    Ok(value)
}

fn dynamic_key(expr: &Expr, env: &mut dyn Environment) -> Result<String> {
    let key = expr.evaluate(env)?;
    key.to_text().ok_or_else(|| FigError::ArrayToString {
        location: env.location(),
    })
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    env: &mut dyn Environment,
) -> Result<Value> {
    // Short-circuit operators never evaluate the right side needlessly
    match op {
        BinaryOp::And => {
            return Ok(Value::Bool(
                left.evaluate(env)?.is_truthy() && right.evaluate(env)?.is_truthy(),
            ))
        }
        BinaryOp::Or => {
            return Ok(Value::Bool(
                left.evaluate(env)?.is_truthy() || right.evaluate(env)?.is_truthy(),
            ))
        }
        _ => {}
    }

    let lhs = left.evaluate(env)?;
    let rhs = right.evaluate(env)?;
    let value = match op {
        BinaryOp::Add => {
            if lhs.is_numeric() && rhs.is_numeric() {
                lhs.to_number().add(rhs.to_number()).into()
            } else {
                let (Some(a), Some(b)) = (lhs.to_text(), rhs.to_text()) else {
                    return Err(FigError::ArrayToString {
                        location: env.location(),
                    });
                };
                Value::String(a + &b)
            }
        }
        BinaryOp::Sub => lhs.to_number().sub(rhs.to_number()).into(),
        BinaryOp::Mul => lhs.to_number().mul(rhs.to_number()).into(),
        BinaryOp::Div => lhs.to_number().div(rhs.to_number()).into(),
        BinaryOp::Mod => lhs.to_number().rem(rhs.to_number()).into(),
        BinaryOp::Eq => Value::Bool(equals(&lhs, &rhs, env)?),
        BinaryOp::Ne => Value::Bool(not_equals(&lhs, &rhs)),
        BinaryOp::Lt => Value::Bool(lhs.loose_cmp(&rhs).map(|o| o.is_lt()).unwrap_or(false)),
        BinaryOp::Le => Value::Bool(lhs.loose_cmp(&rhs).map(|o| o.is_le()).unwrap_or(false)),
        BinaryOp::Gt => Value::Bool(lhs.loose_cmp(&rhs).map(|o| o.is_gt()).unwrap_or(false)),
        BinaryOp::Ge => Value::Bool(lhs.loose_cmp(&rhs).map(|o| o.is_ge()).unwrap_or(false)),
        BinaryOp::And => Value::Bool(lhs.is_truthy() && rhs.is_truthy()),
        BinaryOp::Or => Value::Bool(lhs.is_truthy() || rhs.is_truthy()),
    };
    Ok(value)
}

/// `==`: empty never equals non-empty; strings compare byte for byte
fn equals(lhs: &Value, rhs: &Value, env: &mut dyn Environment) -> Result<bool> {
    if lhs.is_truthy() != rhs.is_truthy() {
        return Ok(false);
    }
    if lhs.is_string() || rhs.is_string() {
        if lhs.is_collection() || rhs.is_collection() {
            return Err(FigError::ArrayToString {
                location: env.location(),
            });
        }
        return Ok(lhs.to_text() == rhs.to_text());
    }
    Ok(lhs.loose_eq(rhs))
}

/// `!=`: a float on the left compares as text, anything else loosely
fn not_equals(lhs: &Value, rhs: &Value) -> bool {
    if let Value::Float(_) = lhs {
        return lhs.to_text() != rhs.to_text();
    }
    !lhs.loose_eq(rhs)
}

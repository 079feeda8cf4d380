//! Built-in functions

use super::{date, Anchor, FigFunction, FunctionFactory};
use crate::error::{FigError, Result};
use crate::value::{html_escape, Number, Value};
use std::sync::Arc;

/// Factory for the functions every template can use
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFunctionFactory;

impl FunctionFactory for NativeFunctionFactory {
    fn create(&self, name: &str) -> Option<Arc<dyn FigFunction>> {
        Native::from_name(name).map(|f| Arc::new(f) as Arc<dyn FigFunction>)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Native {
    Position,
    First,
    Last,
    Even,
    Odd,
    Key,
    Count,
    Sum,
    If,
    Default,
    Substr,
    HtmlEntities,
    FormatNumber,
    FormatTimestamp,
    Const,
}

impl Native {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "position" => Native::Position,
            "first" => Native::First,
            "last" => Native::Last,
            "even" => Native::Even,
            "odd" => Native::Odd,
            "key" => Native::Key,
            "count" => Native::Count,
            "sum" => Native::Sum,
            "if" => Native::If,
            "default" => Native::Default,
            "substr" => Native::Substr,
            "htmlentities" => Native::HtmlEntities,
            "format_number" => Native::FormatNumber,
            "format_timestamp" => Native::FormatTimestamp,
            "const" => Native::Const,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Native::Position => "position",
            Native::First => "first",
            Native::Last => "last",
            Native::Even => "even",
            Native::Odd => "odd",
            Native::Key => "key",
            Native::Count => "count",
            Native::Sum => "sum",
            Native::If => "if",
            Native::Default => "default",
            Native::Substr => "substr",
            Native::HtmlEntities => "htmlentities",
            Native::FormatNumber => "format_number",
            Native::FormatTimestamp => "format_timestamp",
            Native::Const => "const",
        }
    }

    fn min_arity(self) -> usize {
        match self {
            Native::Position
            | Native::First
            | Native::Last
            | Native::Even
            | Native::Odd
            | Native::Key => 0,
            Native::Count | Native::Sum | Native::HtmlEntities | Native::FormatNumber => 1,
            Native::Const => 1,
            Native::Default | Native::Substr | Native::FormatTimestamp => 2,
            Native::If => 3,
        }
    }

    fn text(self, anchor: &Anchor<'_>, value: &Value) -> Result<String> {
        value.to_text().ok_or_else(|| FigError::ArrayToString {
            location: anchor.location.clone(),
        })
    }
}

impl FigFunction for Native {
    fn evaluate(&self, anchor: &Anchor<'_>, arity: usize, args: &[Value]) -> Result<Value> {
        if arity < self.min_arity() {
            return Err(FigError::FunctionCall {
                location: anchor.location.clone(),
                name: self.name().to_string(),
                message: format!(
                    "expected at least {} arguments, {} received",
                    self.min_arity(),
                    arity
                ),
            });
        }
        let iteration = anchor.iteration;
        let value = match self {
            Native::Position => Value::from(iteration.position()),
            Native::First => Value::Bool(iteration.position() == 1),
            Native::Last => Value::Bool(iteration.count() > 0 && iteration.position() == iteration.count()),
            Native::Even => Value::Bool(iteration.position() % 2 == 0),
            Native::Odd => Value::Bool(iteration.position() % 2 == 1),
            Native::Key => iteration.key().clone(),
            Native::Count => Value::from(args[0].count()),
            Native::Sum => sum(&args[0]).into(),
            Native::If => {
                if args[0].is_truthy() {
                    args[1].clone()
                } else {
                    args[2].clone()
                }
            }
            Native::Default => match &args[0] {
                Value::Null => args[1].clone(),
                Value::String(s) if s.is_empty() => args[1].clone(),
                other => other.clone(),
            },
            Native::Substr => {
                let text = self.text(anchor, &args[0])?;
                let start = args[1].to_number().as_i64();
                let length = args.get(2).map(|v| v.to_number().as_i64());
                Value::String(substr(&text, start, length))
            }
            Native::HtmlEntities => Value::String(html_escape(&self.text(anchor, &args[0])?)),
            Native::FormatNumber => {
                let decimals = args.get(1).map(|v| v.to_number().as_i64().max(0) as usize);
                let point = match args.get(2) {
                    Some(v) => self.text(anchor, v)?,
                    None => ".".to_string(),
                };
                let separator = match args.get(3) {
                    Some(v) => self.text(anchor, v)?,
                    None => ",".to_string(),
                };
                Value::String(format_number(
                    args[0].to_number().as_f64(),
                    decimals.unwrap_or(0),
                    &point,
                    &separator,
                ))
            }
            Native::FormatTimestamp => {
                let timestamp = match &args[0] {
                    Value::Null => None,
                    Value::String(s) if s.is_empty() => None,
                    other => Some(other.to_number().as_i64()),
                };
                let format = self.text(anchor, &args[1])?;
                Value::String(date::format_timestamp(timestamp, &format))
            }
            Native::Const => {
                let name = self.text(anchor, &args[0])?;
                match anchor.constants.get(name.trim()) {
                    Some(value) => value.clone(),
                    None => {
                        tracing::warn!("Undefined constant: {} ({})", name, anchor.location);
                        Value::Null
                    }
                }
            }
        };
        Ok(value)
    }
}

fn sum(value: &Value) -> Number {
    match value {
        Value::Array(items) => items
            .iter()
            .fold(Number::Int(0), |acc, v| acc.add(v.to_number())),
        Value::Object(map) => map
            .values()
            .fold(Number::Int(0), |acc, v| acc.add(v.to_number())),
        other => other.to_number(),
    }
}

/// Character-based substring; negative start counts from the end, negative
/// length stops that many characters before the end
fn substr(text: &str, start: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len() as i64;
    let begin = if start < 0 { (total + start).max(0) } else { start.min(total) };
    let end = match length {
        None => total,
        Some(len) if len < 0 => (total + len).max(begin),
        Some(len) => (begin + len).min(total),
    };
    chars[begin as usize..end as usize].iter().collect()
}

fn format_number(n: f64, decimals: usize, point: &str, separator: &str) -> String {
    let factor = 10f64.powi(decimals.min(15) as i32);
    let formatted = format!("{:.*}", decimals, (n.abs() * factor).round() / factor);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push_str(separator);
        }
        grouped.push(c);
    }
    let negative = n < 0.0 && formatted_is_nonzero(&grouped, frac_part.as_deref());
    let mut result = if negative { format!("-{}", grouped) } else { grouped };
    if let Some(frac) = frac_part {
        result.push_str(point);
        result.push_str(&frac);
    }
    result
}

fn formatted_is_nonzero(int_part: &str, frac_part: Option<&str>) -> bool {
    int_part.chars().chain(frac_part.unwrap_or("").chars()).any(|c| c.is_ascii_digit() && c != '0')
}

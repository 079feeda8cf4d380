//! Runtime values
//!
//! `Value` is the dynamically-typed datum every expression evaluates to and
//! every directive consumes. Conversions follow loose, coercive rules: numeric
//! strings take part in arithmetic, empty things are falsy, and comparisons
//! between mixed types coerce instead of failing.

mod number;

pub use number::{format_float, numeric_prefix, parse_numeric, Number};

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Host object exposed to templates without being converted to a map
pub trait OpaqueValue: fmt::Debug + Send + Sync {
    /// Name shown when the object is printed
    fn type_name(&self) -> &str;

    /// Property lookup used by path expressions
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Text form, when the object has one
    fn to_text(&self) -> Option<String> {
        None
    }
}

/// A value in the render context
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Truthiness: null, false, 0, 0.0, "", "0" and empty collections are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !(s.is_empty() || s == "0"),
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(obj) => !obj.is_empty(),
            Value::Opaque(_) => true,
        }
    }

    /// True for ints, floats and strings that read as a number
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::String(s) => parse_numeric(s).is_some(),
            _ => false,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Numeric coercion used by arithmetic operators
    pub fn to_number(&self) -> Number {
        match self {
            Value::Null => Number::Int(0),
            Value::Bool(b) => Number::Int(*b as i64),
            Value::Int(i) => Number::Int(*i),
            Value::Float(f) => Number::Float(*f),
            Value::String(s) => numeric_prefix(s),
            Value::Array(arr) => Number::Int(!arr.is_empty() as i64),
            Value::Object(obj) => Number::Int(!obj.is_empty() as i64),
            Value::Opaque(_) => Number::Int(1),
        }
    }

    /// Text form of a scalar. Returns `None` for non-empty arrays and objects.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(true) => Some("1".to_string()),
            Value::Bool(false) => Some(String::new()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::String(s) => Some(s.clone()),
            Value::Array(arr) if arr.is_empty() => Some(String::new()),
            Value::Object(obj) if obj.is_empty() => Some(String::new()),
            Value::Array(_) | Value::Object(_) => None,
            Value::Opaque(o) => Some(
                o.to_text()
                    .unwrap_or_else(|| format!("### Object of class: {} ###", o.type_name())),
            ),
        }
    }

    /// Property or index access; missing entries are null
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key).cloned().unwrap_or_default(),
            Value::Array(arr) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| arr.get(idx))
                .cloned()
                .unwrap_or_default(),
            Value::Opaque(o) => o.get(key).unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// Number of elements, as `count()` sees it
    pub fn count(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Array(arr) => arr.len(),
            Value::Object(obj) => obj.len(),
            _ => 1,
        }
    }

    /// Loose equality: mixed types are coerced before comparing
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), _) => *a == other.is_truthy(),
            (_, Value::Bool(b)) => self.is_truthy() == *b,
            (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
            (Value::Null, v) | (v, Value::Null) => !v.is_truthy(),
            (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
                (Some(x), Some(y)) => x.compare(y) == Some(Ordering::Equal),
                _ => a == b,
            },
            (Value::Int(_) | Value::Float(_), Value::String(s)) => match parse_numeric(s) {
                Some(n) => self.to_number().compare(n) == Some(Ordering::Equal),
                None => self.to_text().as_deref() == Some(s.as_str()),
            },
            (Value::String(_), Value::Int(_) | Value::Float(_)) => other.loose_eq(self),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.to_number().compare(other.to_number()) == Some(Ordering::Equal)
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.loose_eq(w)).unwrap_or(false))
            }
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose ordering. `None` when the operands cannot be ordered.
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => {
                Some(self.is_truthy().cmp(&other.is_truthy()))
            }
            (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
                (Some(x), Some(y)) => x.compare(y),
                _ => Some(a.as_bytes().cmp(b.as_bytes())),
            },
            (Value::Int(_) | Value::Float(_), Value::String(s)) => match parse_numeric(s) {
                Some(n) => self.to_number().compare(n),
                None => self.to_text().map(|t| t.as_bytes().cmp(s.as_bytes())),
            },
            (Value::String(_), Value::Int(_) | Value::Float(_)) => {
                other.loose_cmp(self).map(Ordering::reverse)
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.to_number().compare(other.to_number())
            }
            (Value::Array(a), Value::Array(b)) => Some(a.len().cmp(&b.len())),
            (Value::Object(a), Value::Object(b)) => Some(a.len().cmp(&b.len())),
            _ => None,
        }
    }

    /// Convert from serde_json::Value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => Value::Array(arr.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value. Opaque objects become their text form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => serde_json::Value::Array(arr.iter().map(|v| v.to_json()).collect()),
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Opaque(_) => serde_json::Value::String(self.to_text().unwrap_or_default()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

/// HTML escape a string
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Point;

    impl OpaqueValue for Point {
        fn type_name(&self) -> &str {
            "Point"
        }

        fn get(&self, key: &str) -> Option<Value> {
            match key {
                "x" => Some(Value::Int(3)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("0").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0.0").is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::from(vec![1]).is_truthy());
        assert!(Value::Opaque(Arc::new(Point)).is_truthy());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Bool(true).to_text().unwrap(), "1");
        assert_eq!(Value::Bool(false).to_text().unwrap(), "");
        assert_eq!(Value::Float(2.0).to_text().unwrap(), "2");
        assert_eq!(Value::Float(0.1 + 0.2).to_text().unwrap(), "0.3");
        assert_eq!(Value::Array(vec![]).to_text().unwrap(), "");
        assert!(Value::from(vec!["a"]).to_text().is_none());
        assert_eq!(
            Value::Opaque(Arc::new(Point)).to_text().unwrap(),
            "### Object of class: Point ###"
        );
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::from("12").loose_eq(&Value::Int(12)));
        assert!(Value::from("1e1").loose_eq(&Value::from("10")));
        assert!(!Value::from("abc").loose_eq(&Value::Int(0)));
        assert!(Value::Null.loose_eq(&Value::from("")));
        assert!(Value::Bool(true).loose_eq(&Value::from("x")));
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert!(!Value::from("abc").loose_eq(&Value::from("ABC")));
    }

    #[test]
    fn test_loose_ordering() {
        assert_eq!(Value::Int(2).loose_cmp(&Value::from("10")), Some(Ordering::Less));
        assert_eq!(Value::from("b").loose_cmp(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("9").loose_cmp(&Value::from("10")), Some(Ordering::Less));
        assert_eq!(Value::Null.loose_cmp(&Value::Int(1)), Some(Ordering::Less));
    }

    #[test]
    fn test_get() {
        let json = serde_json::json!({"a": {"b": [10, 20]}});
        let value = Value::from_json(&json);
        assert_eq!(value.get("a").get("b").get("1"), Value::Int(20));
        assert_eq!(value.get("missing"), Value::Null);
        assert_eq!(Value::Opaque(Arc::new(Point)).get("x"), Value::Int(3));
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let json = serde_json::json!({"z": 1, "a": 2.5, "m": null});
        let value = Value::from_json(&json);
        if let Value::Object(map) = &value {
            assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        } else {
            panic!("expected an object");
        }
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#039;");
    }
}

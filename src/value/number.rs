//! Numeric coercion and arithmetic

use std::cmp::Ordering;

/// Result of numeric coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(i) => i,
            Number::Float(f) if f.is_finite() => f.trunc() as i64,
            Number::Float(_) => 0,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    pub fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 + b as f64)),
            _ => Number::Float(self.as_f64() + rhs.as_f64()),
        }
    }

    pub fn sub(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_sub(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 - b as f64)),
            _ => Number::Float(self.as_f64() - rhs.as_f64()),
        }
    }

    pub fn mul(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_mul(b)
                .map(Number::Int)
                .unwrap_or(Number::Float(a as f64 * b as f64)),
            _ => Number::Float(self.as_f64() * rhs.as_f64()),
        }
    }

    /// Division. Dividing by zero yields 0.
    pub fn div(self, rhs: Number) -> Number {
        if rhs.is_zero() {
            return Number::Int(0);
        }
        if let (Number::Int(a), Number::Int(b)) = (self, rhs) {
            if let Some(0) = a.checked_rem(b) {
                if let Some(q) = a.checked_div(b) {
                    return Number::Int(q);
                }
            }
        }
        Number::Float(self.as_f64() / rhs.as_f64())
    }

    /// Integer remainder. A zero modulus yields 0.
    pub fn rem(self, rhs: Number) -> Number {
        let (a, b) = (self.as_i64(), rhs.as_i64());
        if b == 0 {
            return Number::Int(0);
        }
        Number::Int(a.checked_rem(b).unwrap_or(0))
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(i) => i
                .checked_neg()
                .map(Number::Int)
                .unwrap_or(Number::Float(-(i as f64))),
            Number::Float(f) => Number::Float(-f),
        }
    }

    pub fn compare(self, rhs: Number) -> Option<Ordering> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&rhs.as_f64()),
        }
    }
}

/// Length of the leading numeric part of `s` (sign, digits, fraction, exponent)
fn numeric_len(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < b.len() && b[i] == b'.' {
        let mut j = i + 1;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > i + 1 {
            digits += j - i - 1;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

fn number_from_literal(text: &str) -> Number {
    if text.contains(['.', 'e', 'E']) {
        return Number::Float(text.parse().unwrap_or(0.0));
    }
    match text.parse::<i64>() {
        Ok(i) => Number::Int(i),
        Err(_) => Number::Float(text.parse().unwrap_or(0.0)),
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Parse a string that is entirely numeric (surrounding whitespace allowed)
pub fn parse_numeric(s: &str) -> Option<Number> {
    let text = s.trim_matches(is_blank);
    let len = numeric_len(text);
    if len == 0 || len != text.len() {
        return None;
    }
    Some(number_from_literal(text))
}

/// Coerce the leading numeric part of a string, 0 when there is none
pub fn numeric_prefix(s: &str) -> Number {
    let text = s.trim_start_matches(is_blank);
    match numeric_len(text) {
        0 => Number::Int(0),
        len => number_from_literal(&text[..len]),
    }
}

/// Format a float the way templates print it: 14 significant digits, no
/// trailing zeros, and `1.0E+20` notation once the exponent leaves [-4, 13].
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let scientific = format!("{:.13e}", f);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..14).contains(&exponent) {
        let mantissa = mantissa.trim_end_matches('0');
        let sign = if exponent < 0 { '-' } else { '+' };
        return if mantissa.ends_with('.') {
            format!("{}0E{}{}", mantissa, sign, exponent.abs())
        } else {
            format!("{}E{}{}", mantissa, sign, exponent.abs())
        };
    }
    let rounded: f64 = scientific.parse().unwrap_or(f);
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("12"), Some(Number::Int(12)));
        assert_eq!(parse_numeric(" -3.5 "), Some(Number::Float(-3.5)));
        assert_eq!(parse_numeric(".5"), Some(Number::Float(0.5)));
        assert_eq!(parse_numeric("1e3"), Some(Number::Float(1000.0)));
        assert_eq!(parse_numeric("12abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("."), None);
        assert_eq!(parse_numeric("-"), None);
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(numeric_prefix("12abc"), Number::Int(12));
        assert_eq!(numeric_prefix("abc"), Number::Int(0));
        assert_eq!(numeric_prefix("  4.5kg"), Number::Float(4.5));
    }

    #[test]
    fn test_division() {
        assert_eq!(Number::Int(39).div(Number::Int(0)), Number::Int(0));
        assert_eq!(Number::Int(39).div(Number::Int(3)), Number::Int(13));
        assert_eq!(Number::Int(1).div(Number::Int(4)), Number::Float(0.25));
        assert_eq!(Number::Int(7).rem(Number::Int(0)), Number::Int(0));
        assert_eq!(Number::Int(7).rem(Number::Int(3)), Number::Int(1));
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        assert!(matches!(
            Number::Int(i64::MAX).add(Number::Int(1)),
            Number::Float(_)
        ));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(-2.86), "-2.86");
        assert_eq!(format_float(-3.0 + 0.14), "-2.86");
        assert_eq!(format_float(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(12345678901234.0), "12345678901234");
    }

    #[test]
    fn test_format_float_exponent_notation() {
        assert_eq!(format_float(1e20), "1.0E+20");
        assert_eq!(format_float(-1e20), "-1.0E+20");
        assert_eq!(format_float(1e14), "1.0E+14");
        assert_eq!(format_float(1.5e-7), "1.5E-7");
        assert_eq!(format_float(0.00001), "1.0E-5");
        assert_eq!(format_float(1.2345678901234567e19), "1.2345678901235E+19");
    }
}

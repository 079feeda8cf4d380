//! Timestamp formatting for `format_timestamp()`

use chrono::{DateTime, TimeZone, Utc};

/// Format a unix timestamp with a `date()`-style format string
pub fn format_timestamp(timestamp: Option<i64>, format: &str) -> String {
    let date = match timestamp {
        Some(ts) => match Utc.timestamp_opt(ts, 0).single() {
            Some(date) => date,
            None => {
                tracing::warn!("Timestamp out of range: {}", ts);
                return String::new();
            }
        },
        None => Utc::now(),
    };
    format_date(&date, format)
}

pub fn format_date(date: &DateTime<Utc>, format: &str) -> String {
    date.format(&php_to_chrono_format(format)).to_string()
}

/// Convert `date()` format letters to chrono specifiers
fn php_to_chrono_format(format: &str) -> String {
    let mut result = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let spec = match c {
            // Day
            'd' => "%d",
            'D' => "%a",
            'j' => "%-d",
            'l' => "%A",
            'N' => "%u",
            'w' => "%w",
            // Week
            'W' => "%V",
            // Month
            'F' => "%B",
            'm' => "%m",
            'M' => "%b",
            'n' => "%-m",
            // Year
            'Y' => "%Y",
            'y' => "%y",
            'o' => "%G",
            // Time
            'a' => "%P",
            'A' => "%p",
            'g' => "%-I",
            'G' => "%-H",
            'h' => "%I",
            'H' => "%H",
            'i' => "%M",
            's' => "%S",
            'v' => "%3f",
            // Timezone
            'e' | 'T' => "%Z",
            'P' => "%:z",
            'O' => "%z",
            // Full date/time
            'c' => "%Y-%m-%dT%H:%M:%S%:z",
            'r' => "%a, %d %b %Y %H:%M:%S %z",
            'U' => "%s",
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal(&mut result, escaped);
                }
                continue;
            }
            other => {
                push_literal(&mut result, other);
                continue;
            }
        };
        result.push_str(spec);
    }
    result
}

fn push_literal(result: &mut String, c: char) {
    if c == '%' {
        result.push_str("%%");
    } else {
        result.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_to_chrono() {
        assert_eq!(php_to_chrono_format("Y-m-d"), "%Y-%m-%d");
        assert_eq!(php_to_chrono_format("H:i:s"), "%H:%M:%S");
        assert_eq!(php_to_chrono_format("\\Y 100%"), "Y 100%%");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Some(0), "Y-m-d H:i"), "1970-01-01 00:00");
        assert_eq!(format_timestamp(Some(1700000000), "D, j F Y"), "Tue, 14 November 2023");
    }
}

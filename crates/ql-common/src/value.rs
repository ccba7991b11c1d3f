//! Scalar cell values and field-name normalization.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// One cell of a canonical row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Scalar {
    /// Convert a deserialized JSON leaf into a scalar.
    ///
    /// Arrays and objects that survive flattening are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Scalar::Int(i)
                } else {
                    n.as_f64().map_or(Scalar::Null, Scalar::Float)
                }
            }
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Scalar::Text(value.to_string()),
        }
    }

    /// Parse text as a number when it is one, otherwise keep it as text.
    pub fn infer_from_str(text: &str) -> Self {
        match parse_number(text) {
            Some(n) => n,
            None => Scalar::Text(text.to_string()),
        }
    }

    /// Numeric coercion that leaves non-numeric values untouched.
    pub fn coerce_numeric(&self) -> Self {
        match self {
            Scalar::Text(s) => parse_number(s).unwrap_or_else(|| self.clone()),
            other => other.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Null or empty text.
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Text(s) => s.trim().is_empty(),
            other => other.is_null(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) if !f.is_nan() => Some(*f),
            Scalar::Text(s) => match parse_number(s) {
                Some(Scalar::Int(i)) => Some(i as f64),
                Some(Scalar::Float(f)) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(d) => Some(*d),
            Scalar::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Case-insensitive substring search over the stringified value.
    pub fn contains_ignore_case(&self, needle_lower: &str) -> bool {
        match self {
            Scalar::Text(s) => s.to_lowercase().contains(needle_lower),
            Scalar::Null => false,
            other => other.to_string().to_lowercase().contains(needle_lower),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(x) => serializer.serialize_f64(*x),
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(d: NaiveDate) -> Self {
        Scalar::Date(d)
    }
}

fn parse_number(text: &str) -> Option<Scalar> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Scalar::Int(i));
    }
    // f64::from_str accepts "nan"/"inf"; those stay text.
    match trimmed.parse::<f64>() {
        Ok(x) if x.is_finite() => Some(Scalar::Float(x)),
        _ => None,
    }
}

/// Parse the provider's date and timestamp spellings down to a calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    None
}

/// Strip a numeric label prefix such as `"4. "` or `"01. "`.
///
/// The prefix qualifies only when, with its dots removed, it is all digits.
pub fn strip_numeric_prefix(name: &str) -> &str {
    if let Some((prefix, rest)) = name.split_once(". ") {
        let mut digits = prefix.chars().filter(|c| *c != '.').peekable();
        if digits.peek().is_some() && digits.all(|c| c.is_ascii_digit()) {
            return rest;
        }
    }
    name
}

/// Canonical lower-snake-case field name for provider-labelled fields.
pub fn normalize_field_name(name: &str) -> String {
    let stripped = strip_numeric_prefix(name.trim()).trim();
    let mut out = String::with_capacity(stripped.len());
    let mut last_underscore = false;
    for c in stripped.chars() {
        let mapped = if c == ' ' || c == '-' { '_' } else { c };
        if mapped == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        out.extend(mapped.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_numeric_prefix() {
        assert_eq!(strip_numeric_prefix("4. close"), "close");
        assert_eq!(strip_numeric_prefix("01. symbol"), "symbol");
        assert_eq!(strip_numeric_prefix("5.1. extra"), "extra");
        assert_eq!(strip_numeric_prefix("close"), "close");
        assert_eq!(strip_numeric_prefix("Mr. Smith"), "Mr. Smith");
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("4. close"), "close");
        assert_eq!(normalize_field_name("5. adjusted close"), "adjusted_close");
        assert_eq!(normalize_field_name("10. change percent"), "change_percent");
        assert_eq!(normalize_field_name(" Split Coefficient "), "split_coefficient");
    }

    #[test]
    fn test_infer_from_str() {
        assert_eq!(Scalar::infer_from_str("10"), Scalar::Int(10));
        assert_eq!(Scalar::infer_from_str("10.5"), Scalar::Float(10.5));
        assert_eq!(Scalar::infer_from_str("nan"), Scalar::Text("nan".into()));
        assert_eq!(Scalar::infer_from_str("None"), Scalar::Text("None".into()));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Scalar::from_json(&json!(3)), Scalar::Int(3));
        assert_eq!(Scalar::from_json(&json!(1.5)), Scalar::Float(1.5));
        assert_eq!(Scalar::from_json(&json!(null)), Scalar::Null);
        assert_eq!(Scalar::from_json(&json!([1, 2])), Scalar::Text("[1,2]".into()));
    }

    #[test]
    fn test_parse_date_variants() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_date("2024-01-02"), Some(d));
        assert_eq!(parse_date("2024-01-02 16:00:00"), Some(d));
        assert_eq!(parse_date("2024-01-02T09:30:00"), Some(d));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_contains_ignore_case() {
        let v = Scalar::Text("Invalid API call. Please retry".into());
        assert!(v.contains_ignore_case("invalid api call"));
        assert!(!Scalar::Null.contains_ignore_case("invalid api call"));
    }
}

//! Scalar values and grouping keys

use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single scalar cell
///
/// Row sources produce whatever scalar shape the backend returns; numeric
/// coercion (`as_f64`) accepts numbers and numeric text alike, since
/// warehouse tables frequently store years and ages as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Build a float value, mapping non-finite results to null
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            Value::Float(n)
        } else {
            Value::Null
        }
    }

    /// Build a float value from an optional result
    pub fn from_opt(n: Option<f64>) -> Self {
        n.map(Value::number).unwrap_or_default()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value
    ///
    /// Text is trimmed and parsed; booleans, null and non-numeric text give `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Numeric coercion for a named field
    ///
    /// Null stays `None`; anything that is neither null nor numeric-coercible
    /// is a `ParseError` naming the field.
    pub fn coerce_f64(&self, field: &str) -> Result<Option<f64>> {
        if self.is_null() {
            return Ok(None);
        }
        match self.as_f64() {
            Some(n) => Ok(Some(n)),
            None => Err(StatdashError::ParseError(format!(
                "Field '{}': value {} is not numeric",
                field,
                self.quoted()
            ))),
        }
    }

    /// Hashable key used for grouping and joins
    ///
    /// Integral floats collapse onto the integer key so `Int(3)` and
    /// `Float(3.0)` fall in the same group.
    pub fn key(&self) -> KeyAtom {
        match self {
            Value::Null => KeyAtom::Null,
            Value::Bool(b) => KeyAtom::Bool(*b),
            Value::Int(i) => KeyAtom::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    KeyAtom::Int(*f as i64)
                } else if f.is_nan() {
                    KeyAtom::Float(f64::NAN.to_bits())
                } else {
                    KeyAtom::Float(f.to_bits())
                }
            }
            Value::Text(s) => KeyAtom::Text(s.clone()),
        }
    }

    /// Ordering used by sorts: numeric when both sides coerce, textual
    /// otherwise, nulls last.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }

    fn quoted(&self) -> String {
        match self {
            Value::Text(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }

    /// Convert to a JSON value for chart payloads
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Convert from a JSON scalar; arrays and objects are rejected
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => Ok(n
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::from_opt(n.as_f64()))),
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(StatdashError::ParseError(format!(
                "Expected a scalar, found {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

/// Hashable projection of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAtom {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64_coerces_numeric_text() {
        assert_eq!(Value::from(" 2021 ").as_f64(), Some(2021.0));
        assert_eq!(Value::from("80+").as_f64(), None);
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Null.as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_coerce_f64_errors_on_text() {
        assert_eq!(Value::Null.coerce_f64("x").unwrap(), None);
        let err = Value::from("abc").coerce_f64("alder").unwrap_err();
        assert!(err.to_string().contains("alder"));
        assert!(matches!(err, StatdashError::ParseError(_)));
    }

    #[test]
    fn test_number_rejects_non_finite() {
        assert!(Value::number(f64::INFINITY).is_null());
        assert!(Value::number(f64::NAN).is_null());
        assert_eq!(Value::number(1.5), Value::Float(1.5));
    }

    #[test]
    fn test_key_unifies_integral_floats() {
        assert_eq!(Value::Int(3).key(), Value::Float(3.0).key());
        assert_ne!(Value::Int(3).key(), Value::from("3").key());
        assert_eq!(Value::Null.key(), Value::Null.key());
    }

    #[test]
    fn test_sort_cmp_numeric_and_nulls_last() {
        assert_eq!(Value::from("9").sort_cmp(&Value::from("10")), Ordering::Less);
        assert_eq!(Value::Null.sort_cmp(&Value::Int(1)), Ordering::Greater);
        assert_eq!(Value::from("b").sort_cmp(&Value::from("a")), Ordering::Greater);
    }

    #[test]
    fn test_display_integral_float() {
        assert_eq!(Value::Float(30.0).to_string(), "30");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_json_round_trip_scalars() {
        let parsed: Value = serde_json::from_str("null").unwrap();
        assert!(parsed.is_null());
        let parsed: Value = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, Value::Int(12));
        let parsed: Value = serde_json::from_str("\"Falkenberg\"").unwrap();
        assert_eq!(parsed, Value::from("Falkenberg"));
        assert!(Value::from_json(&serde_json::json!([1])).is_err());
    }
}

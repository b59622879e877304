//! Elementwise numeric derivations
//!
//! Per-row numeric edge cases (zero or missing denominators) degrade to null
//! instead of failing, so every row still reaches the chart.

use crate::table::{Table, Value};
use crate::Result;
use serde::{Deserialize, Serialize};

fn default_scale() -> f64 {
    1.0
}

/// Ratio parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSpec {
    pub numerator: String,
    pub denominator: String,
    pub output: String,
    /// Multiplier applied to the quotient; 100 gives a percentage
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl RatioSpec {
    pub fn new(
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
            output: output.into(),
            scale: 1.0,
        }
    }

    pub fn percent(mut self) -> Self {
        self.scale = 100.0;
        self
    }
}

/// `numerator / denominator * scale` per row
///
/// Null when either side is null or the denominator is zero; never infinite
/// or NaN.
///
/// # Errors
///
/// Returns `ValidationError` for missing fields and `ParseError` for
/// non-numeric values.
pub fn ratio(table: &Table, spec: &RatioSpec) -> Result<Table> {
    table.require_fields(&[spec.numerator.as_str(), spec.denominator.as_str()])?;

    table.derive_field(&spec.output, |record| {
        let numerator = record.get(&spec.numerator).coerce_f64(&spec.numerator)?;
        let denominator = record.get(&spec.denominator).coerce_f64(&spec.denominator)?;
        Ok(match (numerator, denominator) {
            (Some(n), Some(d)) if d != 0.0 => Value::number(n / d * spec.scale),
            _ => Value::Null,
        })
    })
}

/// `total - field` per row, e.g. a share's complement out of 100
pub fn complement(table: &Table, field: &str, total: f64, output: &str) -> Result<Table> {
    table.require_fields(&[field])?;
    table.derive_field(output, |record| {
        Ok(Value::from_opt(
            record.get(field).coerce_f64(field)?.map(|v| total - v),
        ))
    })
}

/// Round a numeric field to `digits` decimals in place
///
/// With `digits == 0` integral results are stored as integers. Digit counts
/// beyond what an `f64` can scale leave values unchanged.
pub fn round(table: &Table, field: &str, digits: u32) -> Result<Table> {
    table.require_fields(&[field])?;
    let factor = i32::try_from(digits)
        .map(|d| 10f64.powi(d))
        .unwrap_or(f64::INFINITY);
    table.derive_field(field, |record| {
        let value = record.get(field);
        Ok(match value.coerce_f64(field)? {
            None => Value::Null,
            Some(v) if digits == 0 => {
                let rounded = v.round();
                if rounded.abs() < i64::MAX as f64 {
                    Value::Int(rounded as i64)
                } else {
                    Value::number(rounded)
                }
            }
            Some(v) => {
                let scaled = v * factor;
                if scaled.is_finite() {
                    Value::number(scaled.round() / factor)
                } else {
                    Value::number(v)
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatdashError;

    fn regso() -> Table {
        Table::from_values(
            &["regso", "under_20", "folkmangd"],
            vec![
                vec!["A".into(), Value::Int(25), Value::Int(100)],
                vec!["B".into(), Value::Int(3), Value::Int(0)],
                vec!["C".into(), Value::Null, Value::Int(50)],
                vec!["D".into(), Value::Int(-4), Value::Int(0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ratio_percent() {
        let out = ratio(&regso(), &RatioSpec::new("under_20", "folkmangd", "andel").percent()).unwrap();
        assert_eq!(out.rows()[0].get("andel"), &Value::Float(25.0));
    }

    #[test]
    fn test_ratio_zero_denominator_is_null() {
        let out = ratio(&regso(), &RatioSpec::new("under_20", "folkmangd", "andel")).unwrap();
        assert!(out.rows()[1].get("andel").is_null());
        assert!(out.rows()[2].get("andel").is_null());
        assert!(out.rows()[3].get("andel").is_null());
        for value in out.column("andel") {
            if let Some(v) = value.as_f64() {
                assert!(v.is_finite());
            }
        }
    }

    #[test]
    fn test_ratio_non_numeric_is_parse_error() {
        let table = Table::from_values(&["a", "b"], vec![vec!["x".into(), Value::Int(1)]]).unwrap();
        let result = ratio(&table, &RatioSpec::new("a", "b", "c"));
        assert!(matches!(result, Err(StatdashError::ParseError(_))));
    }

    #[test]
    fn test_complement() {
        let table = Table::from_values(&["andel"], vec![vec![Value::Float(12.5)], vec![Value::Null]]).unwrap();
        let out = complement(&table, "andel", 100.0, "rest").unwrap();
        assert_eq!(out.rows()[0].get("rest"), &Value::Float(87.5));
        assert!(out.rows()[1].get("rest").is_null());
    }

    #[test]
    fn test_round() {
        let table = Table::from_values(&["v"], vec![vec![Value::Float(2.345)], vec![Value::Float(10.6)]]).unwrap();
        let out = round(&table, "v", 0).unwrap();
        assert_eq!(out.rows()[0].get("v"), &Value::Int(2));
        assert_eq!(out.rows()[1].get("v"), &Value::Int(11));

        let out = round(&table, "v", 1).unwrap();
        assert_eq!(out.rows()[1].get("v"), &Value::Float(10.6));
        assert_eq!(out.fields(), &["v"]);
    }

    #[test]
    fn test_round_with_huge_digit_counts() {
        let table = Table::from_values(&["v"], vec![vec![Value::Float(2.345)], vec![Value::Float(1e300)]]).unwrap();
        for digits in [400, u32::MAX] {
            let out = round(&table, "v", digits).unwrap();
            assert_eq!(out.rows()[0].get("v"), &Value::Float(2.345));
            assert_eq!(out.rows()[1].get("v"), &Value::Float(1e300));
        }
        let out = round(&table, "v", 20).unwrap();
        assert_eq!(out.rows()[1].get("v"), &Value::Float(1e300));
    }
}

//! Fixed-width binning of a continuous field
//!
//! Statistics tables often encode open-ended classes with a terminal marker
//! (`"100+"`, or `"80-"` for "80 and over"). Such values parse to their lower
//! bound and always land in an open-ended `"{start}+"` bucket.

use crate::table::{Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};

/// Binning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Source field holding numbers or terminal-marked numeric text
    pub field: String,
    /// Bucket width; must be positive
    pub width: i64,
    /// Buckets starting at or above this value are labelled `"{start}+"`
    pub top_open_at: i64,
    /// Field receiving the bucket label
    pub output: String,
    /// Optional field receiving the numeric bucket start
    #[serde(default)]
    pub start_output: Option<String>,
    /// Text appended to every label, e.g. `" år"`
    #[serde(default)]
    pub suffix: Option<String>,
}

impl BucketSpec {
    pub fn new(field: impl Into<String>, width: i64, top_open_at: i64, output: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            width,
            top_open_at,
            output: output.into(),
            start_output: None,
            suffix: None,
        }
    }

    pub fn with_start_output(mut self, field: impl Into<String>) -> Self {
        self.start_output = Some(field.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    fn label(&self, start: i64, open: bool) -> Result<String> {
        let suffix = self.suffix.as_deref().unwrap_or("");
        if open || start >= self.top_open_at {
            return Ok(format!("{}+{}", start, suffix));
        }
        let end = start.checked_add(self.width - 1).ok_or_else(|| {
            StatdashError::DomainError(format!(
                "Field '{}': bucket starting at {} has no representable end",
                self.field, start
            ))
        })?;
        Ok(format!("{}-{}{}", start, end, suffix))
    }

    /// Start of the bucket holding `value`, floored to a multiple of the width
    fn start_of(&self, value: f64) -> Result<i64> {
        let index = (value / self.width as f64).floor();
        let start = if index >= i64::MIN as f64 && index < i64::MAX as f64 {
            (index as i64).checked_mul(self.width)
        } else {
            None
        };
        start.ok_or_else(|| {
            StatdashError::DomainError(format!(
                "Field '{}': value {} is outside the bucketable range",
                self.field, value
            ))
        })
    }
}

/// Parse a possibly terminal-marked number
///
/// Returns the numeric lower bound and whether the value was open-ended.
/// Accepts `"34"`, `"100+"`, `"80-"` and ranges such as `"75-79"`.
fn parse_marked(text: &str) -> Option<(f64, bool)> {
    let trimmed = text.trim();
    let (body, open) = match trimmed.strip_suffix('+').or_else(|| trimmed.strip_suffix('-')) {
        Some(body) if !body.is_empty() => (body.trim(), true),
        _ => (trimmed, false),
    };

    // "75-79" -> lower bound 75; a leading '-' is a sign, not a range
    let lower = match body.get(1..).and_then(|rest| rest.find('-')) {
        Some(pos) => &body[..pos + 1],
        None => body,
    };

    lower
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| (v, open))
}

/// Bin `spec.field` into fixed-width labelled buckets
///
/// # Errors
///
/// Returns `DomainError` for a non-positive width or a value whose bucket
/// bounds do not fit in an `i64`, `ValidationError` if the field is missing,
/// and `ParseError` if a non-null value is not coercible to a number after
/// stripping its terminal marker. Null values produce a null label.
pub fn bucket(table: &Table, spec: &BucketSpec) -> Result<Table> {
    if spec.width <= 0 {
        return Err(StatdashError::DomainError(format!(
            "Bucket width must be positive, got {}",
            spec.width
        )));
    }
    table.require_fields(&[spec.field.as_str()])?;

    let parse = |value: &Value| -> Result<Option<(i64, bool)>> {
        let parsed = match value {
            Value::Null => return Ok(None),
            Value::Int(i) => {
                let start = i.div_euclid(spec.width).checked_mul(spec.width);
                return match start {
                    Some(start) => Ok(Some((start, false))),
                    None => Err(StatdashError::DomainError(format!(
                        "Field '{}': value {} is outside the bucketable range",
                        spec.field, i
                    ))),
                };
            }
            Value::Float(f) if f.is_finite() => Some((*f, false)),
            Value::Text(s) => parse_marked(s),
            _ => None,
        };
        match parsed {
            Some((v, open)) => Ok(Some((spec.start_of(v)?, open))),
            None => Err(StatdashError::ParseError(format!(
                "Field '{}': cannot bucket value '{}'",
                spec.field, value
            ))),
        }
    };

    let labelled = table.derive_field(&spec.output, |record| {
        Ok(match parse(record.get(&spec.field))? {
            Some((start, open)) => Value::Text(spec.label(start, open)?),
            None => Value::Null,
        })
    })?;

    match &spec.start_output {
        Some(start_field) => labelled.derive_field(start_field, |record| {
            Ok(match parse(record.get(&spec.field))? {
                Some((start, _)) => Value::Int(start),
                None => Value::Null,
            })
        }),
        None => Ok(labelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ages(values: Vec<Value>) -> Table {
        Table::from_values(&["alder"], values.into_iter().map(|v| vec![v]).collect()).unwrap()
    }

    fn labels(table: &Table) -> Vec<String> {
        table.column("grupp").map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_decade_labels() {
        let table = ages(vec!["34".into(), "80-".into(), Value::Int(0), "100+".into(), "99".into()]);
        let out = bucket(&table, &BucketSpec::new("alder", 10, 100, "grupp")).unwrap();
        assert_eq!(labels(&out), vec!["30-39", "80+", "0-9", "100+", "90-99"]);
    }

    #[test]
    fn test_top_bucket_without_marker() {
        let table = ages(vec![Value::Int(104)]);
        let out = bucket(&table, &BucketSpec::new("alder", 10, 100, "grupp")).unwrap();
        assert_eq!(labels(&out), vec!["100+"]);
    }

    #[test]
    fn test_range_text_uses_lower_bound() {
        let table = ages(vec!["75-79".into(), "15-19".into()]);
        let out = bucket(&table, &BucketSpec::new("alder", 10, 100, "grupp")).unwrap();
        assert_eq!(labels(&out), vec!["70-79", "10-19"]);
    }

    #[test]
    fn test_suffix_and_start_output() {
        let table = ages(vec!["42".into(), "100+".into()]);
        let spec = BucketSpec::new("alder", 10, 100, "grupp")
            .with_suffix(" år")
            .with_start_output("start");
        let out = bucket(&table, &spec).unwrap();
        assert_eq!(labels(&out), vec!["40-49 år", "100+ år"]);
        assert_eq!(out.rows()[0].get("start"), &Value::Int(40));
        assert_eq!(out.fields(), &["alder", "grupp", "start"]);
    }

    #[test]
    fn test_null_passes_through() {
        let table = ages(vec![Value::Null]);
        let out = bucket(&table, &BucketSpec::new("alder", 5, 90, "grupp")).unwrap();
        assert!(out.rows()[0].get("grupp").is_null());
    }

    #[test]
    fn test_unparseable_is_parse_error() {
        let table = ages(vec!["okänd".into()]);
        let result = bucket(&table, &BucketSpec::new("alder", 10, 100, "grupp"));
        assert!(matches!(result, Err(StatdashError::ParseError(_))));
    }

    #[test]
    fn test_non_positive_width() {
        let table = ages(vec!["1".into()]);
        let result = bucket(&table, &BucketSpec::new("alder", 0, 100, "grupp"));
        assert!(matches!(result, Err(StatdashError::DomainError(_))));
    }

    #[test]
    fn test_extreme_values() {
        let spec = BucketSpec::new("alder", 10, 100, "grupp");
        let out = bucket(&ages(vec![Value::Int(i64::MAX - 3), Value::Int(-15)]), &spec).unwrap();
        assert_eq!(labels(&out), vec!["9223372036854775800+", "-20--11"]);

        for value in [
            Value::from("1e300"),
            Value::from("-1e300"),
            Value::Float(1e19),
            Value::Int(i64::MIN),
        ] {
            let result = bucket(&ages(vec![value]), &spec);
            assert!(matches!(result, Err(StatdashError::DomainError(_))));
        }

        // Closed bucket whose end overflows
        let no_top = BucketSpec::new("alder", 10, i64::MAX, "grupp");
        let result = bucket(&ages(vec![Value::Int(i64::MAX - 3)]), &no_top);
        assert!(matches!(result, Err(StatdashError::DomainError(_))));
    }

    #[test]
    fn test_parse_marked() {
        assert_eq!(parse_marked("80-"), Some((80.0, true)));
        assert_eq!(parse_marked(" 7 "), Some((7.0, false)));
        assert_eq!(parse_marked("-5"), Some((-5.0, false)));
        assert_eq!(parse_marked("+"), None);
    }
}

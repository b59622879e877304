//! Group-by aggregation
//!
//! Rows are partitioned by exact equality of the grouping key in a single
//! pass. Output groups appear in first-seen order of their key tuple; a
//! group only exists if at least one row produced it.

use super::KeyIndex;
use crate::table::{Record, Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reduction applied to a group's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Sum,
    Mean,
    /// Number of rows in the group, nulls included
    Count,
    Min,
    Max,
}

/// One output column of an aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub output: String,
    /// Source field; ignored by `Count`
    #[serde(default)]
    pub source: String,
    pub kind: AggregateKind,
}

impl AggregateSpec {
    pub fn new(output: impl Into<String>, source: impl Into<String>, kind: AggregateKind) -> Self {
        Self {
            output: output.into(),
            source: source.into(),
            kind,
        }
    }

    pub fn count(output: impl Into<String>) -> Self {
        Self::new(output, "", AggregateKind::Count)
    }
}

/// Running state for one aggregate in one group
#[derive(Debug, Clone, Default)]
struct Accumulator {
    rows: usize,
    numeric: usize,
    sum: f64,
    int_sum: Option<i64>,
    min: Option<(f64, Value)>,
    max: Option<(f64, Value)>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            int_sum: Some(0),
            ..Self::default()
        }
    }

    fn push(&mut self, kind: AggregateKind, value: &Value, field: &str) -> Result<()> {
        self.rows += 1;
        if kind == AggregateKind::Count {
            return Ok(());
        }
        let Some(n) = value.coerce_f64(field)? else {
            return Ok(());
        };
        self.numeric += 1;
        self.sum += n;
        self.int_sum = match (self.int_sum, value) {
            (Some(acc), Value::Int(i)) => acc.checked_add(*i),
            _ => None,
        };
        if self.min.as_ref().map_or(true, |(m, _)| n < *m) {
            self.min = Some((n, value.clone()));
        }
        if self.max.as_ref().map_or(true, |(m, _)| n > *m) {
            self.max = Some((n, value.clone()));
        }
        Ok(())
    }

    fn finish(&self, kind: AggregateKind) -> Value {
        match kind {
            AggregateKind::Count => Value::Int(self.rows as i64),
            AggregateKind::Sum => match self.int_sum {
                Some(total) => Value::Int(total),
                None => Value::number(self.sum),
            },
            AggregateKind::Mean => {
                if self.numeric == 0 {
                    Value::Null
                } else {
                    Value::number(self.sum / self.numeric as f64)
                }
            }
            AggregateKind::Min => self.min.as_ref().map(|(_, v)| v.clone()).unwrap_or_default(),
            AggregateKind::Max => self.max.as_ref().map(|(_, v)| v.clone()).unwrap_or_default(),
        }
    }
}

/// Aggregate a table by a grouping key
///
/// # Arguments
///
/// * `table` - Input rows
/// * `by` - Grouping key fields; empty means one group over the whole table
/// * `aggregates` - Output columns, written after the key fields in order
///
/// # Errors
///
/// Returns `ValidationError` for unknown or clashing field names and
/// `ParseError` when a numeric aggregate meets a non-numeric value.
pub fn aggregate<S: AsRef<str>>(
    table: &Table,
    by: &[S],
    aggregates: &[AggregateSpec],
) -> Result<Table> {
    table.require_fields(by)?;

    let mut seen = HashSet::new();
    for key in by {
        seen.insert(key.as_ref());
    }
    for spec in aggregates {
        if spec.kind != AggregateKind::Count {
            table.require_fields(&[spec.source.as_str()])?;
        }
        if !seen.insert(spec.output.as_str()) {
            return Err(StatdashError::ValidationError(format!(
                "Aggregate output '{}' is already used by another column",
                spec.output
            )));
        }
    }

    let mut index = KeyIndex::new();
    let mut groups: Vec<(usize, Vec<Accumulator>)> = Vec::new();

    for (row_idx, record) in table.rows().iter().enumerate() {
        let (group, is_new) = index.slot(record.key(by));
        if is_new {
            groups.push((row_idx, vec![Accumulator::new(); aggregates.len()]));
        }
        let accumulators = &mut groups[group].1;
        for (acc, spec) in accumulators.iter_mut().zip(aggregates) {
            acc.push(spec.kind, record.get(&spec.source), &spec.source)?;
        }
    }

    let mut fields: Vec<String> = by.iter().map(|k| k.as_ref().to_string()).collect();
    fields.extend(aggregates.iter().map(|a| a.output.clone()));

    let rows = groups
        .into_iter()
        .map(|(first_row, accumulators)| {
            let source = &table.rows()[first_row];
            let mut record = Record::new();
            for key in by {
                record.insert(key.as_ref(), source.get(key.as_ref()).clone());
            }
            for (acc, spec) in accumulators.iter().zip(aggregates) {
                record.insert(spec.output.clone(), acc.finish(spec.kind));
            }
            record
        })
        .collect();

    tracing::debug!(
        input_rows = table.len(),
        groups = index.len(),
        "aggregate"
    );

    Ok(Table::new(fields, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population() -> Table {
        Table::from_values(
            &["aldersgrupp", "ar", "folkmangd"],
            vec![
                vec!["0-9".into(), "2021".into(), Value::Int(10)],
                vec!["10-19".into(), "2021".into(), Value::Int(20)],
                vec!["0-9".into(), "2021".into(), Value::Int(5)],
                vec!["0-9".into(), "2022".into(), Value::Null],
                vec![Value::Null, "2022".into(), Value::Int(7)],
                vec![Value::Null, "2022".into(), Value::Float(1.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_first_seen_group_order() {
        let out = aggregate(
            &population(),
            &["aldersgrupp", "ar"],
            &[AggregateSpec::new("total", "folkmangd", AggregateKind::Sum)],
        )
        .unwrap();

        assert_eq!(out.fields(), &["aldersgrupp", "ar", "total"]);
        assert_eq!(out.len(), 4);
        assert_eq!(out.rows()[0].get("total"), &Value::Int(15));
        assert_eq!(out.rows()[1].get("aldersgrupp"), &Value::from("10-19"));
        // All-null group sums to zero
        assert_eq!(out.rows()[2].get("total"), &Value::Int(0));
        // Null keys group together
        assert!(out.rows()[3].get("aldersgrupp").is_null());
        assert_eq!(out.rows()[3].get("total"), &Value::Float(8.5));
    }

    #[test]
    fn test_counts_partition_input() {
        let table = population();
        let out = aggregate(&table, &["ar"], &[AggregateSpec::count("n")]).unwrap();
        let total: i64 = out
            .column("n")
            .map(|v| match v {
                Value::Int(i) => *i,
                _ => 0,
            })
            .sum();
        assert_eq!(total as usize, table.len());
    }

    #[test]
    fn test_mean_min_max() {
        let out = aggregate(
            &population(),
            &["ar"],
            &[
                AggregateSpec::new("mean", "folkmangd", AggregateKind::Mean),
                AggregateSpec::new("min", "folkmangd", AggregateKind::Min),
                AggregateSpec::new("max", "folkmangd", AggregateKind::Max),
            ],
        )
        .unwrap();

        let first = &out.rows()[0];
        assert_eq!(first.get("mean").as_f64(), Some(35.0 / 3.0));
        assert_eq!(first.get("min"), &Value::Int(5));
        assert_eq!(first.get("max"), &Value::Int(20));

        let second = &out.rows()[1];
        assert_eq!(second.get("mean").as_f64(), Some(4.25));
        assert_eq!(second.get("min"), &Value::Float(1.5));
    }

    #[test]
    fn test_empty_key_single_group() {
        let out = aggregate(
            &population(),
            &[] as &[&str],
            &[AggregateSpec::new("total", "folkmangd", AggregateKind::Sum)],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0].get("total"), &Value::Float(43.5));
    }

    #[test]
    fn test_empty_table_has_no_groups() {
        let table = Table::empty(&["ar", "folkmangd"]);
        let out = aggregate(
            &table,
            &[] as &[&str],
            &[AggregateSpec::new("total", "folkmangd", AggregateKind::Sum)],
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_sum_of_sums_is_idempotent() {
        let once = aggregate(
            &population(),
            &["aldersgrupp", "ar"],
            &[AggregateSpec::new("folkmangd", "folkmangd", AggregateKind::Sum)],
        )
        .unwrap();
        let twice = aggregate(
            &once,
            &["aldersgrupp", "ar"],
            &[AggregateSpec::new("folkmangd", "folkmangd", AggregateKind::Sum)],
        )
        .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_non_numeric_value_is_parse_error() {
        let table = Table::from_values(&["k", "v"], vec![vec!["a".into(), "x".into()]]).unwrap();
        let result = aggregate(
            &table,
            &["k"],
            &[AggregateSpec::new("v", "v", AggregateKind::Sum)],
        );
        assert!(matches!(result, Err(StatdashError::ParseError(_))));
    }

    #[test]
    fn test_count_ignores_source_values() {
        let table = Table::from_values(
            &["bransch", "namn"],
            vec![
                vec!["Handel".into(), "Foo AB".into()],
                vec!["Bygg".into(), "Bar HB".into()],
                vec!["Handel".into(), Value::Null],
            ],
        )
        .unwrap();

        let out = aggregate(
            &table,
            &["bransch"],
            &[
                AggregateSpec::new("n", "namn", AggregateKind::Count),
                AggregateSpec::new("m", "saknas", AggregateKind::Count),
            ],
        )
        .unwrap();
        assert_eq!(out.rows()[0].get("n"), &Value::Int(2));
        assert_eq!(out.rows()[0].get("m"), &Value::Int(2));
        assert_eq!(out.rows()[1].get("n"), &Value::Int(1));
    }

    #[test]
    fn test_unknown_and_clashing_fields() {
        let table = population();
        assert!(aggregate(&table, &["kommun"], &[]).is_err());
        let clash = aggregate(
            &table,
            &["ar"],
            &[AggregateSpec::new("ar", "folkmangd", AggregateKind::Sum)],
        );
        assert!(matches!(clash, Err(StatdashError::ValidationError(_))));
    }
}

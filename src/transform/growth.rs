//! Period-over-period and compound growth rates
//!
//! Rows are partitioned once and each partition is ordered by the time key
//! with a stable sort, so ties keep their input order. Output rows stay in
//! input order; only the derived column is added.

use super::KeyIndex;
use crate::table::{Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};

/// How a growth rate is computed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthMode {
    /// `(value[t] - value[t-1]) / value[t-1]` against the preceding row
    #[default]
    Simple,
    /// Compound annual growth from each row's time to a reference time
    Cagr {
        /// Reference time; defaults to the maximum time value in the table
        #[serde(default)]
        reference: Option<Value>,
    },
}

/// Growth rate parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSpec {
    pub time: String,
    #[serde(default)]
    pub partition: Vec<String>,
    pub value: String,
    pub output: String,
    #[serde(default)]
    pub mode: GrowthMode,
}

impl GrowthSpec {
    pub fn simple(time: impl Into<String>, value: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            partition: Vec::new(),
            value: value.into(),
            output: output.into(),
            mode: GrowthMode::Simple,
        }
    }

    pub fn partitioned_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.partition = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn cagr(mut self, reference: Option<Value>) -> Self {
        self.mode = GrowthMode::Cagr { reference };
        self
    }
}

/// Compound annual growth rate
///
/// `(end / start)^(1 / years_diff) - 1`
///
/// # Errors
///
/// Returns `DomainError` when `years_diff` is zero, `start` is not positive,
/// or the result is not a finite number.
pub fn compute_cagr(start: f64, end: f64, years_diff: f64) -> Result<f64> {
    if years_diff == 0.0 {
        return Err(StatdashError::DomainError(
            "CAGR is undefined for a zero-year span".to_string(),
        ));
    }
    if start <= 0.0 {
        return Err(StatdashError::DomainError(format!(
            "CAGR requires a positive start value, got {}",
            start
        )));
    }
    let rate = (end / start).powf(1.0 / years_diff) - 1.0;
    if rate.is_finite() {
        Ok(rate)
    } else {
        Err(StatdashError::DomainError(format!(
            "CAGR from {} to {} over {} years is not a finite number",
            start, end, years_diff
        )))
    }
}

/// Add a growth-rate column
///
/// Degenerate rows (first row of a partition, missing or zero prior value,
/// non-positive CAGR base, missing reference row) get a null output.
///
/// # Errors
///
/// Returns `ValidationError` for missing fields and `ParseError` when the
/// value field (or, for CAGR, the time field) holds non-numeric text.
pub fn growth_rate(table: &Table, spec: &GrowthSpec) -> Result<Table> {
    table.require_fields(&[spec.time.as_str(), spec.value.as_str()])?;
    table.require_fields(&spec.partition)?;

    let rows = table.rows();
    let values = rows
        .iter()
        .map(|r| r.get(&spec.value).coerce_f64(&spec.value))
        .collect::<Result<Vec<_>>>()?;

    // Partition once, then order each partition by time
    let mut index = KeyIndex::new();
    let mut partitions: Vec<Vec<usize>> = Vec::new();
    for (row_idx, record) in rows.iter().enumerate() {
        let (slot, is_new) = index.slot(record.key(&spec.partition));
        if is_new {
            partitions.push(Vec::new());
        }
        partitions[slot].push(row_idx);
    }
    for members in &mut partitions {
        members.sort_by(|a, b| rows[*a].get(&spec.time).sort_cmp(rows[*b].get(&spec.time)));
    }

    let mut output = vec![Value::Null; rows.len()];

    match &spec.mode {
        GrowthMode::Simple => {
            for members in &partitions {
                for pair in members.windows(2) {
                    let (prev, cur) = (pair[0], pair[1]);
                    if let (Some(p), Some(c)) = (values[prev], values[cur]) {
                        if p != 0.0 {
                            output[cur] = Value::number((c - p) / p);
                        }
                    }
                }
            }
        }
        GrowthMode::Cagr { reference } => {
            let times = rows
                .iter()
                .map(|r| r.get(&spec.time).coerce_f64(&spec.time))
                .collect::<Result<Vec<_>>>()?;

            let reference = match reference {
                Some(value) => value.coerce_f64("reference")?,
                None => times.iter().flatten().copied().reduce(f64::max),
            };

            if let Some(reference) = reference {
                for members in &partitions {
                    let end = members
                        .iter()
                        .find(|idx| times[**idx] == Some(reference))
                        .and_then(|idx| values[*idx]);
                    let Some(end) = end else {
                        continue;
                    };
                    for &idx in members {
                        let (Some(t), Some(start)) = (times[idx], values[idx]) else {
                            continue;
                        };
                        if t >= reference {
                            continue;
                        }
                        output[idx] = Value::from_opt(compute_cagr(start, end, reference - t).ok());
                    }
                }
            } else {
                tracing::warn!(field = %spec.time, "no reference time for CAGR, output is all null");
            }
        }
    }

    tracing::debug!(
        rows = rows.len(),
        partitions = partitions.len(),
        output = %spec.output,
        "growth_rate"
    );

    let mut output = output.into_iter();
    table.derive_field(&spec.output, |_| Ok(output.next().unwrap_or_default()))
}

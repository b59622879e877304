//! Row and column reshaping: renames, code relabelling, filters, sorting,
//! fills, projections and wide-to-long melts

use crate::table::{Record, Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// =============================================================================
// Columns
// =============================================================================

/// Rename fields; unknown source names are a validation error
///
/// Renaming onto an existing field that is not itself renamed away is
/// rejected, so no column is silently lost.
pub fn rename(table: &Table, mapping: &BTreeMap<String, String>) -> Result<Table> {
    table.require_fields(&mapping.keys().collect::<Vec<_>>())?;

    let fields: Vec<String> = table
        .fields()
        .iter()
        .map(|f| mapping.get(f).cloned().unwrap_or_else(|| f.clone()))
        .collect();
    let mut seen = HashSet::new();
    for field in &fields {
        if !seen.insert(field.as_str()) {
            return Err(StatdashError::ValidationError(format!(
                "Rename produces duplicate field '{}'",
                field
            )));
        }
    }

    let rows = table
        .rows()
        .iter()
        .map(|record| {
            let mut next = Record::new();
            for field in table.fields() {
                let name = mapping.get(field).unwrap_or(field);
                next.insert(name.clone(), record.get(field).clone());
            }
            next
        })
        .collect();

    Ok(Table::new(fields, rows).with_annotations(table.annotations().clone()))
}

/// Replace codes with descriptions in one field
///
/// Values are matched on their display form, so `Int(2)` matches the key
/// `"2"`. Unmapped values are kept as-is, or nulled when `keep_unmapped` is
/// false.
pub fn relabel(
    table: &Table,
    field: &str,
    mapping: &BTreeMap<String, String>,
    keep_unmapped: bool,
) -> Result<Table> {
    table.require_fields(&[field])?;
    table.derive_field(field, |record| {
        let value = record.get(field);
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(match mapping.get(&value.to_string()) {
            Some(label) => Value::Text(label.clone()),
            None if keep_unmapped => value.clone(),
            None => Value::Null,
        })
    })
}

/// Keep only the listed fields, in the listed order
pub fn select<S: AsRef<str>>(table: &Table, fields: &[S]) -> Result<Table> {
    table.require_fields(fields)?;
    let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
    let rows = table
        .rows()
        .iter()
        .map(|record| {
            let mut next = Record::new();
            for field in &fields {
                next.insert(field.clone(), record.get(field).clone());
            }
            next
        })
        .collect();
    Ok(Table::new(fields, rows))
}

/// Unpivot `value_vars` into `var_name`/`value_name` pairs
///
/// Output rows are ordered by input row, then by `value_vars` order. When
/// `value_vars` is empty every field not in `id_vars` is melted.
pub fn melt<S: AsRef<str>>(
    table: &Table,
    id_vars: &[S],
    value_vars: &[S],
    var_name: &str,
    value_name: &str,
) -> Result<Table> {
    table.require_fields(id_vars)?;
    table.require_fields(value_vars)?;

    let ids: Vec<String> = id_vars.iter().map(|f| f.as_ref().to_string()).collect();
    let melted: Vec<String> = if value_vars.is_empty() {
        table
            .fields()
            .iter()
            .filter(|f| !ids.contains(f))
            .cloned()
            .collect()
    } else {
        value_vars.iter().map(|f| f.as_ref().to_string()).collect()
    };

    if ids.iter().any(|f| f == var_name || f == value_name) || var_name == value_name {
        return Err(StatdashError::ValidationError(format!(
            "Melt output fields '{}' and '{}' must be distinct from each other and the id fields",
            var_name, value_name
        )));
    }

    let mut rows = Vec::with_capacity(table.len() * melted.len());
    for record in table.rows() {
        for var in &melted {
            let mut next = Record::new();
            for id in &ids {
                next.insert(id.clone(), record.get(id).clone());
            }
            next.insert(var_name, Value::Text(var.clone()));
            next.insert(value_name, record.get(var).clone());
            rows.push(next);
        }
    }

    let mut fields = ids;
    fields.push(var_name.to_string());
    fields.push(value_name.to_string());

    tracing::debug!(input_rows = table.len(), output_rows = rows.len(), "melt");
    Ok(Table::new(fields, rows))
}

// =============================================================================
// Rows
// =============================================================================

/// Row predicate on a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    /// Substring match on the display form
    Contains(String),
    NotContains(String),
    IsNull,
    NotNull,
}

impl Predicate {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Eq(expected) => value.key() == expected.key(),
            Predicate::Ne(expected) => value.key() != expected.key(),
            Predicate::In(options) => options.iter().any(|o| o.key() == value.key()),
            Predicate::Contains(needle) => !value.is_null() && value.to_string().contains(needle),
            Predicate::NotContains(needle) => {
                value.is_null() || !value.to_string().contains(needle)
            }
            Predicate::IsNull => value.is_null(),
            Predicate::NotNull => !value.is_null(),
        }
    }
}

/// Keep rows whose `field` satisfies `predicate`
pub fn filter(table: &Table, field: &str, predicate: &Predicate) -> Result<Table> {
    table.require_fields(&[field])?;
    let rows: Vec<Record> = table
        .rows()
        .iter()
        .filter(|r| predicate.matches(r.get(field)))
        .cloned()
        .collect();
    tracing::debug!(input_rows = table.len(), kept = rows.len(), field, "filter");
    Ok(table.with_rows(rows))
}

/// Keep rows at the maximum value of `field`, e.g. the latest year
///
/// Comparison uses the same ordering as [`sort`]. An all-null field keeps
/// no rows.
pub fn filter_latest(table: &Table, field: &str) -> Result<Table> {
    table.require_fields(&[field])?;
    let latest = table
        .column(field)
        .filter(|v| !v.is_null())
        .max_by(|a, b| a.sort_cmp(b))
        .cloned();

    let rows = match latest {
        Some(latest) => table
            .rows()
            .iter()
            .filter(|r| r.get(field).sort_cmp(&latest).is_eq())
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    Ok(table.with_rows(rows))
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Stable multi-key sort
///
/// Numeric-aware (`"9"` sorts before `"10"`); nulls sort last in both
/// directions.
pub fn sort(table: &Table, keys: &[SortKey]) -> Result<Table> {
    for key in keys {
        table.require_fields(&[key.field.as_str()])?;
    }
    let mut rows = table.rows().to_vec();
    rows.sort_by(|a, b| {
        for key in keys {
            let (x, y) = (a.get(&key.field), b.get(&key.field));
            let ordering = match (x.is_null(), y.is_null()) {
                (false, false) if key.descending => y.sort_cmp(x),
                _ => x.sort_cmp(y),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(table.with_rows(rows))
}

/// Replace nulls in `field` with the last non-null value above them
pub fn forward_fill(table: &Table, field: &str) -> Result<Table> {
    table.require_fields(&[field])?;
    let mut last = Value::Null;
    table.derive_field(field, |record| {
        let value = record.get(field);
        if !value.is_null() {
            last = value.clone();
        }
        Ok(last.clone())
    })
}

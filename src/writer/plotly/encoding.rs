//! Encoding checks and column extraction for Plotly traces

use crate::table::{KeyAtom, Table, Value};
use crate::writer::{ChartKind, Encoding};
use crate::{Result, StatdashError};
use serde_json::Value as Json;
use std::collections::HashMap;

/// Check that `kind` has the channels it needs
pub(super) fn check_channels(kind: ChartKind, encoding: &Encoding) -> Result<()> {
    if kind.is_cartesian() {
        for (channel, field) in [("x", &encoding.x), ("y", &encoding.y)] {
            if field.is_none() {
                return Err(StatdashError::EncodingError(format!(
                    "{:?} chart requires the '{}' channel",
                    kind, channel
                )));
            }
        }
    }
    if kind == ChartKind::Sunburst && encoding.path.is_empty() != encoding.value.is_none() {
        return Err(StatdashError::EncodingError(
            "Sunburst 'path' and 'value' must be given together".to_string(),
        ));
    }
    Ok(())
}

/// Check that every encoded field exists in the table
pub(super) fn check_fields(table: &Table, encoding: &Encoding) -> Result<()> {
    for field in encoding.fields() {
        if !table.has_field(field) {
            return Err(StatdashError::EncodingError(format!(
                "Encoded field '{}' not found. Available fields: {}",
                field,
                table.fields().join(", ")
            )));
        }
    }
    Ok(())
}

/// JSON array of one field over a subset of rows
pub(super) fn column(table: &Table, field: &str, rows: &[usize]) -> Json {
    Json::Array(
        rows.iter()
            .map(|idx| table.rows()[*idx].get(field).to_json())
            .collect(),
    )
}

/// Distinct values of a field with the rows holding each, in first-seen order
pub(super) struct Groups {
    pub keys: Vec<Value>,
    pub rows: Vec<Vec<usize>>,
}

impl Groups {
    /// A single group holding every row
    pub fn all(table: &Table) -> Self {
        Self {
            keys: vec![Value::Null],
            rows: vec![(0..table.len()).collect()],
        }
    }

    pub fn by(table: &Table, field: &str) -> Self {
        let mut positions: HashMap<KeyAtom, usize> = HashMap::new();
        let mut groups = Groups {
            keys: Vec::new(),
            rows: Vec::new(),
        };
        for (idx, record) in table.rows().iter().enumerate() {
            let value = record.get(field);
            let slot = *positions.entry(value.key()).or_insert_with(|| {
                groups.keys.push(value.clone());
                groups.rows.push(Vec::new());
                groups.keys.len() - 1
            });
            groups.rows[slot].push(idx);
        }
        groups
    }

    /// Group by `field` when present, otherwise one group
    pub fn by_optional(table: &Table, field: Option<&str>) -> Self {
        match field {
            Some(field) => Self::by(table, field),
            None => Self::all(table),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Restrict row indices to those also in `subset`
pub(super) fn intersect(rows: &[usize], subset: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < rows.len() && j < subset.len() {
        match rows[i].cmp(&subset[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(rows[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

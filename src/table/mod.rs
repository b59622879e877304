//! Record/Table data model
//!
//! Row sources normalize everything they return into a [`Table`]: an ordered
//! field list plus an ordered sequence of flat [`Record`]s. Transforms never
//! mutate a table in place; each one builds a new table.
//!
//! Tables may carry [`Annotations`] alongside their rows: a hierarchy path
//! for sunburst charts or the label index of a flow graph.

mod frame;
mod schema;
mod value;

pub use frame::dataframe_to_table;
pub use schema::{FieldSpec, FieldType, Schema};
pub use value::{KeyAtom, Value};

use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static NULL_VALUE: Value = Value::Null;

/// One flat row of named scalar values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Value of `field`; missing fields read as null
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL_VALUE)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Grouping key over `fields`
    pub fn key<S: AsRef<str>>(&self, fields: &[S]) -> Vec<KeyAtom> {
        fields.iter().map(|f| self.get(f.as_ref()).key()).collect()
    }

    pub(crate) fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }
}

/// Hierarchical path annotation consumed by sunburst-style charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyPath {
    /// Coarse-to-fine field names defining the nesting path
    pub fields: Vec<String>,
    /// Numeric field summed up the hierarchy
    pub value: String,
}

/// Schema annotations carried alongside a table's rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<HierarchyPath>,
    /// Deduplicated node labels of a flow edge table, in first-seen order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_labels: Option<Vec<String>>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.flow_labels.is_none()
    }
}

/// Ordered sequence of records sharing a field schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    fields: Vec<String>,
    rows: Vec<Record>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    annotations: Annotations,
}

impl Table {
    /// Create a table from a field list and records
    ///
    /// Fields present in records but missing from `fields` are appended in
    /// sorted order, so the schema always covers every record.
    pub fn new(fields: Vec<String>, rows: Vec<Record>) -> Self {
        let mut fields = fields;
        let mut extra: Vec<String> = rows
            .iter()
            .flat_map(|r| r.field_names())
            .filter(|name| !fields.iter().any(|f| f == name))
            .map(|name| name.to_string())
            .collect();
        extra.sort();
        extra.dedup();
        fields.extend(extra);

        Self {
            fields,
            rows,
            annotations: Annotations::default(),
        }
    }

    /// Create an empty table with the given fields
    pub fn empty<S: AsRef<str>>(fields: &[S]) -> Self {
        Self::new(fields.iter().map(|f| f.as_ref().to_string()).collect(), Vec::new())
    }

    /// Create a table from positional rows
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a row's length differs from the field count.
    pub fn from_values<S: AsRef<str>>(fields: &[S], rows: Vec<Vec<Value>>) -> Result<Self> {
        let names: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        let mut records = Vec::with_capacity(rows.len());
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(StatdashError::ValidationError(format!(
                    "Row {} has {} values, expected {} ({})",
                    idx,
                    row.len(),
                    names.len(),
                    names.join(", ")
                )));
            }
            let mut record = Record::new();
            for (name, value) in names.iter().zip(row) {
                record.insert(name.clone(), value);
            }
            records.push(record);
        }
        Ok(Self::new(names, records))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Values of one field, in row order
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |r| r.get(field))
    }

    /// Check that every field in `required` is part of the schema
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first missing field and the
    /// available fields.
    pub fn require_fields<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        for field in required {
            let field = field.as_ref();
            if !self.has_field(field) {
                return Err(StatdashError::ValidationError(format!(
                    "Field '{}' not found. Available fields: {}",
                    field,
                    self.fields.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// New table with `output` computed per row
    ///
    /// `output` is appended to the schema unless it already exists, in which
    /// case the column is replaced in place. Annotations carry over.
    pub fn derive_field<F>(&self, output: &str, mut f: F) -> Result<Table>
    where
        F: FnMut(&Record) -> Result<Value>,
    {
        let mut fields = self.fields.clone();
        if !fields.iter().any(|name| name == output) {
            fields.push(output.to_string());
        }

        let mut rows = Vec::with_capacity(self.rows.len());
        for record in &self.rows {
            let value = f(record)?;
            let mut next = record.clone();
            next.insert(output, value);
            rows.push(next);
        }

        Ok(Table {
            fields,
            rows,
            annotations: self.annotations.clone(),
        })
    }

    /// New table with the same schema and annotations but different rows
    pub(crate) fn with_rows(&self, rows: Vec<Record>) -> Table {
        Table {
            fields: self.fields.clone(),
            rows,
            annotations: self.annotations.clone(),
        }
    }

    /// Rows as JSON objects, for chart payloads and CLI output
    pub fn to_json_values(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|record| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .fields
                    .iter()
                    .map(|f| (f.clone(), record.get(f).to_json()))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_values(
            &["kommun", "ar", "folkmangd"],
            vec![
                vec!["Falkenberg".into(), "2022".into(), Value::Int(46000)],
                vec!["Varberg".into(), "2022".into(), Value::Int(66000)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_missing_field_reads_null() {
        let record = Record::new().with("a", 1);
        assert!(record.get("b").is_null());
        assert_eq!(record.get("a"), &Value::Int(1));
    }

    #[test]
    fn test_from_values_length_mismatch() {
        let result = Table::from_values(&["a", "b"], vec![vec![Value::Int(1)]]);
        assert!(matches!(result, Err(StatdashError::ValidationError(_))));
    }

    #[test]
    fn test_new_appends_unlisted_fields() {
        let rows = vec![Record::new().with("b", 1).with("a", 2).with("c", 3)];
        let table = Table::new(vec!["c".to_string()], rows);
        assert_eq!(table.fields(), &["c", "a", "b"]);
    }

    #[test]
    fn test_require_fields() {
        let table = sample();
        assert!(table.require_fields(&["kommun", "ar"]).is_ok());
        let err = table.require_fields(&["regso"]).unwrap_err();
        assert!(err.to_string().contains("Field 'regso' not found"));
        assert!(err.to_string().contains("kommun, ar, folkmangd"));
    }

    #[test]
    fn test_derive_field_does_not_mutate_input() {
        let table = sample();
        let derived = table
            .derive_field("tusental", |r| {
                Ok(Value::from_opt(r.get("folkmangd").as_f64().map(|v| v / 1000.0)))
            })
            .unwrap();
        assert!(!table.has_field("tusental"));
        assert_eq!(derived.fields().last().unwrap(), "tusental");
        assert_eq!(derived.rows()[0].get("tusental"), &Value::Float(46.0));
    }

    #[test]
    fn test_to_json_values() {
        let values = sample().to_json_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["kommun"], "Varberg");
        assert_eq!(values[1]["folkmangd"], 66000);
    }
}

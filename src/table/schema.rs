//! Declared schemas and the source → engine boundary check
//!
//! Pages declare the fields they expect from a row source. Checking the
//! fetched table against that declaration turns a silent column-name
//! mismatch into an immediate `ValidationError`.

use super::{Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};

/// Declared type of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Integers, floats or numeric text
    Number,
    Text,
    Bool,
    #[default]
    Any,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::Number => value.as_f64().is_some(),
            FieldType::Text => matches!(value, Value::Text(_)),
            FieldType::Bool => matches!(value, Value::Bool(_)),
        }
    }
}

fn default_nullable() -> bool {
    true
}

/// A named field with a declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Ordered list of field declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a table against the declared fields
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a declared field is missing, a
    /// non-nullable field holds a null, or a value does not match the
    /// declared type.
    pub fn check(&self, table: &Table) -> Result<()> {
        for spec in &self.fields {
            table.require_fields(&[spec.name.as_str()])?;
            for (row_idx, value) in table.column(&spec.name).enumerate() {
                if value.is_null() {
                    if !spec.nullable {
                        return Err(StatdashError::ValidationError(format!(
                            "Field '{}' is null in row {} but declared non-nullable",
                            spec.name, row_idx
                        )));
                    }
                    continue;
                }
                if !spec.kind.accepts(value) {
                    return Err(StatdashError::ValidationError(format!(
                        "Field '{}' row {}: value '{}' does not match declared type {:?}",
                        spec.name, row_idx, value, spec.kind
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check, then convert numeric text in `Number` fields to numbers
    ///
    /// Integral text becomes `Int`, everything else `Float`.
    pub fn coerce(&self, table: &Table) -> Result<Table> {
        self.check(table)?;
        let mut out = table.clone();
        for spec in self.fields.iter().filter(|s| s.kind == FieldType::Number) {
            out = out.derive_field(&spec.name, |record| {
                let value = record.get(&spec.name);
                Ok(match value {
                    Value::Text(s) => {
                        let trimmed = s.trim();
                        match trimmed.parse::<i64>() {
                            Ok(i) => Value::Int(i),
                            Err(_) => Value::from_opt(value.as_f64()),
                        }
                    }
                    other => other.clone(),
                })
            })?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_values(
            &["ar", "regso", "folkmangd"],
            vec![
                vec!["2021".into(), "1382R001".into(), Value::Int(120)],
                vec!["2022".into(), "1382R001".into(), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_check_accepts_numeric_text() {
        let schema = Schema::new(vec![
            FieldSpec::new("ar", FieldType::Number),
            FieldSpec::new("regso", FieldType::Text),
        ]);
        assert!(schema.check(&table()).is_ok());
    }

    #[test]
    fn test_check_missing_field() {
        let schema = Schema::new(vec![FieldSpec::new("kommun", FieldType::Text)]);
        let err = schema.check(&table()).unwrap_err();
        assert!(err.to_string().contains("'kommun' not found"));
    }

    #[test]
    fn test_check_non_nullable() {
        let schema = Schema::new(vec![FieldSpec::new("folkmangd", FieldType::Number).required()]);
        let err = schema.check(&table()).unwrap_err();
        assert!(err.to_string().contains("non-nullable"));
    }

    #[test]
    fn test_check_type_mismatch() {
        let schema = Schema::new(vec![FieldSpec::new("regso", FieldType::Number)]);
        assert!(matches!(
            schema.check(&table()),
            Err(StatdashError::ValidationError(_))
        ));
    }

    #[test]
    fn test_coerce_numeric_text() {
        let schema = Schema::new(vec![FieldSpec::new("ar", FieldType::Number)]);
        let out = schema.coerce(&table()).unwrap();
        assert_eq!(out.rows()[0].get("ar"), &Value::Int(2021));
        assert_eq!(out.rows()[0].get("regso"), &Value::from("1382R001"));
    }

    #[test]
    fn test_deserialize_field_spec() {
        let spec: FieldSpec =
            serde_json::from_str(r#"{"name": "ar", "type": "number"}"#).unwrap();
        assert_eq!(spec.kind, FieldType::Number);
        assert!(spec.nullable);
    }
}

//! Hash joins between two tables

use super::KeyIndex;
use crate::naming::{LEFT_SUFFIX, RIGHT_SUFFIX};
use crate::table::{Record, Table};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Every left row survives; unmatched rows get null right fields
    #[default]
    Left,
    Inner,
}

/// Join `right` onto `left` by equality of the `on` fields
///
/// The right table is indexed once; each left row then probes the index.
/// Duplicate right keys fan out into one output row per match, in right
/// table order. Non-key fields present on both sides get `suffixes`
/// appended (`_x`/`_y` when `None`). Output rows follow left table order.
///
/// # Errors
///
/// Returns `ValidationError` when `on` is empty or a key field is missing
/// from either side.
pub fn join<S: AsRef<str>>(
    left: &Table,
    right: &Table,
    on: &[S],
    how: JoinKind,
    suffixes: Option<(&str, &str)>,
) -> Result<Table> {
    if on.is_empty() {
        return Err(StatdashError::ValidationError(
            "Join needs at least one key field".to_string(),
        ));
    }
    left.require_fields(on)?;
    right.require_fields(on)?;

    let (left_suffix, right_suffix) = suffixes.unwrap_or((LEFT_SUFFIX, RIGHT_SUFFIX));
    let is_key = |field: &str| on.iter().any(|k| k.as_ref() == field);

    // Output names for each side's fields
    let left_names: Vec<(String, String)> = left
        .fields()
        .iter()
        .map(|f| {
            let name = if !is_key(f.as_str()) && right.has_field(f) {
                format!("{}{}", f, left_suffix)
            } else {
                f.clone()
            };
            (f.clone(), name)
        })
        .collect();
    let right_names: Vec<(String, String)> = right
        .fields()
        .iter()
        .filter(|f| !is_key(f.as_str()))
        .map(|f| {
            let name = if left.has_field(f) {
                format!("{}{}", f, right_suffix)
            } else {
                f.clone()
            };
            (f.clone(), name)
        })
        .collect();

    let mut index = KeyIndex::new();
    let mut matches: Vec<Vec<usize>> = Vec::new();
    for (row_idx, record) in right.rows().iter().enumerate() {
        let (slot, is_new) = index.slot(record.key(on));
        if is_new {
            matches.push(Vec::new());
        }
        matches[slot].push(row_idx);
    }

    let mut rows = Vec::with_capacity(left.len());
    for record in left.rows() {
        let mut base = Record::new();
        for (source, name) in &left_names {
            base.insert(name.clone(), record.get(source).clone());
        }

        match index.get(&record.key(on)) {
            Some(slot) => {
                for &right_idx in &matches[slot] {
                    let other = &right.rows()[right_idx];
                    let mut next = base.clone();
                    for (source, name) in &right_names {
                        next.insert(name.clone(), other.get(source).clone());
                    }
                    rows.push(next);
                }
            }
            None if how == JoinKind::Left => {
                let mut next = base;
                for (_, name) in &right_names {
                    next.insert(name.clone(), Default::default());
                }
                rows.push(next);
            }
            None => {}
        }
    }

    let fields: Vec<String> = left_names
        .into_iter()
        .chain(right_names)
        .map(|(_, name)| name)
        .collect();

    tracing::debug!(
        left_rows = left.len(),
        right_rows = right.len(),
        output_rows = rows.len(),
        "join"
    );

    Ok(Table::new(fields, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn population() -> Table {
        Table::from_values(
            &["regso", "ar", "folkmangd"],
            vec![
                vec!["A".into(), "2022".into(), Value::Int(100)],
                vec!["B".into(), "2022".into(), Value::Int(50)],
                vec!["C".into(), "2022".into(), Value::Int(20)],
            ],
        )
        .unwrap()
    }

    fn areas() -> Table {
        Table::from_values(
            &["regso", "kommun", "ar"],
            vec![
                vec!["A".into(), "Falkenberg".into(), "2021".into()],
                vec!["B".into(), "Varberg".into(), "2021".into()],
                vec!["A".into(), "Halmstad".into(), "2021".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_left_join_fans_out_and_suffixes() {
        let out = join(&population(), &areas(), &["regso"], JoinKind::Left, None).unwrap();
        assert_eq!(out.fields(), &["regso", "ar_x", "folkmangd", "kommun", "ar_y"]);
        assert_eq!(out.len(), 4);

        let kommun: Vec<String> = out.column("kommun").map(|v| v.to_string()).collect();
        assert_eq!(kommun, vec!["Falkenberg", "Halmstad", "Varberg", ""]);
        assert_eq!(out.rows()[3].get("regso"), &Value::from("C"));
        assert!(out.rows()[3].get("ar_y").is_null());
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let out = join(
            &population(),
            &areas(),
            &["regso"],
            JoinKind::Inner,
            Some(("", "_omrade")),
        )
        .unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.has_field("ar"));
        assert!(out.has_field("ar_omrade"));
    }

    #[test]
    fn test_join_validation() {
        assert!(join(&population(), &areas(), &[] as &[&str], JoinKind::Left, None).is_err());
        assert!(join(&population(), &areas(), &["folkmangd"], JoinKind::Left, None).is_err());
    }
}

//! Hierarchical path annotation for sunburst-style charts

use crate::naming::PATH_SEPARATOR;
use crate::table::{HierarchyPath, Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attach a hierarchy path annotation to a table
///
/// Passthrough: no row values change. The path fields must exist and every
/// non-null `value` must be numeric-coercible.
///
/// # Errors
///
/// Returns `ValidationError` for an empty path or a missing field and
/// `ParseError` for a non-numeric value.
pub fn build_hierarchy_path<S: AsRef<str>>(table: &Table, path: &[S], value: &str) -> Result<Table> {
    if path.is_empty() {
        return Err(StatdashError::ValidationError(
            "Hierarchy path needs at least one field".to_string(),
        ));
    }
    table.require_fields(path)?;
    table.require_fields(&[value])?;
    for record in table.rows() {
        record.get(value).coerce_f64(value)?;
    }

    let mut annotations = table.annotations().clone();
    annotations.path = Some(HierarchyPath {
        fields: path.iter().map(|f| f.as_ref().to_string()).collect(),
        value: value.to_string(),
    });
    Ok(table.clone().with_annotations(annotations))
}

/// Escape a label for use as one id segment
///
/// Backslashes and separators inside a label are backslash-escaped, so a
/// label containing `/` never reads as a deeper path.
fn id_segment(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        if c == '\\' || PATH_SEPARATOR.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One node of an expanded hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Escaped path segments joined with `/`; unique across the hierarchy
    pub id: String,
    pub label: String,
    /// Id of the parent node; empty for top-level nodes
    pub parent: String,
    /// Sum of the values of every row under this node
    pub value: f64,
    pub depth: usize,
}

impl HierarchyPath {
    /// Expand rows into sunburst nodes
    ///
    /// Nodes appear in first-seen order with parents before children. A null
    /// segment cuts the row's path short; rows with a null value still
    /// create their nodes but add nothing to the sums.
    pub fn nodes(&self, table: &Table) -> Result<Vec<HierarchyNode>> {
        table.require_fields(&self.fields)?;
        table.require_fields(&[self.value.as_str()])?;

        let mut nodes: Vec<HierarchyNode> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in table.rows() {
            let weight = record.get(&self.value).coerce_f64(&self.value)?.unwrap_or(0.0);
            let mut parent = String::new();

            for (depth, field) in self.fields.iter().enumerate() {
                let label = match record.get(field) {
                    Value::Null => break,
                    other => other.to_string(),
                };
                let segment = id_segment(&label);
                let id = if depth == 0 {
                    segment
                } else {
                    format!("{}{}{}", parent, PATH_SEPARATOR, segment)
                };

                let pos = match positions.get(&id) {
                    Some(pos) => *pos,
                    None => {
                        positions.insert(id.clone(), nodes.len());
                        nodes.push(HierarchyNode {
                            id: id.clone(),
                            label,
                            parent: parent.clone(),
                            value: 0.0,
                            depth,
                        });
                        nodes.len() - 1
                    }
                };
                nodes[pos].value += weight;
                parent = id;
            }
        }

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn companies() -> Table {
        Table::from_values(
            &["bransch", "storlek", "anstallda"],
            vec![
                vec!["Handel".into(), "0-9".into(), Value::Int(40)],
                vec!["Handel".into(), "10-49".into(), Value::Int(120)],
                vec!["Bygg".into(), "0-9".into(), Value::Int(30)],
                vec!["Handel".into(), "0-9".into(), Value::Int(5)],
                vec!["Bygg".into(), Value::Null, Value::Int(7)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_hierarchy_path_is_passthrough() {
        let table = companies();
        let out = build_hierarchy_path(&table, &["bransch", "storlek"], "anstallda").unwrap();
        assert_eq!(out.rows(), table.rows());
        let path = out.annotations().path.as_ref().unwrap();
        assert_eq!(path.fields, vec!["bransch", "storlek"]);
        assert_eq!(path.value, "anstallda");
    }

    #[test]
    fn test_build_hierarchy_path_validation() {
        let table = companies();
        assert!(matches!(
            build_hierarchy_path(&table, &["kommun"], "anstallda"),
            Err(StatdashError::ValidationError(_))
        ));
        assert!(matches!(
            build_hierarchy_path(&table, &["bransch"], "storlek"),
            Err(StatdashError::ParseError(_))
        ));
        assert!(build_hierarchy_path(&table, &[] as &[&str], "anstallda").is_err());
    }

    #[test]
    fn test_nodes_sum_up_the_tree() {
        let table = build_hierarchy_path(&companies(), &["bransch", "storlek"], "anstallda").unwrap();
        let nodes = table.annotations().path.as_ref().unwrap().nodes(&table).unwrap();

        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Handel", "Handel/0-9", "Handel/10-49", "Bygg", "Bygg/0-9"]);

        assert_eq!(nodes[0].value, 165.0);
        assert_eq!(nodes[1].value, 45.0);
        assert_eq!(nodes[1].parent, "Handel");
        assert_eq!(nodes[1].depth, 1);
        // Truncated path still counts towards its ancestors
        assert_eq!(nodes[3].value, 37.0);
        assert_eq!(nodes[3].parent, "");
    }

    #[test]
    fn test_separator_in_label_keeps_nodes_apart() {
        let table = Table::from_values(
            &["sektor", "omrade", "kostnad"],
            vec![
                vec!["Vård/omsorg".into(), Value::Null, Value::Int(100)],
                vec!["Vård".into(), "omsorg".into(), Value::Int(5)],
            ],
        )
        .unwrap();
        let table = build_hierarchy_path(&table, &["sektor", "omrade"], "kostnad").unwrap();
        let nodes = table.annotations().path.as_ref().unwrap().nodes(&table).unwrap();

        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Vård\\/omsorg", "Vård", "Vård/omsorg"]);
        assert_eq!(nodes[0].label, "Vård/omsorg");
        assert_eq!(nodes[0].value, 100.0);
        assert_eq!(nodes[0].depth, 0);
        assert_eq!(nodes[1].value, 5.0);
        assert_eq!(nodes[2].parent, "Vård");
        assert_eq!(nodes[2].depth, 1);
    }

    #[test]
    fn test_id_segment_escapes() {
        assert_eq!(id_segment("Handel"), "Handel");
        assert_eq!(id_segment("a/b"), "a\\/b");
        assert_eq!(id_segment("a\\b"), "a\\\\b");
    }
}

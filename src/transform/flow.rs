//! Flow (Sankey) edge lists
//!
//! Each row contributes one edge per adjacent pair of level fields, coarse
//! to fine. Labels are interned into a single index in the order they are
//! first encountered, scanning rows in order and levels left to right, so
//! every edge endpoint is guaranteed to be a valid label index.

use crate::naming;
use crate::table::{Annotations, Record, Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Edge list construction options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowOptions {
    /// Sum values of edges sharing the same (source, target) pair
    #[serde(default)]
    pub merge: bool,
    /// Synthetic root label linked to every level-0 value
    #[serde(default)]
    pub root_label: Option<String>,
    /// Point edges from the finer level to the coarser one
    #[serde(default)]
    pub reverse: bool,
}

/// One weighted edge between two label indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

/// Deduplicated labels plus the edges between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub labels: Vec<String>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    /// Edge table with source/target indices, labels and values
    ///
    /// The label index is attached as an annotation so a renderer can
    /// rebuild the node list, including labels no edge touches.
    pub fn to_table(&self) -> Table {
        let fields = vec![
            naming::FLOW_SOURCE.to_string(),
            naming::FLOW_TARGET.to_string(),
            naming::FLOW_SOURCE_LABEL.to_string(),
            naming::FLOW_TARGET_LABEL.to_string(),
            naming::FLOW_VALUE.to_string(),
        ];
        let rows = self
            .edges
            .iter()
            .map(|edge| {
                Record::new()
                    .with(naming::FLOW_SOURCE, edge.source as i64)
                    .with(naming::FLOW_TARGET, edge.target as i64)
                    .with(naming::FLOW_SOURCE_LABEL, self.labels[edge.source].as_str())
                    .with(naming::FLOW_TARGET_LABEL, self.labels[edge.target].as_str())
                    .with(naming::FLOW_VALUE, edge.value)
            })
            .collect();

        Table::new(fields, rows).with_annotations(Annotations {
            flow_labels: Some(self.labels.clone()),
            ..Annotations::default()
        })
    }
}

#[derive(Default)]
struct LabelIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

impl LabelIndex {
    fn intern(&mut self, label: &str) -> usize {
        if let Some(idx) = self.positions.get(label) {
            return *idx;
        }
        let idx = self.labels.len();
        self.labels.push(label.to_string());
        self.positions.insert(label.to_string(), idx);
        idx
    }
}

/// Build a flow graph from categorical level fields
///
/// # Arguments
///
/// * `table` - Input rows
/// * `levels` - Level fields, coarse to fine
/// * `value` - Numeric weight of each row
/// * `options` - Merging, synthetic root and direction
///
/// Rows with a null weight contribute no edges, and a null label ends the
/// row's chain at the last non-null level.
///
/// # Errors
///
/// Returns `ValidationError` when fewer than two levels are given (one is
/// enough with a root label) or a field is missing, and `ParseError` for a
/// non-numeric weight.
pub fn build_flow_edges<S: AsRef<str>>(
    table: &Table,
    levels: &[S],
    value: &str,
    options: &FlowOptions,
) -> Result<FlowGraph> {
    let required = if options.root_label.is_some() { 1 } else { 2 };
    if levels.len() < required {
        return Err(StatdashError::ValidationError(format!(
            "Flow edges need at least {} level fields, got {}",
            required,
            levels.len()
        )));
    }
    table.require_fields(levels)?;
    table.require_fields(&[value])?;

    let mut index = LabelIndex::default();
    if let Some(root) = &options.root_label {
        index.intern(root);
    }

    let mut edges: Vec<FlowEdge> = Vec::new();
    let mut merged: HashMap<(usize, usize), usize> = HashMap::new();

    for record in table.rows() {
        let Some(weight) = record.get(value).coerce_f64(value)? else {
            continue;
        };

        let mut chain: Vec<usize> = Vec::with_capacity(levels.len() + 1);
        if let Some(root) = &options.root_label {
            chain.push(index.intern(root));
        }
        for level in levels {
            match record.get(level.as_ref()) {
                Value::Null => break,
                label => chain.push(index.intern(&label.to_string())),
            }
        }

        for pair in chain.windows(2) {
            let (source, target) = if options.reverse {
                (pair[1], pair[0])
            } else {
                (pair[0], pair[1])
            };
            if options.merge {
                if let Some(&pos) = merged.get(&(source, target)) {
                    edges[pos].value += weight;
                    continue;
                }
                merged.insert((source, target), edges.len());
            }
            edges.push(FlowEdge {
                source,
                target,
                value: weight,
            });
        }
    }

    tracing::debug!(
        rows = table.len(),
        labels = index.labels.len(),
        edges = edges.len(),
        "build_flow_edges"
    );

    Ok(FlowGraph {
        labels: index.labels,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(graph: &FlowGraph) -> Vec<(usize, usize, f64)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source, e.target, e.value))
            .collect()
    }

    #[test]
    fn test_two_level_edges() {
        let table = Table::from_values(
            &["level0", "level1", "v"],
            vec![
                vec!["Total".into(), "A".into(), Value::Int(5)],
                vec!["Total".into(), "B".into(), Value::Int(3)],
            ],
        )
        .unwrap();

        let graph = build_flow_edges(&table, &["level0", "level1"], "v", &FlowOptions::default()).unwrap();
        assert_eq!(graph.labels, vec!["Total", "A", "B"]);
        assert_eq!(edges(&graph), vec![(0, 1, 5.0), (0, 2, 3.0)]);
    }

    fn costs() -> Table {
        Table::from_values(
            &["niva", "omrade", "kostnad"],
            vec![
                vec!["Vård".into(), "Hemtjänst".into(), Value::Int(10)],
                vec!["Skola".into(), "Grundskola".into(), Value::Int(20)],
                vec!["Vård".into(), "Boende".into(), Value::Int(4)],
                vec!["Vård".into(), "Hemtjänst".into(), Value::Int(1)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_root_label_and_merge() {
        let options = FlowOptions {
            merge: true,
            root_label: Some("Totala kostnader".to_string()),
            reverse: false,
        };
        let graph = build_flow_edges(&costs(), &["niva", "omrade"], "kostnad", &options).unwrap();
        assert_eq!(
            graph.labels,
            vec!["Totala kostnader", "Vård", "Hemtjänst", "Skola", "Grundskola", "Boende"]
        );
        assert_eq!(
            edges(&graph),
            vec![
                (0, 1, 15.0),
                (1, 2, 11.0),
                (0, 3, 20.0),
                (3, 4, 20.0),
                (1, 5, 4.0),
            ]
        );
    }

    #[test]
    fn test_unmerged_edges_are_one_per_row() {
        let graph = build_flow_edges(&costs(), &["niva", "omrade"], "kostnad", &FlowOptions::default()).unwrap();
        assert_eq!(graph.edges.len(), 4);
        let n = graph.labels.len();
        assert!(graph.edges.iter().all(|e| e.source < n && e.target < n));
    }

    #[test]
    fn test_reverse_direction() {
        let options = FlowOptions {
            reverse: true,
            ..FlowOptions::default()
        };
        let graph = build_flow_edges(&costs(), &["niva", "omrade"], "kostnad", &options).unwrap();
        assert_eq!(graph.labels[0], "Vård");
        assert_eq!(edges(&graph)[0], (1, 0, 10.0));
    }

    #[test]
    fn test_null_weight_and_label_skipped() {
        let table = Table::from_values(
            &["a", "b", "v"],
            vec![
                vec!["x".into(), "y".into(), Value::Null],
                vec!["x".into(), Value::Null, Value::Int(2)],
                vec!["x".into(), "z".into(), Value::Int(3)],
            ],
        )
        .unwrap();
        let graph = build_flow_edges(&table, &["a", "b"], "v", &FlowOptions::default()).unwrap();
        assert_eq!(graph.labels, vec!["x", "z"]);
        assert_eq!(edges(&graph), vec![(0, 1, 3.0)]);
    }

    #[test]
    fn test_level_count_validation() {
        let result = build_flow_edges(&costs(), &["niva"], "kostnad", &FlowOptions::default());
        assert!(matches!(result, Err(StatdashError::ValidationError(_))));

        let options = FlowOptions {
            root_label: Some("Alla".to_string()),
            ..FlowOptions::default()
        };
        let graph = build_flow_edges(&costs(), &["niva"], "kostnad", &options).unwrap();
        assert_eq!(graph.labels, vec!["Alla", "Vård", "Skola"]);
    }

    #[test]
    fn test_to_table() {
        let table = build_flow_edges(&costs(), &["niva", "omrade"], "kostnad", &FlowOptions::default())
            .unwrap()
            .to_table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.rows()[0].get(naming::FLOW_SOURCE_LABEL), &Value::from("Vård"));
        assert_eq!(table.rows()[0].get(naming::FLOW_VALUE), &Value::Float(10.0));
        assert_eq!(
            table.annotations().flow_labels.as_ref().map(|l| l.len()),
            Some(5)
        );
    }
}

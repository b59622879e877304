//! Declarative transform plans
//!
//! A plan is an ordered list of steps over a map of named tables. Each step
//! reads one table (`from`, `main` by default) and writes one table (`into`,
//! defaulting to the table it read). Steps run strictly in order; the first
//! error aborts the whole plan.
//!
//! ```json
//! {"steps": [
//!   {"op": "bucket", "field": "alder", "width": 10, "top_open_at": 100, "output": "aldersgrupp"},
//!   {"op": "aggregate", "by": ["aldersgrupp", "ar"],
//!    "aggregates": [{"output": "folkmangd", "source": "folkmangd", "kind": "sum"}]},
//!   {"op": "flow_edges", "from": "kostnader", "into": "sankey",
//!    "levels": ["niva", "omrade"], "value": "kostnad", "root_label": "Totalt"}
//! ]}
//! ```
//!
//! `output` inside a step (`bucket`, `ratio`, `growth_rate`, ...) is always a
//! field name; table names only ever appear under `from` and `into`.

use super::*;
use crate::naming::MAIN_TABLE;
use crate::table::Table;
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

fn default_true() -> bool {
    true
}

fn default_var_name() -> String {
    "variable".to_string()
}

fn default_value_name() -> String {
    "value".to_string()
}

/// One transform operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Aggregate {
        #[serde(default)]
        by: Vec<String>,
        aggregates: Vec<AggregateSpec>,
        /// Sort the groups by key instead of first-seen order
        #[serde(default)]
        sort: bool,
    },
    Bucket(BucketSpec),
    Ratio(RatioSpec),
    Complement {
        field: String,
        total: f64,
        output: String,
    },
    Round {
        field: String,
        #[serde(default)]
        digits: u32,
    },
    GrowthRate(GrowthSpec),
    FlowEdges {
        levels: Vec<String>,
        value: String,
        #[serde(default)]
        merge: bool,
        #[serde(default)]
        root_label: Option<String>,
        #[serde(default)]
        reverse: bool,
    },
    HierarchyPath {
        path: Vec<String>,
        value: String,
    },
    Join {
        /// Name of the right-hand table
        right: String,
        on: Vec<String>,
        #[serde(default)]
        how: JoinKind,
        #[serde(default)]
        suffixes: Option<(String, String)>,
    },
    Melt {
        id_vars: Vec<String>,
        #[serde(default)]
        value_vars: Vec<String>,
        #[serde(default = "default_var_name")]
        var_name: String,
        #[serde(default = "default_value_name")]
        value_name: String,
    },
    Rename {
        mapping: BTreeMap<String, String>,
    },
    Relabel {
        field: String,
        mapping: BTreeMap<String, String>,
        #[serde(default = "default_true")]
        keep_unmapped: bool,
    },
    Filter {
        field: String,
        predicate: Predicate,
    },
    FilterLatest {
        field: String,
    },
    Sort {
        keys: Vec<SortKey>,
    },
    ForwardFill {
        field: String,
    },
    Select {
        fields: Vec<String>,
    },
}

impl Step {
    /// Operation name as written in plan files
    pub fn name(&self) -> &'static str {
        match self {
            Step::Aggregate { .. } => "aggregate",
            Step::Bucket(_) => "bucket",
            Step::Ratio(_) => "ratio",
            Step::Complement { .. } => "complement",
            Step::Round { .. } => "round",
            Step::GrowthRate(_) => "growth_rate",
            Step::FlowEdges { .. } => "flow_edges",
            Step::HierarchyPath { .. } => "hierarchy_path",
            Step::Join { .. } => "join",
            Step::Melt { .. } => "melt",
            Step::Rename { .. } => "rename",
            Step::Relabel { .. } => "relabel",
            Step::Filter { .. } => "filter",
            Step::FilterLatest { .. } => "filter_latest",
            Step::Sort { .. } => "sort",
            Step::ForwardFill { .. } => "forward_fill",
            Step::Select { .. } => "select",
        }
    }

    /// Apply the operation to `table`, looking up any secondary table in `tables`
    pub fn apply(&self, table: &Table, tables: &HashMap<String, Table>) -> Result<Table> {
        match self {
            Step::Aggregate { by, aggregates, sort } => {
                let grouped = aggregate(table, by, aggregates)?;
                if *sort {
                    let keys: Vec<SortKey> = by.iter().map(SortKey::asc).collect();
                    super::sort(&grouped, &keys)
                } else {
                    Ok(grouped)
                }
            }
            Step::Bucket(spec) => bucket(table, spec),
            Step::Ratio(spec) => ratio(table, spec),
            Step::Complement { field, total, output } => complement(table, field, *total, output),
            Step::Round { field, digits } => round(table, field, *digits),
            Step::GrowthRate(spec) => growth_rate(table, spec),
            Step::FlowEdges {
                levels,
                value,
                merge,
                root_label,
                reverse,
            } => {
                let options = FlowOptions {
                    merge: *merge,
                    root_label: root_label.clone(),
                    reverse: *reverse,
                };
                Ok(build_flow_edges(table, levels, value, &options)?.to_table())
            }
            Step::HierarchyPath { path, value } => build_hierarchy_path(table, path, value),
            Step::Join {
                right,
                on,
                how,
                suffixes,
            } => {
                let other = tables.get(right).ok_or_else(|| {
                    StatdashError::ValidationError(format!("Join table '{}' not found", right))
                })?;
                let suffixes = suffixes.as_ref().map(|(l, r)| (l.as_str(), r.as_str()));
                join(table, other, on, *how, suffixes)
            }
            Step::Melt {
                id_vars,
                value_vars,
                var_name,
                value_name,
            } => melt(table, id_vars, value_vars, var_name, value_name),
            Step::Rename { mapping } => rename(table, mapping),
            Step::Relabel {
                field,
                mapping,
                keep_unmapped,
            } => relabel(table, field, mapping, *keep_unmapped),
            Step::Filter { field, predicate } => filter(table, field, predicate),
            Step::FilterLatest { field } => filter_latest(table, field),
            Step::Sort { keys } => super::sort(table, keys),
            Step::ForwardFill { field } => forward_fill(table, field),
            Step::Select { fields } => select(table, fields),
        }
    }
}

/// A step plus the tables it reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(rename = "into", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(flatten)]
    pub op: Step,
}

impl PlanStep {
    pub fn new(op: Step) -> Self {
        Self {
            input: None,
            output: None,
            op,
        }
    }

    pub fn reading(mut self, table: impl Into<String>) -> Self {
        self.input = Some(table.into());
        self
    }

    pub fn writing(mut self, table: impl Into<String>) -> Self {
        self.output = Some(table.into());
        self
    }

    pub fn input_name(&self) -> &str {
        self.input.as_deref().unwrap_or(MAIN_TABLE)
    }

    pub fn output_name(&self) -> &str {
        self.output.as_deref().unwrap_or_else(|| self.input_name())
    }
}

/// Ordered list of transform steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Parse a plan from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that every table a step reads exists by the time it runs
    ///
    /// # Arguments
    ///
    /// * `available` - Table names provided before the first step runs
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first step that reads an
    /// undefined table.
    pub fn validate<S: AsRef<str>>(&self, available: &[S]) -> Result<()> {
        let mut defined: HashSet<String> = available.iter().map(|s| s.as_ref().to_string()).collect();

        for (idx, step) in self.steps.iter().enumerate() {
            let mut reads = vec![step.input_name()];
            if let Step::Join { right, .. } = &step.op {
                reads.push(right.as_str());
            }
            for name in reads {
                if !defined.contains(name) {
                    return Err(StatdashError::ValidationError(format!(
                        "Step {} ({}) reads table '{}', which is not defined at that point",
                        idx,
                        step.op.name(),
                        name
                    )));
                }
            }
            defined.insert(step.output_name().to_string());
        }
        Ok(())
    }

    /// Run every step in order
    ///
    /// Input tables are never modified; the returned map holds the inputs
    /// plus every table written by a step, later writes replacing earlier
    /// ones under the same name.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a step, or `ValidationError` when a
    /// step reads an undefined table.
    pub fn execute(&self, tables: HashMap<String, Table>) -> Result<HashMap<String, Table>> {
        let mut tables = tables;

        for (idx, step) in self.steps.iter().enumerate() {
            let input = tables.get(step.input_name()).ok_or_else(|| {
                StatdashError::ValidationError(format!(
                    "Step {} ({}) reads table '{}', which is not defined",
                    idx,
                    step.op.name(),
                    step.input_name()
                ))
            })?;

            let output = step.op.apply(input, &tables)?;
            tracing::debug!(
                step = idx,
                op = step.op.name(),
                input = step.input_name(),
                output = step.output_name(),
                rows = output.len(),
                "plan step"
            );
            tables.insert(step.output_name().to_string(), output);
        }

        Ok(tables)
    }
}

//! Reshape/derive engine
//!
//! Every transform is a pure `&Table -> Result<Table>` function. The
//! [`Plan`] type strings them together as named steps over a map of named
//! tables, the way a dashboard page declares its data preparation.

mod aggregate;
mod bucket;
mod derive;
mod flow;
mod growth;
mod hierarchy;
mod join;
mod plan;
mod reshape;

pub use aggregate::{aggregate, AggregateKind, AggregateSpec};
pub use bucket::{bucket, BucketSpec};
pub use derive::{complement, ratio, round, RatioSpec};
pub use flow::{build_flow_edges, FlowEdge, FlowGraph, FlowOptions};
pub use growth::{compute_cagr, growth_rate, GrowthMode, GrowthSpec};
pub use hierarchy::{build_hierarchy_path, HierarchyNode};
pub use join::{join, JoinKind};
pub use plan::{Plan, PlanStep, Step};
pub use reshape::{
    filter, filter_latest, forward_fill, melt, relabel, rename, select, sort, Predicate, SortKey,
};

use crate::table::KeyAtom;
use std::collections::HashMap;

/// Maps grouping keys to dense slot numbers in first-seen order
#[derive(Debug, Default)]
pub(crate) struct KeyIndex {
    slots: HashMap<Vec<KeyAtom>, usize>,
}

impl KeyIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Slot for `key`, and whether it was just allocated
    pub(crate) fn slot(&mut self, key: Vec<KeyAtom>) -> (usize, bool) {
        let next = self.slots.len();
        match self.slots.entry(key) {
            std::collections::hash_map::Entry::Occupied(e) => (*e.get(), false),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(next);
                (next, true)
            }
        }
    }

    /// Slot for `key` if it has been seen
    pub(crate) fn get(&self, key: &[KeyAtom]) -> Option<usize> {
        self.slots.get(key).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

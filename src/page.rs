//! Dashboard pages
//!
//! A page names its source requests, the plan that reshapes them, and the
//! charts drawn from the resulting tables. Running a page is one linear
//! pass: fetch → check → plan → render. Any error aborts the whole page.

use crate::reader::{RowSource, SourceRequest};
use crate::table::{Schema, Table};
use crate::transform::Plan;
use crate::writer::{ChartHandle, ChartKind, Encoding, Writer};
use crate::{naming, Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

fn default_chart_table() -> String {
    naming::MAIN_TABLE.to_string()
}

/// One chart on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub name: String,
    /// Table the chart is drawn from
    #[serde(default = "default_chart_table")]
    pub table: String,
    pub kind: ChartKind,
    #[serde(default)]
    pub encoding: Encoding,
}

/// Declarative description of a dashboard page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Source requests keyed by the table name they populate
    #[serde(default)]
    pub sources: BTreeMap<String, SourceRequest>,
    /// Declared schemas, keyed by source table name
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

impl PageSpec {
    /// Parse a page from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the page without fetching anything
    ///
    /// The plan must only read tables defined by a source or an earlier
    /// step, schemas must belong to a source, and every chart must draw
    /// from a defined table with an encoding the writer accepts.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for undefined tables and the writer's
    /// `EncodingError` for incomplete encodings.
    pub fn validate<W: Writer + ?Sized>(&self, writer: &W) -> Result<()> {
        let source_names: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        self.plan.validate(&source_names)?;

        for name in self.schemas.keys() {
            if !self.sources.contains_key(name) {
                return Err(StatdashError::ValidationError(format!(
                    "Page '{}' declares a schema for '{}', which is not a source",
                    self.name, name
                )));
            }
        }

        let mut defined: HashSet<&str> = source_names.into_iter().collect();
        defined.extend(self.plan.steps.iter().map(|s| s.output_name()));

        for chart in &self.charts {
            if !defined.contains(chart.table.as_str()) {
                return Err(StatdashError::ValidationError(format!(
                    "Chart '{}' draws from table '{}', which the page never defines",
                    chart.name, chart.table
                )));
            }
            writer.validate(chart.kind, &chart.encoding)?;
        }
        Ok(())
    }
}

/// A rendered chart with its page-level name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedChart {
    pub name: String,
    #[serde(flatten)]
    pub chart: ChartHandle,
}

/// Everything a page run produces
#[derive(Debug, Clone, Serialize)]
pub struct PageOutput {
    pub name: String,
    pub title: Option<String>,
    /// Source tables plus every table written by the plan
    #[serde(skip)]
    pub tables: HashMap<String, Table>,
    pub charts: Vec<NamedChart>,
}

impl PageOutput {
    pub fn chart(&self, name: &str) -> Option<&ChartHandle> {
        self.charts.iter().find(|c| c.name == name).map(|c| &c.chart)
    }
}

/// Run one page end to end
///
/// # Arguments
///
/// * `source` - Row source serving every request of the page
/// * `page` - The page to run
/// * `writer` - Chart writer
///
/// # Errors
///
/// Returns the first error from fetching, schema checks, the plan or chart
/// rendering. No partial output is produced.
pub fn run_page<R, W>(source: &R, page: &PageSpec, writer: &W) -> Result<PageOutput>
where
    R: RowSource + ?Sized,
    W: Writer + ?Sized,
{
    tracing::info!(page = %page.name, sources = page.sources.len(), "running page");
    page.validate(writer)?;

    let mut tables = HashMap::with_capacity(page.sources.len());
    for (name, request) in &page.sources {
        let mut table = source.fetch(request)?;
        if let Some(schema) = page.schemas.get(name) {
            table = schema.coerce(&table)?;
        }
        tracing::info!(page = %page.name, table = %name, kind = request.kind(), rows = table.len(), "fetched");
        tables.insert(name.clone(), table);
    }

    let tables = page.plan.execute(tables)?;

    let mut charts = Vec::with_capacity(page.charts.len());
    for spec in &page.charts {
        let table = tables.get(&spec.table).ok_or_else(|| {
            StatdashError::ValidationError(format!(
                "Chart '{}' draws from table '{}', which was not produced",
                spec.name, spec.table
            ))
        })?;
        let chart = writer.render(table, spec.kind, &spec.encoding)?;
        charts.push(NamedChart {
            name: spec.name.clone(),
            chart,
        });
    }

    Ok(PageOutput {
        name: page.name.clone(),
        title: page.title.clone(),
        tables,
        charts,
    })
}

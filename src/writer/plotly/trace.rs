//! Trace builders per chart kind
//!
//! Each chart kind has a renderer that turns a subset of table rows into
//! Plotly traces. Cartesian renderers emit one trace per color group;
//! hierarchy and flow renderers emit a single trace.

use super::encoding::{column, intersect, Groups};
use crate::naming;
use crate::table::{HierarchyPath, Table};
use crate::writer::{ChartKind, Encoding, Orientation};
use crate::{Result, StatdashError};
use serde_json::{json, Map, Value as Json};

/// Trait for chart-kind specific trace construction
pub(super) trait TraceRenderer {
    /// Build the traces for `rows`
    ///
    /// `colors` holds the color groups of the whole table, so every frame of
    /// an animation gets the same trace list.
    fn traces(&self, table: &Table, encoding: &Encoding, rows: &[usize], colors: &Groups) -> Result<Vec<Json>>;

    /// Axis titles and other kind-specific layout entries
    fn layout(&self, _encoding: &Encoding, _layout: &mut Map<String, Json>) {}
}

/// Bar, line, scatter and area charts
pub(super) struct CartesianRenderer {
    kind: ChartKind,
}

impl CartesianRenderer {
    fn base_trace(&self, encoding: &Encoding) -> Map<String, Json> {
        let mut trace = Map::new();
        match self.kind {
            ChartKind::Bar => {
                trace.insert("type".into(), json!("bar"));
                if encoding.orientation == Some(Orientation::Horizontal) {
                    trace.insert("orientation".into(), json!("h"));
                }
            }
            ChartKind::Line => {
                trace.insert("type".into(), json!("scatter"));
                trace.insert("mode".into(), json!("lines"));
            }
            ChartKind::Area => {
                trace.insert("type".into(), json!("scatter"));
                trace.insert("mode".into(), json!("lines"));
                trace.insert("stackgroup".into(), json!("one"));
            }
            _ => {
                trace.insert("type".into(), json!("scatter"));
                trace.insert("mode".into(), json!("markers"));
            }
        }
        trace
    }
}

impl TraceRenderer for CartesianRenderer {
    fn traces(&self, table: &Table, encoding: &Encoding, rows: &[usize], colors: &Groups) -> Result<Vec<Json>> {
        let (Some(x), Some(y)) = (&encoding.x, &encoding.y) else {
            return Err(StatdashError::EncodingError(format!(
                "{:?} chart requires both 'x' and 'y'",
                self.kind
            )));
        };

        let mut traces = Vec::with_capacity(colors.len());
        for (key, group_rows) in colors.keys.iter().zip(&colors.rows) {
            let selected = intersect(group_rows, rows);
            let mut trace = self.base_trace(encoding);
            trace.insert("x".into(), column(table, x, &selected));
            trace.insert("y".into(), column(table, y, &selected));

            if encoding.color.is_some() {
                let name = key.to_string();
                trace.insert("name".into(), json!(name));
                trace.insert("legendgroup".into(), json!(name));
                trace.insert("showlegend".into(), json!(true));
            }
            if let Some(text) = &encoding.text {
                trace.insert("text".into(), column(table, text, &selected));
            }
            if let Some(size) = &encoding.size {
                trace.insert("marker".into(), json!({"size": column(table, size, &selected)}));
            }
            traces.push(Json::Object(trace));
        }
        Ok(traces)
    }

    fn layout(&self, encoding: &Encoding, layout: &mut Map<String, Json>) {
        if let Some(x) = &encoding.x {
            layout.insert("xaxis".into(), json!({"title": {"text": encoding.label_for(x)}}));
        }
        if let Some(y) = &encoding.y {
            layout.insert("yaxis".into(), json!({"title": {"text": encoding.label_for(y)}}));
        }
        if let Some(color) = &encoding.color {
            layout.insert("legend".into(), json!({"title": {"text": encoding.label_for(color)}}));
        }
        if self.kind == ChartKind::Bar && encoding.color.is_some() {
            layout.insert("barmode".into(), json!("group"));
        }
    }
}

/// Sunburst charts from a hierarchy path
pub(super) struct SunburstRenderer;

impl TraceRenderer for SunburstRenderer {
    fn traces(&self, table: &Table, encoding: &Encoding, rows: &[usize], _colors: &Groups) -> Result<Vec<Json>> {
        let path = match (&encoding.value, table.annotations().path.as_ref()) {
            (Some(value), _) if !encoding.path.is_empty() => HierarchyPath {
                fields: encoding.path.clone(),
                value: value.clone(),
            },
            (_, Some(path)) => path.clone(),
            _ => {
                return Err(StatdashError::EncodingError(
                    "Sunburst chart needs 'path' and 'value' or a table with a hierarchy path"
                        .to_string(),
                ))
            }
        };

        let subset = table.with_rows(rows.iter().map(|idx| table.rows()[*idx].clone()).collect());
        let nodes = path
            .nodes(&subset)
            .map_err(|e| StatdashError::EncodingError(e.to_string()))?;

        Ok(vec![json!({
            "type": "sunburst",
            "ids": nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            "labels": nodes.iter().map(|n| n.label.as_str()).collect::<Vec<_>>(),
            "parents": nodes.iter().map(|n| n.parent.as_str()).collect::<Vec<_>>(),
            "values": nodes.iter().map(|n| n.value).collect::<Vec<_>>(),
            "branchvalues": "total",
        })])
    }
}

/// Sankey charts from a flow edge table
pub(super) struct SankeyRenderer;

impl SankeyRenderer {
    /// Node labels from the annotation, or rebuilt from the label columns
    ///
    /// Every edge names at most two nodes, so a rebuilt node index must stay
    /// below twice the row count.
    fn labels(table: &Table) -> Result<Vec<String>> {
        if let Some(labels) = &table.annotations().flow_labels {
            return Ok(labels.clone());
        }
        let limit = table.len().saturating_mul(2);
        let mut labels: Vec<String> = Vec::new();
        for record in table.rows() {
            for (index_field, label_field) in [
                (naming::FLOW_SOURCE, naming::FLOW_SOURCE_LABEL),
                (naming::FLOW_TARGET, naming::FLOW_TARGET_LABEL),
            ] {
                let Some(raw) = record.get(index_field).as_f64() else {
                    continue;
                };
                if raw < 0.0 || raw.fract() != 0.0 || raw >= limit as f64 {
                    return Err(StatdashError::EncodingError(format!(
                        "Field '{}': {} is not a node index of this {}-edge table",
                        index_field,
                        raw,
                        table.len()
                    )));
                }
                let idx = raw as usize;
                if labels.len() <= idx {
                    labels.resize(idx + 1, String::new());
                }
                labels[idx] = record.get(label_field).to_string();
            }
        }
        Ok(labels)
    }
}

impl TraceRenderer for SankeyRenderer {
    fn traces(&self, table: &Table, _encoding: &Encoding, rows: &[usize], _colors: &Groups) -> Result<Vec<Json>> {
        for field in [naming::FLOW_SOURCE, naming::FLOW_TARGET, naming::FLOW_VALUE] {
            if !table.has_field(field) {
                return Err(StatdashError::EncodingError(format!(
                    "Sankey chart needs a flow edge table; field '{}' is missing",
                    field
                )));
            }
        }

        Ok(vec![json!({
            "type": "sankey",
            "node": {
                "pad": 20,
                "thickness": 20,
                "line": {"color": "black", "width": 0.5},
                "label": Self::labels(table)?,
            },
            "link": {
                "source": column(table, naming::FLOW_SOURCE, rows),
                "target": column(table, naming::FLOW_TARGET, rows),
                "value": column(table, naming::FLOW_VALUE, rows),
            },
        })])
    }
}

/// Get the renderer for a chart kind
pub(super) fn get_renderer(kind: ChartKind) -> Box<dyn TraceRenderer> {
    match kind {
        ChartKind::Sunburst => Box::new(SunburstRenderer),
        ChartKind::Sankey => Box::new(SankeyRenderer),
        _ => Box::new(CartesianRenderer { kind }),
    }
}

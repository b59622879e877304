//! Plotly figure writer implementation
//!
//! Converts chart-ready tables into Plotly figure JSON (`data`, `layout`,
//! and `frames` for animated charts). The JSON can be handed to plotly.js
//! as-is.
//!
//! # Mapping
//!
//! - Cartesian kinds → one trace per `color` group
//! - Sunburst → `ids`/`labels`/`parents`/`values` from a hierarchy path
//! - Sankey → nodes from the flow label index, links from the edge table
//! - `animation_key` → one frame per distinct value, plus a slider and
//!   play/pause buttons

mod encoding;
mod trace;

use crate::table::Table;
use crate::writer::{ChartHandle, ChartKind, Encoding, Writer};
use crate::Result;
use encoding::{check_channels, check_fields, Groups};
use serde_json::{json, Map, Value as Json};
use trace::get_renderer;

/// Milliseconds each animation frame is shown
const FRAME_DURATION_MS: u64 = 500;

/// Plotly figure writer
pub struct PlotlyWriter {
    /// Plotly schema version recorded in the layout metadata
    schema: String,
}

impl PlotlyWriter {
    pub fn new() -> Self {
        Self {
            schema: "plotly.js/2".to_string(),
        }
    }

    fn layout(&self, kind: ChartKind, encoding: &Encoding) -> Map<String, Json> {
        let mut layout = Map::new();
        if let Some(title) = &encoding.title {
            layout.insert("title".into(), json!({"text": title}));
        }
        layout.insert("meta".into(), json!({"schema": self.schema}));
        get_renderer(kind).layout(encoding, &mut layout);
        layout
    }

    /// Slider and play/pause buttons stepping through `frame_names`
    fn animation_controls(field: &str, frame_names: &[String], layout: &mut Map<String, Json>) {
        let frame_args = |names: Json, duration: u64| {
            json!([names, {
                "mode": "immediate",
                "frame": {"duration": duration, "redraw": true},
                "transition": {"duration": 0},
            }])
        };

        let steps: Vec<Json> = frame_names
            .iter()
            .map(|name| {
                json!({
                    "label": name,
                    "method": "animate",
                    "args": frame_args(json!([name]), 0),
                })
            })
            .collect();

        layout.insert(
            "sliders".into(),
            json!([{
                "active": 0,
                "currentvalue": {"prefix": format!("{}=", field)},
                "steps": steps,
            }]),
        );
        layout.insert(
            "updatemenus".into(),
            json!([{
                "type": "buttons",
                "showactive": false,
                "buttons": [
                    {"label": "▶", "method": "animate", "args": frame_args(Json::Null, FRAME_DURATION_MS)},
                    {"label": "◼", "method": "animate", "args": frame_args(json!([null]), 0)},
                ],
            }]),
        );
    }
}

impl Default for PlotlyWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for PlotlyWriter {
    fn render(&self, table: &Table, kind: ChartKind, encoding: &Encoding) -> Result<ChartHandle> {
        check_channels(kind, encoding)?;
        check_fields(table, encoding)?;

        let renderer = get_renderer(kind);
        let colors = if kind.is_cartesian() {
            Groups::by_optional(table, encoding.color.as_deref())
        } else {
            Groups::all(table)
        };
        let mut layout = self.layout(kind, encoding);

        let mut figure = Map::new();
        match &encoding.animation_key {
            Some(field) if !table.is_empty() => {
                let frames = Groups::by(table, field);
                let mut frame_names = Vec::with_capacity(frames.len());
                let mut frame_specs = Vec::with_capacity(frames.len());
                for (key, rows) in frames.keys.iter().zip(&frames.rows) {
                    let name = key.to_string();
                    let data = renderer.traces(table, encoding, rows, &colors)?;
                    frame_specs.push(json!({"name": name, "data": data}));
                    frame_names.push(name);
                }
                tracing::debug!(frames = frame_specs.len(), %field, "animated chart");

                // Initial state is the first frame
                let initial = frame_specs
                    .first()
                    .map(|frame| frame["data"].clone())
                    .unwrap_or_else(|| json!([]));
                Self::animation_controls(field, &frame_names, &mut layout);
                figure.insert("data".into(), initial);
                figure.insert("frames".into(), Json::Array(frame_specs));
            }
            _ if table.is_empty() => {
                figure.insert("data".into(), json!([]));
            }
            _ => {
                let rows: Vec<usize> = (0..table.len()).collect();
                figure.insert("data".into(), Json::Array(renderer.traces(table, encoding, &rows, &colors)?));
            }
        }
        figure.insert("layout".into(), Json::Object(layout));

        Ok(ChartHandle {
            kind,
            spec: Json::Object(figure),
        })
    }

    fn validate(&self, kind: ChartKind, encoding: &Encoding) -> Result<()> {
        check_channels(kind, encoding)
    }
}

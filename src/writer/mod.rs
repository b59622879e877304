//! Chart output abstraction layer for statdash
//!
//! The writer module provides a pluggable interface for turning a chart-ready
//! [`Table`] plus a visual [`Encoding`] into a chart specification.
//!
//! # Architecture
//!
//! All writers implement the `Writer` trait, which provides:
//! - Table + chart kind + encoding → chart specification
//! - Validation of an encoding against a chart kind before any data exists
//!
//! # Example
//!
//! ```rust,ignore
//! use statdash::writer::{ChartKind, Encoding, PlotlyWriter, Writer};
//!
//! let writer = PlotlyWriter::new();
//! let chart = writer.render(&table, ChartKind::Bar, &Encoding::xy("ar", "folkmangd"))?;
//! println!("{}", chart.to_json_string()?);
//! ```

use crate::table::Table;
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod plotly;

pub use plotly::PlotlyWriter;

/// Chart type selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Area,
    Sunburst,
    Sankey,
}

impl ChartKind {
    /// Kinds drawn on x/y axes
    pub fn is_cartesian(self) -> bool {
        matches!(
            self,
            ChartKind::Bar | ChartKind::Line | ChartKind::Scatter | ChartKind::Area
        )
    }
}

/// Bar orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    #[serde(rename = "v")]
    Vertical,
    #[serde(rename = "h")]
    Horizontal,
}

/// Mapping from table fields to visual channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// One trace per distinct value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// One animation frame per distinct value
    #[serde(default, alias = "animation_frame", skip_serializing_if = "Option::is_none")]
    pub animation_key: Option<String>,
    /// Sunburst path fields, coarse to fine; falls back to the table's path annotation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Sunburst value field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display names for fields, used for axis and legend titles
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Encoding {
    pub fn xy(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: Some(x.into()),
            y: Some(y.into()),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, field: impl Into<String>) -> Self {
        self.color = Some(field.into());
        self
    }

    pub fn with_animation(mut self, field: impl Into<String>) -> Self {
        self.animation_key = Some(field.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_label(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(field.into(), label.into());
        self
    }

    /// Display name of a field
    pub fn label_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.labels.get(field).map(|s| s.as_str()).unwrap_or(field)
    }

    /// Every field referenced by the encoding, in channel order
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = [
            &self.x,
            &self.y,
            &self.color,
            &self.size,
            &self.text,
            &self.animation_key,
        ]
        .into_iter()
        .flatten()
        .map(|s| s.as_str())
        .collect();
        fields.extend(self.path.iter().map(|s| s.as_str()));
        fields.extend(self.value.as_deref());
        fields
    }
}

/// A rendered chart specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartHandle {
    pub kind: ChartKind,
    /// Writer-specific chart document
    pub spec: serde_json::Value,
}

impl ChartHandle {
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.spec)
            .map_err(|e| StatdashError::InternalError(format!("Failed to serialize chart: {}", e)))
    }
}

/// Trait for chart writers
///
/// Writers take a chart-ready table and produce a chart specification. They
/// must tolerate nulls in plotted series (rendered as gaps).
pub trait Writer {
    /// Render one chart
    ///
    /// # Arguments
    ///
    /// * `table` - Chart-ready rows
    /// * `kind` - Chart type
    /// * `encoding` - Field to channel mapping
    ///
    /// # Errors
    ///
    /// Returns `StatdashError::EncodingError` if:
    /// - The encoding lacks a channel the chart kind requires
    /// - An encoded field is missing from the table
    fn render(&self, table: &Table, kind: ChartKind, encoding: &Encoding) -> Result<ChartHandle>;

    /// Validate that an encoding is complete for a chart kind
    ///
    /// Checks whether the chart can be rendered by this writer without
    /// looking at any data.
    fn validate(&self, kind: ChartKind, encoding: &Encoding) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encoding_deserialize() {
        let encoding: Encoding = serde_json::from_value(json!({
            "x": "folkmangd",
            "y": "aldersgrupp",
            "animation_frame": "ar",
            "orientation": "h",
            "labels": {"folkmangd": "Folkmängd"}
        }))
        .unwrap();
        assert_eq!(encoding.animation_key.as_deref(), Some("ar"));
        assert_eq!(encoding.orientation, Some(Orientation::Horizontal));
        assert_eq!(encoding.label_for("folkmangd"), "Folkmängd");
        assert_eq!(encoding.label_for("ar"), "ar");
    }

    #[test]
    fn test_encoding_fields() {
        let encoding = Encoding::xy("ar", "folkmangd")
            .with_color("kon")
            .with_animation("region");
        assert_eq!(encoding.fields(), vec!["ar", "folkmangd", "kon", "region"]);
    }

    #[test]
    fn test_chart_kind_serde() {
        let kind: ChartKind = serde_json::from_value(json!("sankey")).unwrap();
        assert_eq!(kind, ChartKind::Sankey);
        assert!(!kind.is_cartesian());
        assert!(ChartKind::Area.is_cartesian());
    }
}

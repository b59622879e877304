/*!
# statdash - statistics dashboard data engine

Turns statistical query results into chart-ready tables and chart specifications.

## Example

```rust,ignore
use statdash::reader::{DuckDBReader, RowSource, SourceRequest};
use statdash::transform::{aggregate, AggregateKind, AggregateSpec};
use statdash::writer::{ChartKind, Encoding, PlotlyWriter, Writer};

let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
let table = reader.fetch(&SourceRequest::sql("SELECT ar, alder, folkmangd FROM befolkning"))?;

let per_year = aggregate(
    &table,
    &["ar"],
    &[AggregateSpec::new("folkmangd", "folkmangd", AggregateKind::Sum)],
)?;

let chart = PlotlyWriter::new().render(
    &per_year,
    ChartKind::Bar,
    &Encoding::xy("ar", "folkmangd"),
)?;
println!("{}", chart.to_json_string()?);
```

## Architecture

Each dashboard page is a straight line:
- **Row source** → a warehouse query (DuckDB) or a PxWeb statistics API request,
  normalized into a [`Table`]
- **Transform plan** → pure `Table -> Table` steps (aggregate, bucket, ratio,
  growth rate, flow edges, hierarchy paths, joins, ...)
- **Writer** → Plotly figure JSON for each chart on the page

## Core Components

- [`table`] - Record/Table model, schema checks, polars conversion
- [`transform`] - Reshape/derive engine and declarative plans
- [`reader`] - Row source abstraction layer
- [`writer`] - Chart output abstraction layer
- [`page`] - Page specs tying sources, plans and charts together
- [`config`] - Dashboard configuration
*/

pub mod config;
pub mod naming;
pub mod page;
pub mod reader;
pub mod table;
pub mod transform;
pub mod writer;

// Re-export key types for convenience
pub use page::{run_page, PageOutput, PageSpec};
pub use table::{FieldSpec, FieldType, Record, Schema, Table, Value};
pub use transform::Plan;

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum StatdashError {
    /// Row fetch failed (network, authentication, malformed payload)
    #[error("Source error: {0}")]
    SourceError(String),

    /// A value expected to be numeric-coercible was not
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A mathematical precondition was violated with no sensible degraded output
    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The table shape does not match the chart encoding
    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, StatdashError>;

impl From<serde_json::Error> for StatdashError {
    fn from(err: serde_json::Error) -> Self {
        StatdashError::ParseError(format!("JSON: {}", err))
    }
}

impl From<polars::prelude::PolarsError> for StatdashError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        StatdashError::InternalError(format!("Polars: {}", err))
    }
}

#[cfg(feature = "duckdb")]
impl From<duckdb::Error> for StatdashError {
    fn from(err: duckdb::Error) -> Self {
        StatdashError::SourceError(format!("DuckDB: {}", err))
    }
}

#[cfg(feature = "pxweb")]
impl From<reqwest::Error> for StatdashError {
    fn from(err: reqwest::Error) -> Self {
        StatdashError::SourceError(format!("HTTP: {}", err))
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

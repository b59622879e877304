//! Row source abstraction layer for statdash
//!
//! The reader module provides a pluggable interface for fetching rows from
//! the places dashboard pages get their data and normalizing them into
//! [`Table`]s for the transform engine.
//!
//! # Architecture
//!
//! All sources implement the [`RowSource`] trait, which provides:
//! - Request execution → [`Table`] conversion
//! - Uniform error reporting (`SourceError`)
//!
//! [`Sources`] dispatches each request kind to the source configured for it,
//! and [`CachedSource`] memoizes identical requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use statdash::reader::{DuckDBReader, RowSource, SourceRequest};
//!
//! let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
//! let table = reader.fetch(&SourceRequest::sql("SELECT * FROM befolkning"))?;
//! ```

use crate::table::Table;
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb")]
pub mod duckdb;

pub mod cache;
pub mod connection;
pub mod pxweb;

#[cfg(feature = "duckdb")]
pub use duckdb::DuckDBReader;

pub use cache::CachedSource;
#[cfg(feature = "pxweb")]
pub use pxweb::PxWebClient;
pub use pxweb::{normalize_response, PxWebConfig};

/// One fetch against a row source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRequest {
    /// SQL query against the warehouse
    Sql { query: String },
    /// Table query against a PxWeb statistics API
    #[serde(rename = "pxweb")]
    PxWeb {
        /// Table path relative to the API base URL, e.g. `"BE/BE0101/BE0101A/BefolkningNy"`
        table: String,
        /// PxWeb query body (`{"query": [...], "response": {"format": "json"}}`)
        query: serde_json::Value,
    },
    /// Local CSV/Parquet/JSON file, read through the warehouse
    File {
        path: String,
        /// Marker read as null, e.g. `"-"` or `".."`
        #[serde(default)]
        null_marker: Option<String>,
    },
}

impl SourceRequest {
    pub fn sql(query: impl Into<String>) -> Self {
        SourceRequest::Sql {
            query: query.into(),
        }
    }

    pub fn pxweb(table: impl Into<String>, query: serde_json::Value) -> Self {
        SourceRequest::PxWeb {
            table: table.into(),
            query,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        SourceRequest::File {
            path: path.into(),
            null_marker: None,
        }
    }

    /// Kind name as written in page files
    pub fn kind(&self) -> &'static str {
        match self {
            SourceRequest::Sql { .. } => "sql",
            SourceRequest::PxWeb { .. } => "pxweb",
            SourceRequest::File { .. } => "file",
        }
    }

    /// Stable identity of the request, used as the cache key
    pub fn cache_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Trait for row sources
///
/// Row sources execute one request and return its rows as a [`Table`].
/// Retries and timeouts are the source's own business; callers see a single
/// blocking call.
pub trait RowSource {
    /// Fetch the rows for a request
    ///
    /// # Arguments
    ///
    /// * `request` - What to fetch
    ///
    /// # Errors
    ///
    /// Returns `StatdashError::SourceError` if:
    /// - The request kind is not supported by this source
    /// - The query or HTTP call fails
    /// - The payload cannot be normalized into a table
    fn fetch(&self, request: &SourceRequest) -> Result<Table>;
}

impl<T: RowSource + ?Sized> RowSource for Box<T> {
    fn fetch(&self, request: &SourceRequest) -> Result<Table> {
        (**self).fetch(request)
    }
}

impl<T: RowSource + ?Sized> RowSource for &T {
    fn fetch(&self, request: &SourceRequest) -> Result<Table> {
        (**self).fetch(request)
    }
}

/// Dispatches requests to the source configured for their kind
///
/// SQL and file requests go to the warehouse, PxWeb requests to the
/// statistics API.
#[derive(Default)]
pub struct Sources {
    warehouse: Option<Box<dyn RowSource>>,
    statistics_api: Option<Box<dyn RowSource>>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warehouse(mut self, source: impl RowSource + 'static) -> Self {
        self.warehouse = Some(Box::new(source));
        self
    }

    pub fn with_statistics_api(mut self, source: impl RowSource + 'static) -> Self {
        self.statistics_api = Some(Box::new(source));
        self
    }
}

impl RowSource for Sources {
    fn fetch(&self, request: &SourceRequest) -> Result<Table> {
        let source = match request {
            SourceRequest::Sql { .. } | SourceRequest::File { .. } => self.warehouse.as_ref(),
            SourceRequest::PxWeb { .. } => self.statistics_api.as_ref(),
        };
        match source {
            Some(source) => source.fetch(request),
            None => Err(StatdashError::SourceError(format!(
                "No source configured for '{}' requests",
                request.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use serde_json::json;

    struct Fixed;

    impl RowSource for Fixed {
        fn fetch(&self, request: &SourceRequest) -> Result<Table> {
            Table::from_values(&["kind"], vec![vec![Value::from(request.kind())]])
        }
    }

    #[test]
    fn test_request_deserialize() {
        let request: SourceRequest =
            serde_json::from_value(json!({"kind": "sql", "query": "SELECT 1"})).unwrap();
        assert_eq!(request, SourceRequest::sql("SELECT 1"));

        let request: SourceRequest = serde_json::from_value(json!({
            "kind": "pxweb",
            "table": "EN/EN0203/SlutAnvSektor",
            "query": {"query": [], "response": {"format": "json"}}
        }))
        .unwrap();
        assert_eq!(request.kind(), "pxweb");
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = SourceRequest::pxweb("T", json!({"b": 1, "a": [1, 2]}));
        let b = SourceRequest::pxweb("T", json!({"a": [1, 2], "b": 1}));
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
        assert_ne!(
            a.cache_key().unwrap(),
            SourceRequest::sql("SELECT 1").cache_key().unwrap()
        );
    }

    #[test]
    fn test_sources_dispatch() {
        let sources = Sources::new().with_warehouse(Fixed);
        let table = sources.fetch(&SourceRequest::file("data.csv")).unwrap();
        assert_eq!(table.rows()[0].get("kind"), &Value::from("file"));

        let err = sources
            .fetch(&SourceRequest::pxweb("T", json!({})))
            .unwrap_err();
        assert!(matches!(err, StatdashError::SourceError(_)));
        assert!(err.to_string().contains("'pxweb'"));
    }
}

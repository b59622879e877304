//! DuckDB row source
//!
//! Runs SQL against an in-memory or file-backed DuckDB database, builds a
//! typed Polars DataFrame from the result and hands it over as a [`Table`].
//! Local CSV, Parquet and JSON files are read through DuckDB as well.

use crate::reader::{connection::ConnectionInfo, RowSource, SourceRequest};
use crate::table::{dataframe_to_table, Table};
use crate::{Result, StatdashError};
use duckdb::types::{Type, ValueRef};
use duckdb::{params, Connection};
use polars::prelude::*;
use std::path::Path;

/// DuckDB warehouse reader
///
/// # Examples
///
/// ```rust,ignore
/// use statdash::reader::{DuckDBReader, RowSource, SourceRequest};
///
/// // In-memory database
/// let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
/// let table = reader.fetch(&SourceRequest::sql("SELECT 1 AS x, 2 AS y"))?;
///
/// // File-based database
/// let reader = DuckDBReader::from_connection_string("duckdb://halland.duckdb")?;
/// let table = reader.fetch(&SourceRequest::sql("SELECT * FROM befolkning"))?;
/// ```
pub struct DuckDBReader {
    conn: Connection,
}

impl DuckDBReader {
    /// Create a new DuckDB reader from a connection string
    ///
    /// # Arguments
    ///
    /// * `uri` - Connection string (e.g., "duckdb://memory" or "duckdb://file.db")
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the connection string is invalid, names a
    /// non-DuckDB source, or the database cannot be opened.
    pub fn from_connection_string(uri: &str) -> Result<Self> {
        let conn = match super::connection::parse_connection_string(uri)? {
            ConnectionInfo::DuckDBMemory => Connection::open_in_memory().map_err(|e| {
                StatdashError::SourceError(format!("Failed to open in-memory DuckDB: {}", e))
            })?,
            ConnectionInfo::DuckDBFile(path) => Connection::open(&path).map_err(|e| {
                StatdashError::SourceError(format!("Failed to open DuckDB file '{}': {}", path, e))
            })?,
            ConnectionInfo::PxWeb(_) => {
                return Err(StatdashError::SourceError(format!(
                    "Connection string '{}' is not supported by DuckDBReader",
                    uri
                )))
            }
        };

        Ok(Self { conn })
    }

    /// Get a reference to the underlying DuckDB connection
    ///
    /// Useful for executing setup statements (CREATE TABLE, INSERT, etc.)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute a query and return the result as a DataFrame
    ///
    /// A query without rows yields a DataFrame with the result's columns
    /// and zero rows.
    pub fn query(&self, sql: &str) -> Result<DataFrame> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| StatdashError::SourceError(format!("Failed to prepare SQL: {}", e)))?;

        let mut rows = stmt
            .query(params![])
            .map_err(|e| StatdashError::SourceError(format!("Failed to run query: {}", e)))?;

        // Column metadata is only populated once the statement has run
        let (names, mut builders) = {
            let stmt = rows.as_ref().ok_or_else(|| {
                StatdashError::InternalError("Query returned no statement".to_string())
            })?;
            let column_count = stmt.column_count();
            let mut names = Vec::with_capacity(column_count);
            let mut builders = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let name = stmt.column_name(idx).map_err(|e| {
                    StatdashError::SourceError(format!("Failed to get column name: {}", e))
                })?;
                names.push(name.to_string());
                builders.push(ColumnBuilder::new(Type::from(&stmt.column_type(idx))));
            }
            (names, builders)
        };

        let mut row_count = 0usize;
        while let Some(row) = rows.next()? {
            for (idx, builder) in builders.iter_mut().enumerate() {
                let value = row.get_ref(idx).map_err(|e| {
                    StatdashError::SourceError(format!("Failed to read column '{}': {}", names[idx], e))
                })?;
                builder.push(value);
            }
            row_count += 1;
        }

        let columns = names
            .iter()
            .zip(builders)
            .map(|(name, builder)| builder.build(name).map(Column::from))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(rows = row_count, columns = names.len(), "duckdb query");

        DataFrame::new(columns)
            .map_err(|e| StatdashError::SourceError(format!("Failed to create DataFrame: {}", e)))
    }

    /// Load a CSV, Parquet or JSON file into a table
    ///
    /// # Arguments
    ///
    /// * `path` - File to load; the format follows the extension
    /// * `table_name` - Target table; defaults to the file stem
    /// * `null_marker` - CSV cell text read as null, e.g. `"-"`
    ///
    /// # Returns
    ///
    /// The name of the created (or replaced) table
    pub fn load_file(
        &self,
        path: &str,
        table_name: Option<&str>,
        null_marker: Option<&str>,
    ) -> Result<String> {
        let table_name = match table_name {
            Some(name) => name.to_string(),
            None => Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("data")
                .replace(['-', ' ', '.'], "_"),
        };

        let select = file_select(path, null_marker)?;
        let sql = format!(
            "CREATE OR REPLACE TABLE \"{}\" AS {}",
            table_name.replace('"', "\"\""),
            select
        );
        self.conn.execute(&sql, params![]).map_err(|e| {
            StatdashError::SourceError(format!("Failed to load {}: {}", path, e))
        })?;

        tracing::info!(path, table = %table_name, "loaded file");
        Ok(table_name)
    }
}

/// `SELECT` reading a local file with the DuckDB reader for its extension
fn file_select(path: &str, null_marker: Option<&str>) -> Result<String> {
    let file = Path::new(path);
    if !file.exists() {
        return Err(StatdashError::SourceError(format!("File not found: {}", path)));
    }

    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let quoted = path.replace('\'', "''");

    match extension.as_str() {
        "csv" | "tsv" | "txt" => Ok(match null_marker {
            Some(marker) => format!(
                "SELECT * FROM read_csv_auto('{}', nullstr = '{}')",
                quoted,
                marker.replace('\'', "''")
            ),
            None => format!("SELECT * FROM read_csv_auto('{}')", quoted),
        }),
        "parquet" => Ok(format!("SELECT * FROM read_parquet('{}')", quoted)),
        "json" | "jsonl" | "ndjson" => Ok(format!("SELECT * FROM read_json_auto('{}')", quoted)),
        _ => Err(StatdashError::SourceError(format!(
            "Unsupported file format: {} (supported: csv, tsv, txt, parquet, json, jsonl, ndjson)",
            extension
        ))),
    }
}

impl RowSource for DuckDBReader {
    fn fetch(&self, request: &SourceRequest) -> Result<Table> {
        let sql = match request {
            SourceRequest::Sql { query } => query.clone(),
            SourceRequest::File { path, null_marker } => file_select(path, null_marker.as_deref())?,
            SourceRequest::PxWeb { .. } => {
                return Err(StatdashError::SourceError(
                    "DuckDBReader cannot serve PxWeb requests".to_string(),
                ))
            }
        };

        tracing::info!(kind = request.kind(), chars = sql.len(), "fetching from duckdb");
        let df = self.query(&sql)?;
        dataframe_to_table(&df)
    }
}

/// Typed column accumulator
///
/// Every integer width lands in one `i128` buffer and is narrowed to `i64`
/// when the whole column fits; decimals become doubles.
enum ColumnBuilder {
    Integer(Vec<Option<i128>>),
    Double(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    Date32(Vec<Option<i32>>),
    /// Microseconds since the epoch
    Timestamp(Vec<Option<i64>>),
    Fallback(Vec<Option<String>>),
}

impl ColumnBuilder {
    fn new(duckdb_type: Type) -> Self {
        match duckdb_type {
            Type::TinyInt
            | Type::SmallInt
            | Type::Int
            | Type::BigInt
            | Type::HugeInt
            | Type::UTinyInt
            | Type::USmallInt
            | Type::UInt
            | Type::UBigInt => ColumnBuilder::Integer(Vec::new()),
            Type::Float | Type::Double | Type::Decimal => ColumnBuilder::Double(Vec::new()),
            Type::Boolean => ColumnBuilder::Boolean(Vec::new()),
            Type::Text => ColumnBuilder::Text(Vec::new()),
            Type::Date32 => ColumnBuilder::Date32(Vec::new()),
            Type::Timestamp => ColumnBuilder::Timestamp(Vec::new()),
            _ => ColumnBuilder::Fallback(Vec::new()),
        }
    }

    fn push(&mut self, value: ValueRef<'_>) {
        match self {
            ColumnBuilder::Integer(values) => values.push(integer(&value)),
            ColumnBuilder::Double(values) => values.push(double(&value)),
            ColumnBuilder::Boolean(values) => values.push(match value {
                ValueRef::Boolean(b) => Some(b),
                _ => None,
            }),
            ColumnBuilder::Text(values) => values.push(text(&value)),
            ColumnBuilder::Date32(values) => values.push(match value {
                ValueRef::Date32(days) => Some(days),
                _ => None,
            }),
            ColumnBuilder::Timestamp(values) => values.push(match value {
                ValueRef::Timestamp(unit, ts) => Some(unit.to_micros(ts)),
                _ => None,
            }),
            ColumnBuilder::Fallback(values) => values.push(text(&value)),
        }
    }

    fn build(self, name: &str) -> Result<Series> {
        Ok(match self {
            ColumnBuilder::Integer(values) => {
                let fits = values
                    .iter()
                    .flatten()
                    .all(|v| *v >= i64::MIN as i128 && *v <= i64::MAX as i128);
                if fits {
                    let narrowed: Vec<Option<i64>> =
                        values.into_iter().map(|v| v.map(|v| v as i64)).collect();
                    Series::new(name.into(), narrowed)
                } else {
                    tracing::warn!(column = name, "integer overflow, converting to float");
                    let widened: Vec<Option<f64>> =
                        values.into_iter().map(|v| v.map(|v| v as f64)).collect();
                    Series::new(name.into(), widened)
                }
            }
            ColumnBuilder::Double(values) => Series::new(name.into(), values),
            ColumnBuilder::Boolean(values) => Series::new(name.into(), values),
            ColumnBuilder::Text(values) => Series::new(name.into(), values),
            ColumnBuilder::Date32(values) => Series::new(name.into(), values)
                .cast(&DataType::Date)
                .map_err(|e| StatdashError::SourceError(format!("Date cast failed: {}", e)))?,
            ColumnBuilder::Timestamp(values) => Series::new(name.into(), values)
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                .map_err(|e| StatdashError::SourceError(format!("Timestamp cast failed: {}", e)))?,
            ColumnBuilder::Fallback(values) => {
                tracing::warn!(column = name, "using fallback string conversion");
                Series::new(name.into(), values)
            }
        })
    }
}

fn integer(value: &ValueRef<'_>) -> Option<i128> {
    match value {
        ValueRef::TinyInt(i) => Some(*i as i128),
        ValueRef::SmallInt(i) => Some(*i as i128),
        ValueRef::Int(i) => Some(*i as i128),
        ValueRef::BigInt(i) => Some(*i as i128),
        ValueRef::HugeInt(i) => Some(*i),
        ValueRef::UTinyInt(i) => Some(*i as i128),
        ValueRef::USmallInt(i) => Some(*i as i128),
        ValueRef::UInt(i) => Some(*i as i128),
        ValueRef::UBigInt(i) => Some(*i as i128),
        _ => None,
    }
}

fn double(value: &ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Float(f) => Some(*f as f64),
        ValueRef::Double(f) => Some(*f),
        ValueRef::Decimal(d) => d.to_string().parse::<f64>().ok(),
        _ => integer(value).map(|i| i as f64),
    }
}

fn text(value: &ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Boolean(b) => Some(b.to_string()),
        _ => double(value).map(|f| f.to_string()),
    }
}

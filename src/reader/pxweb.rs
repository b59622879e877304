//! PxWeb statistics API row source
//!
//! PxWeb table queries are POSTed as JSON and answered with a list of
//! columns plus `data` entries pairing a `key` (one code per dimension
//! column) with `values` (one cell per content column). Statistics agencies
//! mark suppressed or missing cells with dots or dashes; those become nulls.

use crate::table::{Record, Table, Value};
use crate::{Result, StatdashError};
use serde::{Deserialize, Serialize};

/// Cell texts PxWeb uses for missing, suppressed or not applicable values
const MISSING_MARKERS: &[&str] = &["", ".", "..", "...", "-", "–"];

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("statdash/{}", crate::VERSION)
}

/// Statistics API client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PxWebConfig {
    /// API root, e.g. `https://api.scb.se/OV0104/v1/doris/sv/ssd`
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl PxWebConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    /// Full URL of a table path
    pub fn table_url(&self, table: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            table.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct PxColumn {
    code: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct PxEntry {
    #[serde(default)]
    key: Vec<String>,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PxResponse {
    columns: Vec<PxColumn>,
    data: Vec<PxEntry>,
}

fn is_content_column(column: &PxColumn) -> bool {
    column.kind == "c"
}

/// Parse a PxWeb content cell
fn content_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) => Value::number(f),
        Err(_) => Value::Text(trimmed.to_string()),
    }
}

/// Normalize a PxWeb JSON response into a [`Table`]
///
/// Fields are named by column code. Dimension columns (`key`) stay text;
/// content columns (`values`) are parsed as numbers, with missing-value
/// markers mapped to null.
///
/// # Errors
///
/// Returns `SourceError` if the payload is not a PxWeb response or an entry
/// does not match the column list.
pub fn normalize_response(payload: &serde_json::Value) -> Result<Table> {
    let response: PxResponse = serde_json::from_value(payload.clone())
        .map_err(|e| StatdashError::SourceError(format!("Malformed PxWeb response: {}", e)))?;

    let (content, dimensions): (Vec<&PxColumn>, Vec<&PxColumn>) =
        response.columns.iter().partition(|c| is_content_column(c));

    let mut rows = Vec::with_capacity(response.data.len());
    for (idx, entry) in response.data.iter().enumerate() {
        if entry.key.len() != dimensions.len() || entry.values.len() != content.len() {
            return Err(StatdashError::SourceError(format!(
                "PxWeb entry {} has {} keys and {} values, expected {} and {}",
                idx,
                entry.key.len(),
                entry.values.len(),
                dimensions.len(),
                content.len()
            )));
        }

        let mut record = Record::new();
        for (column, key) in dimensions.iter().zip(&entry.key) {
            record.insert(column.code.clone(), Value::Text(key.clone()));
        }
        for (column, cell) in content.iter().zip(&entry.values) {
            record.insert(column.code.clone(), content_value(cell));
        }
        rows.push(record);
    }

    let fields = dimensions
        .iter()
        .chain(content.iter())
        .map(|c| c.code.clone())
        .collect();
    Ok(Table::new(fields, rows))
}

#[cfg(feature = "pxweb")]
pub use client::PxWebClient;

#[cfg(feature = "pxweb")]
mod client {
    use super::{normalize_response, PxWebConfig};
    use crate::reader::{connection, RowSource, SourceRequest};
    use crate::table::Table;
    use crate::{Result, StatdashError};
    use std::time::Duration;

    /// Blocking PxWeb API client
    pub struct PxWebClient {
        client: reqwest::blocking::Client,
        config: PxWebConfig,
    }

    impl PxWebClient {
        pub fn new(config: PxWebConfig) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| {
                    StatdashError::SourceError(format!("Failed to build HTTP client: {}", e))
                })?;
            Ok(Self { client, config })
        }

        /// Create a client from a `pxweb+https://...` connection string
        pub fn from_connection_string(uri: &str) -> Result<Self> {
            match connection::parse_connection_string(uri)? {
                connection::ConnectionInfo::PxWeb(base_url) => Self::new(PxWebConfig::new(base_url)),
                _ => Err(StatdashError::SourceError(format!(
                    "Connection string '{}' is not supported by PxWebClient",
                    uri
                ))),
            }
        }

        pub fn config(&self) -> &PxWebConfig {
            &self.config
        }

        /// POST a table query and return the raw JSON response
        pub fn post(&self, table: &str, query: &serde_json::Value) -> Result<serde_json::Value> {
            let url = self.config.table_url(table);
            tracing::info!(%url, "querying statistics api");

            let response = self.client.post(&url).json(query).send()?;

            if !response.status().is_success() {
                return Err(StatdashError::SourceError(format!(
                    "Failed to retrieve data from {}: HTTP {}",
                    url,
                    response.status()
                )));
            }

            response.json::<serde_json::Value>().map_err(|e| {
                StatdashError::SourceError(format!("Invalid JSON from {}: {}", url, e))
            })
        }
    }

    impl RowSource for PxWebClient {
        fn fetch(&self, request: &SourceRequest) -> Result<Table> {
            match request {
                SourceRequest::PxWeb { table, query } => normalize_response(&self.post(table, query)?),
                other => Err(StatdashError::SourceError(format!(
                    "PxWebClient cannot serve '{}' requests",
                    other.kind()
                ))),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_from_connection_string() {
            let client =
                PxWebClient::from_connection_string("pxweb+https://api.scb.se/OV0104/v1/doris/sv/ssd")
                    .unwrap();
            assert_eq!(
                client.config().table_url("EN/EN0203/SlutAnvSektor"),
                "https://api.scb.se/OV0104/v1/doris/sv/ssd/EN/EN0203/SlutAnvSektor"
            );
            assert!(PxWebClient::from_connection_string("duckdb://memory").is_err());
        }

        #[test]
        fn test_sql_request_rejected() {
            let client = PxWebClient::new(PxWebConfig::new("http://localhost:1")).unwrap();
            let err = client.fetch(&SourceRequest::sql("SELECT 1")).unwrap_err();
            assert!(err.to_string().contains("'sql'"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn energy_response() -> serde_json::Value {
        json!({
            "columns": [
                {"code": "Region", "text": "region", "type": "d"},
                {"code": "Sektor", "text": "sektor", "type": "d"},
                {"code": "Tid", "text": "år", "type": "t"},
                {"code": "EN0203A1", "text": "Slutanvändning (MWh)", "type": "c"}
            ],
            "data": [
                {"key": ["1382", "1.1", "2022"], "values": ["31250"]},
                {"key": ["1382", "2.3", "2022"], "values": [".."]},
                {"key": ["1382", "3.0", "2022"], "values": ["12.5"]}
            ]
        })
    }

    #[test]
    fn test_normalize_response() {
        let table = normalize_response(&energy_response()).unwrap();
        assert_eq!(table.fields(), &["Region", "Sektor", "Tid", "EN0203A1"]);
        assert_eq!(table.len(), 3);

        let first = &table.rows()[0];
        assert_eq!(first.get("Region"), &Value::from("1382"));
        assert_eq!(first.get("Tid"), &Value::from("2022"));
        assert_eq!(first.get("EN0203A1"), &Value::Int(31250));
        assert!(table.rows()[1].get("EN0203A1").is_null());
        assert_eq!(table.rows()[2].get("EN0203A1"), &Value::Float(12.5));
    }

    #[test]
    fn test_normalize_rejects_mismatched_entry() {
        let mut payload = energy_response();
        payload["data"][0]["key"] = json!(["1382"]);
        let result = normalize_response(&payload);
        assert!(matches!(result, Err(StatdashError::SourceError(_))));

        assert!(normalize_response(&json!({"rows": []})).is_err());
    }

    #[test]
    fn test_content_markers() {
        assert!(content_value("-").is_null());
        assert!(content_value(" .. ").is_null());
        assert_eq!(content_value("7"), Value::Int(7));
        assert_eq!(content_value("x"), Value::from("x"));
    }

    #[test]
    fn test_config_defaults() {
        let config: PxWebConfig =
            serde_json::from_value(json!({"base_url": "https://api.scb.se/OV0104/v1/doris/sv/ssd/"}))
                .unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.user_agent.starts_with("statdash/"));
        assert_eq!(
            config.table_url("/BE/BE0101"),
            "https://api.scb.se/OV0104/v1/doris/sv/ssd/BE/BE0101"
        );
    }
}

//! Connection string parsing for row sources
//!
//! Parses URI-style connection strings to determine the source type and its
//! connection parameters.

use crate::{Result, StatdashError};

/// Parsed connection information
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionInfo {
    /// DuckDB in-memory database
    DuckDBMemory,
    /// DuckDB file-based database
    DuckDBFile(String),
    /// PxWeb statistics API base URL
    PxWeb(String),
}

/// Parse a connection string into connection information
///
/// # Supported Formats
///
/// - `duckdb://memory` - DuckDB in-memory database
/// - `duckdb:///absolute/path/file.db` - DuckDB file (absolute path)
/// - `duckdb://relative/file.db` - DuckDB file (relative path)
/// - `pxweb+https://host/api/v1/sv/ssd` - PxWeb API over HTTPS
/// - `pxweb+http://...` - PxWeb API over plain HTTP
///
/// # Examples
///
/// ```
/// use statdash::reader::connection::{parse_connection_string, ConnectionInfo};
///
/// let info = parse_connection_string("duckdb://memory").unwrap();
/// assert_eq!(info, ConnectionInfo::DuckDBMemory);
///
/// let info = parse_connection_string("duckdb://data.db").unwrap();
/// assert_eq!(info, ConnectionInfo::DuckDBFile("data.db".to_string()));
/// ```
pub fn parse_connection_string(uri: &str) -> Result<ConnectionInfo> {
    if uri == "duckdb://memory" {
        return Ok(ConnectionInfo::DuckDBMemory);
    }

    if let Some(path) = uri.strip_prefix("duckdb://") {
        // Remove leading slashes for file paths
        let cleaned_path = path.trim_start_matches('/');
        if cleaned_path.is_empty() {
            return Err(StatdashError::SourceError(
                "DuckDB file path cannot be empty".to_string(),
            ));
        }
        return Ok(ConnectionInfo::DuckDBFile(cleaned_path.to_string()));
    }

    if let Some(url) = uri.strip_prefix("pxweb+") {
        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or("");
        if host.trim_matches('/').is_empty() {
            return Err(StatdashError::SourceError(format!(
                "PxWeb connection string '{}' needs an http(s) base URL",
                uri
            )));
        }
        return Ok(ConnectionInfo::PxWeb(url.trim_end_matches('/').to_string()));
    }

    Err(StatdashError::SourceError(format!(
        "Unsupported connection string format: {}. Supported: duckdb://, pxweb+https://, pxweb+http://",
        uri
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duckdb_memory() {
        let info = parse_connection_string("duckdb://memory").unwrap();
        assert_eq!(info, ConnectionInfo::DuckDBMemory);
    }

    #[test]
    fn test_duckdb_file_absolute() {
        let info = parse_connection_string("duckdb:///tmp/statistik.db").unwrap();
        assert_eq!(info, ConnectionInfo::DuckDBFile("tmp/statistik.db".to_string()));
    }

    #[test]
    fn test_duckdb_file_nested() {
        let info = parse_connection_string("duckdb://lager/halland.duckdb").unwrap();
        assert_eq!(
            info,
            ConnectionInfo::DuckDBFile("lager/halland.duckdb".to_string())
        );
    }

    #[test]
    fn test_empty_duckdb_path() {
        assert!(parse_connection_string("duckdb://").is_err());
    }

    #[test]
    fn test_pxweb() {
        let info =
            parse_connection_string("pxweb+https://api.scb.se/OV0104/v1/doris/sv/ssd/").unwrap();
        assert_eq!(
            info,
            ConnectionInfo::PxWeb("https://api.scb.se/OV0104/v1/doris/sv/ssd".to_string())
        );
        assert!(parse_connection_string("pxweb+ftp://host").is_err());
        assert!(parse_connection_string("pxweb+https://").is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = parse_connection_string("bigquery://projekt/dataset");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unsupported connection string"));
    }
}

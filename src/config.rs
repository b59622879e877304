//! Dashboard configuration
//!
//! Configuration is read from a TOML, YAML or JSON file (format chosen by
//! extension) and layered with `STATDASH__`-prefixed environment variables,
//! e.g. `STATDASH__WAREHOUSE__CONNECTION=duckdb://stats.db`.
//!
//! ```toml
//! [warehouse]
//! connection = "duckdb://memory"
//! files = ["data/foretag.csv"]
//! null_marker = "-"
//!
//! [statistics_api]
//! base_url = "https://api.scb.se/OV0104/v1/doris/sv/ssd"
//!
//! [logging]
//! level = "statdash=debug"
//! ```

use crate::page::PageSpec;
use crate::reader::{PxWebConfig, Sources};
use crate::{Result, StatdashError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "STATDASH";

fn default_connection() -> String {
    "duckdb://memory".to_string()
}

fn default_level() -> String {
    "statdash=info".to_string()
}

/// Warehouse settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default = "default_connection")]
    pub connection: String,
    /// Files loaded as tables on startup, each named by its file stem
    #[serde(default)]
    pub files: Vec<String>,
    /// Cell text read as null when loading files
    #[serde(default)]
    pub null_marker: Option<String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            files: Vec::new(),
            null_marker: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Top-level dashboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub statistics_api: Option<PxWebConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Inline page specs
    #[serde(default)]
    pub pages: Vec<PageSpec>,
    /// Page spec JSON files, relative to the working directory
    #[serde(default)]
    pub page_files: Vec<String>,
}

/// Load configuration from a file plus the environment
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or does not match the
/// configuration layout, or if a page file cannot be parsed.
pub fn load_config(path: &str) -> Result<DashboardConfig> {
    let config = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| StatdashError::ConfigError(format!("Failed to read {}: {}", path, e)))?;

    let mut dashboard: DashboardConfig = config
        .try_deserialize()
        .map_err(|e| StatdashError::ConfigError(format!("Invalid configuration in {}: {}", path, e)))?;

    for file in &dashboard.page_files {
        dashboard.pages.push(load_page(file)?);
    }
    tracing::debug!(path, pages = dashboard.pages.len(), "configuration loaded");
    Ok(dashboard)
}

/// Read a single page spec from a JSON file
pub fn load_page(path: impl AsRef<Path>) -> Result<PageSpec> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        StatdashError::ConfigError(format!("Failed to read page {}: {}", path.display(), e))
    })?;
    PageSpec::from_json(&text).map_err(|e| {
        StatdashError::ConfigError(format!("Invalid page {}: {}", path.display(), e))
    })
}

impl DashboardConfig {
    /// Look up a configured page by name
    pub fn page(&self, name: &str) -> Option<&PageSpec> {
        self.pages.iter().find(|p| p.name == name)
    }

    /// Build the row sources described by this configuration
    ///
    /// The warehouse is opened and its files loaded; the statistics API
    /// client is created when configured.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the warehouse cannot be opened or a file
    /// cannot be loaded, and `ConfigError` if a configured source needs a
    /// feature this build lacks.
    pub fn build_sources(&self) -> Result<Sources> {
        let mut sources = Sources::new();

        #[cfg(feature = "duckdb")]
        {
            let reader = crate::reader::DuckDBReader::from_connection_string(&self.warehouse.connection)?;
            for file in &self.warehouse.files {
                let table = reader.load_file(file, None, self.warehouse.null_marker.as_deref())?;
                tracing::info!(%file, %table, "loaded warehouse file");
            }
            sources = sources.with_warehouse(reader);
        }
        #[cfg(not(feature = "duckdb"))]
        {
            if !self.warehouse.files.is_empty() {
                return Err(StatdashError::ConfigError(
                    "Warehouse files need the 'duckdb' feature".to_string(),
                ));
            }
        }

        if let Some(api) = &self.statistics_api {
            #[cfg(feature = "pxweb")]
            {
                sources = sources.with_statistics_api(crate::reader::PxWebClient::new(api.clone())?);
            }
            #[cfg(not(feature = "pxweb"))]
            {
                return Err(StatdashError::ConfigError(format!(
                    "Statistics API at {} needs the 'pxweb' feature",
                    api.base_url
                )));
            }
        }

        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "statdash.toml",
            r#"
[statistics_api]
base_url = "https://api.scb.se/OV0104/v1/doris/sv/ssd"
timeout_secs = 10
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.warehouse.connection, "duckdb://memory");
        assert_eq!(config.logging.level, "statdash=info");
        let api = config.statistics_api.unwrap();
        assert_eq!(api.timeout_secs, 10);
        assert!(api.user_agent.starts_with("statdash/"));
        assert!(config.pages.is_empty());
    }

    #[test]
    fn test_inline_and_file_pages() {
        let dir = tempfile::tempdir().unwrap();
        let page_path = write_file(
            &dir,
            "energi.json",
            r#"{"name": "energi", "sources": {"main": {"kind": "sql", "query": "SELECT 1"}}}"#,
        );
        let config_json = serde_json::json!({
            "pages": [{
                "name": "befolkning",
                "sources": {"main": {"kind": "sql", "query": "SELECT * FROM folkmangd"}},
                "charts": [{"name": "per_ar", "kind": "bar", "encoding": {"x": "ar", "y": "folkmangd"}}]
            }],
            "page_files": [page_path]
        });
        let path = write_file(&dir, "statdash.json", &config_json.to_string());

        let config = load_config(&path).unwrap();
        assert_eq!(config.pages.len(), 2);
        assert_eq!(config.page("befolkning").unwrap().charts.len(), 1);
        assert!(config.page("energi").is_some());
        assert!(config.page("saknas").is_none());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_config("/nonexistent/statdash.toml");
        assert!(matches!(result, Err(StatdashError::ConfigError(_))));

        let dir = tempfile::tempdir().unwrap();
        let bad = write_file(&dir, "bad.json", "{not json");
        assert!(matches!(load_page(&bad), Err(StatdashError::ConfigError(_))));
    }

    #[cfg(feature = "duckdb")]
    #[test]
    fn test_build_sources_loads_files() {
        use crate::reader::{RowSource, SourceRequest};

        let dir = tempfile::tempdir().unwrap();
        let csv = write_file(&dir, "foretag.csv", "bransch,anstallda\nHandel,40\nBygg,-\n");
        let config = DashboardConfig {
            warehouse: WarehouseConfig {
                files: vec![csv],
                null_marker: Some("-".to_string()),
                ..WarehouseConfig::default()
            },
            ..DashboardConfig::default()
        };

        let sources = config.build_sources().unwrap();
        let table = sources
            .fetch(&SourceRequest::sql("SELECT * FROM foretag ORDER BY bransch"))
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows()[0].get("anstallda").is_null());

        let err = sources
            .fetch(&SourceRequest::pxweb("BE/BE0101", serde_json::json!({})))
            .unwrap_err();
        assert!(matches!(err, StatdashError::SourceError(_)));
    }
}

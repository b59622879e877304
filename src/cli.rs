/*!
statdash Command Line Interface

Runs dashboard pages against a warehouse and a statistics API and writes the
resulting Plotly figures as JSON.
*/

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use statdash::config::{load_config, load_page, DashboardConfig};
use statdash::reader::{CachedSource, Sources};
use statdash::writer::PlotlyWriter;
use statdash::{run_page, PageOutput, PageSpec, VERSION};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "statdash")]
#[command(about = "Reshape statistics into chart-ready tables and Plotly figures")]
#[command(version = VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run configured pages
    Run {
        /// Configuration file (TOML, YAML or JSON)
        #[arg(short, long, default_value = "statdash.toml")]
        config: PathBuf,

        /// Only run this page
        #[arg(long)]
        page: Option<String>,

        /// Directory for chart JSON files; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a single page file
    Exec {
        /// Path to a page spec JSON file
        file: PathBuf,

        /// Warehouse connection string
        #[arg(long, default_value = "duckdb://memory")]
        reader: String,

        /// Statistics API connection string, e.g. pxweb+https://api.scb.se/OV0104/v1/doris/sv/ssd
        #[arg(long)]
        api: Option<String>,

        /// Files loaded into the warehouse before the page runs
        #[arg(long = "load")]
        files: Vec<String>,

        /// Cell text read as null when loading files
        #[arg(long)]
        null_marker: Option<String>,

        /// Directory for chart JSON files; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check a page file without fetching any data
    Validate {
        /// Path to a page spec JSON file
        file: PathBuf,
    },

    /// List configured pages
    Pages {
        #[arg(short, long, default_value = "statdash.toml")]
        config: PathBuf,
    },
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, page, output } => {
            let config = read_config(&config)?;
            init_tracing(&config.logging.level);
            cmd_run(&config, page.as_deref(), output.as_deref())
        }
        Commands::Exec {
            file,
            reader,
            api,
            files,
            null_marker,
            output,
        } => {
            init_tracing("statdash=info");
            let config = DashboardConfig {
                warehouse: statdash::config::WarehouseConfig {
                    connection: reader,
                    files,
                    null_marker,
                },
                statistics_api: api.as_deref().map(api_config).transpose()?,
                ..DashboardConfig::default()
            };
            let page = load_page(&file)?;
            let sources = config.build_sources()?;
            let result = run_page(&sources, &page, &PlotlyWriter::new())?;
            emit(&result, output.as_deref())
        }
        Commands::Validate { file } => {
            init_tracing("statdash=warn");
            let page = load_page(&file)?;
            cmd_validate(&page)
        }
        Commands::Pages { config } => {
            let config = read_config(&config)?;
            for page in &config.pages {
                println!(
                    "{}\t{}\t{} chart(s)",
                    page.name,
                    page.title.as_deref().unwrap_or(""),
                    page.charts.len()
                );
            }
            Ok(())
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<DashboardConfig> {
    let path = path.to_str().context("Configuration path is not valid UTF-8")?;
    Ok(load_config(path)?)
}

fn api_config(uri: &str) -> anyhow::Result<statdash::reader::PxWebConfig> {
    match statdash::reader::connection::parse_connection_string(uri)? {
        statdash::reader::connection::ConnectionInfo::PxWeb(base_url) => {
            Ok(statdash::reader::PxWebConfig::new(base_url))
        }
        _ => bail!("'{}' is not a statistics API connection string", uri),
    }
}

fn cmd_run(config: &DashboardConfig, only: Option<&str>, output: Option<&Path>) -> anyhow::Result<()> {
    let pages: Vec<&PageSpec> = match only {
        Some(name) => vec![config
            .page(name)
            .with_context(|| format!("No page named '{}' in configuration", name))?],
        None => config.pages.iter().collect(),
    };
    if pages.is_empty() {
        bail!("No pages configured");
    }

    let sources: CachedSource<Sources> = CachedSource::new(config.build_sources()?);
    let writer = PlotlyWriter::new();
    for page in pages {
        let result = run_page(&sources, page, &writer)
            .with_context(|| format!("Page '{}' failed", page.name))?;
        emit(&result, output)?;
    }
    tracing::info!(cached_requests = sources.len(), "all pages rendered");
    Ok(())
}

fn cmd_validate(page: &PageSpec) -> anyhow::Result<()> {
    page.validate(&PlotlyWriter::new())?;
    println!(
        "Page '{}' is valid: {} source(s), {} step(s), {} chart(s)",
        page.name,
        page.sources.len(),
        page.plan.steps.len(),
        page.charts.len()
    );
    Ok(())
}

/// Print a page's charts, or write one `{page}.{chart}.json` file per chart
fn emit(result: &PageOutput, output: Option<&Path>) -> anyhow::Result<()> {
    let Some(dir) = output else {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    for named in &result.charts {
        let path = dir.join(format!("{}.{}.json", result.name, named.name));
        std::fs::write(&path, named.chart.to_json_string()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "chart written");
    }
    Ok(())
}

//! CLI entry point for the inspection choropleth.
//!
//! Runs the load, join, aggregate and render pipeline for one deployment,
//! chosen by a TOML config or a built-in variant, and either writes the map
//! page or logs the per-region results.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use inspection_choropleth::{config::AppConfig, output, pipeline};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "inspection_choropleth")]
#[command(about = "Choropleth map of San Francisco restaurant inspection scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    /// Neighborhood boundaries joined by point-in-polygon, quantile colors
    Neighborhoods,
    /// Zip-code boundaries joined by postal code, fixed score thresholds
    ZipCodes,
}

#[derive(clap::Args)]
struct Selection {
    /// TOML deployment config; overrides --variant
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Built-in deployment to use when no config file is given
    #[arg(short, long, value_enum, default_value_t = Variant::Neighborhoods)]
    variant: Variant,
}

impl Selection {
    fn load(&self) -> Result<AppConfig> {
        match &self.config {
            Some(path) => AppConfig::load_from_file(path),
            None => Ok(match self.variant {
                Variant::Neighborhoods => AppConfig::neighborhoods(),
                Variant::ZipCodes => AppConfig::zip_codes(),
            }),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch both datasets and write the map page, GeoJSON and CSV
    Render {
        #[command(flatten)]
        selection: Selection,

        /// Directory for the generated files (defaults to the config's output.dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Fetch both datasets and log per-region averages without writing files
    Summary {
        #[command(flatten)]
        selection: Selection,

        /// Log the feature collection as JSON instead of one line per region
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/inspection_choropleth.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("inspection_choropleth.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            selection,
            output_dir,
        } => render(&selection, output_dir).await,
        Commands::Summary { selection, json } => summary(&selection, json).await,
    };

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Pipeline failed; no map overlay was produced");
    }
    result
}

async fn render(selection: &Selection, output_dir: Option<PathBuf>) -> Result<()> {
    let config = selection.load()?;
    let client = pipeline::client_for(&config.fetch)?;

    let map = pipeline::run(&config, &client).await?;
    output::print_pretty(&map.stats);

    let dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
    let paths = output::write_outputs(&dir, &map, &config.presentation)?;

    info!(
        page = %paths.page.display(),
        geojson = %paths.geojson.display(),
        csv = %paths.csv.display(),
        regions = map.regions.len(),
        "Map rendered"
    );
    Ok(())
}

async fn summary(selection: &Selection, json: bool) -> Result<()> {
    let config = selection.load()?;
    let client = pipeline::client_for(&config.fetch)?;

    let map = pipeline::run(&config, &client).await?;

    if json {
        output::print_json(&map.feature_collection())?;
    } else {
        output::log_regions(&map);
    }
    output::print_json(&map.stats)?;
    Ok(())
}

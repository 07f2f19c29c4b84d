//! Pluvio CLI
//!
//! Command-line interface for Pluvio operations:
//! - Create the database and import the gauge network exports
//! - List stations
//! - Generate charts through the cache
//! - Print a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pluvio::api::ChartQuery;
use pluvio::cache::ArtifactCache;
use pluvio::chart::BitmapRenderer;
use pluvio::config::{generate_default_config, Config};
use pluvio::import::{ImportReport, MeasurementImporter, StationImporter};
use pluvio::station::StationDirectory;
use pluvio::store::Store;
use std::path::PathBuf;
use std::sync::Arc;

/// Rows written per transaction when importing measurements
const IMPORT_BATCH_SIZE: usize = 10_000;

#[derive(Parser)]
#[command(name = "pluvio-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rain-gauge station database and chart cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    InitDb,

    /// Import the station directory from CSV
    ImportStations {
        /// Path to CSV file
        path: PathBuf,
        /// Field delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },

    /// Import daily measurements from the wide CSV export
    ImportMeasurements {
        /// Path to CSV file
        path: PathBuf,
        /// Field delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: char,
        /// Date format of the `date` column (strftime format)
        #[arg(long, default_value = "%d/%m/%Y")]
        date_format: String,
    },

    /// List all stations
    Stations,

    /// Generate (or fetch from cache) a chart
    Chart {
        /// Station name
        station: String,
        /// Second station to compare with
        #[arg(long)]
        compare: Option<String>,
        /// First year (default range applies unless both bounds are given)
        #[arg(long)]
        start: Option<i32>,
        /// Last year
        #[arg(long)]
        end: Option<i32>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    pluvio::logging::init(&config.logging);

    match cli.command {
        Commands::InitDb => {
            let store = open_store(&config)?;
            println!("Database ready at {}", config.storage.database_path);
            drop(store);
        }

        Commands::ImportStations { path, delimiter } => {
            let store = open_store(&config)?;
            let (stations, report) = StationImporter::new()
                .with_delimiter(delimiter_byte(delimiter)?)
                .import_path(&path)
                .with_context(|| format!("reading {}", path.display()))?;

            let written = store.upsert_stations(&stations)?;
            print_report(&report);
            println!("Imported {} stations", written);
        }

        Commands::ImportMeasurements {
            path,
            delimiter,
            date_format,
        } => {
            let store = open_store(&config)?;
            let (measurements, report) = MeasurementImporter::new()
                .with_delimiter(delimiter_byte(delimiter)?)
                .with_date_format(&date_format)
                .import_path(&path)
                .with_context(|| format!("reading {}", path.display()))?;

            let mut written = 0;
            for batch in measurements.chunks(IMPORT_BATCH_SIZE) {
                written += store.upsert_measurements(batch)?;
            }
            print_report(&report);
            println!("Imported {} measurements", written);
        }

        Commands::Stations => {
            let store = open_store(&config)?;
            let stations = StationDirectory::new(store).list()?;

            println!("{:<12} {:<32} {:>10} {:>10}", "ID", "NAME", "LONG", "LAT");
            println!("{}", "-".repeat(67));
            for s in &stations {
                println!(
                    "{:<12} {:<32} {:>10.5} {:>10.5}",
                    s.id, s.name, s.longitude, s.latitude
                );
            }
            println!("\n{} stations", stations.len());
        }

        Commands::Chart {
            station,
            compare,
            start,
            end,
        } => {
            let store = open_store(&config)?;
            let cache = ArtifactCache::new(
                store,
                Arc::new(BitmapRenderer::new()),
                config.charts.to_cache_config(),
            );

            let key = ChartQuery {
                primary: station,
                secondary: compare,
                start,
                end,
            }
            .into_key();
            let artifact = cache.get_or_materialize(&key).await?;
            println!("{}", cache.artifact_file(&artifact).display());
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<Store>> {
    let store = Store::open(&config.storage.database_path)
        .with_context(|| format!("opening {}", config.storage.database_path))?;
    Ok(Arc::new(store))
}

fn delimiter_byte(delimiter: char) -> anyhow::Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got '{}'", delimiter);
    }
    Ok(delimiter as u8)
}

fn print_report(report: &ImportReport) {
    for error in &report.errors {
        eprintln!("  {}", error);
    }
    if report.rows_failed > 0 {
        eprintln!(
            "{} rows processed, {} rows skipped",
            report.rows_processed, report.rows_failed
        );
    }
}

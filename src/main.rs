//! CLI entry point for the ACS foreign-born rate extractor.
//!
//! Loads the DP02 extracts once, then exports filtered rows, per-tract rate
//! series, and subset aggregates as CSV.

use acs_rates::config::{MembershipSource, SourceManifest};
use acs_rates::dataset::Dataset;
use acs_rates::output::{write_aggregates, write_rates, write_years};
use acs_rates::rates::aggregate::aggregate_records;
use acs_rates::rates::series::build_tract_series;
use acs_rates::rates::subset::Subset;
use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "acs_rates")]
#[command(about = "Foreign-born rates per census tract from ACS DP02 extracts", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    /// Directory to write CSV reports to (created if missing)
    #[arg(short, long, global = true, default_value = "output")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory scanned for ACS_<yy>_5YR_DP02.{zip,csv,csv.gz} extracts
    #[arg(short, long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// JSON source manifest; replaces scanning the data directory
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// CSV listing urban tract ids
    #[arg(long, global = true)]
    urban: Option<PathBuf>,

    /// Column of the urban CSV holding the tract id
    #[arg(long, global = true, default_value_t = 0)]
    urban_column: usize,

    /// CSV listing the id2 of tracts within the study radius
    #[arg(long, global = true)]
    within_radius: Option<PathBuf>,

    /// Column of the within-radius CSV holding the tract id2
    #[arg(long, global = true, default_value_t = 0)]
    radius_column: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Write each year's filtered rows to <output_dir>/<year>.csv
    Extract,
    /// Write per-tract rates and year-over-year deltas to <output_dir>/rates.csv
    Rates,
    /// Write population-weighted subset rates to <output_dir>/aggregates.csv
    Aggregate {
        /// Subsets to aggregate
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "all")]
        subsets: Vec<Subset>,
    },
    /// Run extract, rates and aggregate (every subset whose lists are available)
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/acs_rates.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("acs_rates.log"));

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

    let manifest = build_manifest(&cli.sources)?;
    info!(years = ?manifest.years.keys().collect::<Vec<_>>(), "Loading extracts");

    let dataset = Dataset::load(&manifest).await?;
    let out = cli.output_dir.as_path();

    match cli.command {
        Commands::Extract => {
            write_years(out, &dataset.years).await?;
        }
        Commands::Rates => {
            write_tract_rates(out, &dataset)?;
        }
        Commands::Aggregate { subsets } => {
            write_subset_aggregates(out, &dataset, &subsets)?;
        }
        Commands::All => {
            let subsets: Vec<Subset> = Subset::ALL
                .into_iter()
                .filter(|s| {
                    let available = s.predicate(&dataset.memberships).is_ok();
                    if !available {
                        warn!(subset = %s, "Membership list missing, skipping subset");
                    }
                    available
                })
                .collect();

            let (years, rates, aggregates) = tokio::join!(
                write_years(out, &dataset.years),
                async { write_tract_rates(out, &dataset) },
                async { write_subset_aggregates(out, &dataset, &subsets) },
            );
            years?;
            rates?;
            aggregates?;
        }
    }

    info!(output_dir = %out.display(), "Done");
    Ok(())
}

/// Resolves the source manifest from `--manifest` or by scanning the data
/// directory, then applies the membership list flags on top.
fn build_manifest(args: &SourceArgs) -> Result<SourceManifest> {
    let manifest = match &args.manifest {
        Some(path) => {
            let manifest = SourceManifest::load(path)?;
            if manifest.years.is_empty() {
                bail!("manifest {} lists no years", path.display());
            }
            manifest
        }
        None => {
            let manifest = SourceManifest::discover(&args.data_dir)?;
            if manifest.years.is_empty() {
                bail!("no DP02 extracts found in {}", args.data_dir.display());
            }
            manifest
        }
    };

    Ok(manifest
        .with_urban(args.urban.clone().map(|path| MembershipSource {
            path,
            column: args.urban_column,
        }))
        .with_within_radius(args.within_radius.clone().map(|path| MembershipSource {
            path,
            column: args.radius_column,
        })))
}

#[tracing::instrument(skip(dataset), fields(output_dir = %out.display()))]
fn write_tract_rates(out: &Path, dataset: &Dataset) -> Result<()> {
    let series = build_tract_series(&dataset.years);
    info!(tracts = series.len(), "Tract series built");
    write_rates(out, &series)?;
    Ok(())
}

#[tracing::instrument(skip(dataset), fields(output_dir = %out.display()))]
fn write_subset_aggregates(out: &Path, dataset: &Dataset, subsets: &[Subset]) -> Result<()> {
    let records = aggregate_records(dataset, subsets)?;
    for r in &records {
        info!(subset = %r.subset, year = r.year, total = r.total, foreign = r.foreign, rate = r.rate, "Aggregate rate");
    }
    write_aggregates(out, &records)?;
    Ok(())
}

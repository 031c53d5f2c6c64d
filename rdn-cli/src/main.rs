//! RDN CLI: fetch, convert, pivot and inspect commands.
//!
//! Commands:
//! - `fetch`: scrape every delivery day of a month and write the canonical CSV
//! - `convert`: turn archived result workbooks into the canonical CSV
//! - `pivot`: write the day × hour price matrix of a canonical file
//! - `inspect`: report counts, date range, gaps and sidecar status of a file

use anyhow::{anyhow, bail, Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rdn_core::config::{RdnConfig, SiteLayout};
use rdn_core::data::csv_store::verify_hash;
use rdn_core::data::normalize::check_within_period;
use rdn_core::data::{
    check_completeness, discover_archive_files, fetch_month, normalize, pivot_complete_month,
    pivot_month, read_archive, read_csv, read_meta, write_csv_atomic, DataSource, DuplicatePolicy,
    FetchOptions, LogProgress, PriceSummary, WebTableProvider,
};
use rdn_core::domain::{HourlyPriceRecord, Period};

#[derive(Parser)]
#[command(
    name = "rdn",
    version,
    about = "RDN CLI: day-ahead hourly electricity price ingestion"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every delivery day of a month from the exchange website.
    Fetch {
        /// Month number (1-12).
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,

        /// Year. Defaults to the current year.
        #[arg(long)]
        year: Option<i32>,

        /// Page layout. Overrides the config file.
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory. Overrides the config file.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Try every day and report all failures before aborting.
        #[arg(long, default_value_t = false)]
        keep_going: bool,

        /// Write the file even if some hourly slots are missing.
        #[arg(long, default_value_t = false)]
        allow_incomplete: bool,
    },
    /// Convert archived result workbooks of a month.
    Convert {
        /// Month number (1-12).
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,

        /// Year. Defaults to the current year.
        #[arg(long)]
        year: Option<i32>,

        /// Directory holding the daily workbooks.
        #[arg(long, default_value = "archiwum")]
        archive_dir: PathBuf,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory. Overrides the config file.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Write the file even if some hourly slots are missing.
        #[arg(long, default_value_t = false)]
        allow_incomplete: bool,
    },
    /// Write the day × hour price matrix of a canonical file.
    Pivot {
        /// Canonical CSV file.
        csv: PathBuf,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = PivotFormat::Csv)]
        format: PivotFormat,

        /// Refuse to pivot a month with missing hourly slots.
        #[arg(long, default_value_t = false)]
        require_complete: bool,
    },
    /// Report record count, date range, price summary, gaps and sidecar status.
    Inspect {
        /// Canonical CSV file.
        csv: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    New,
    Old,
}

impl From<LayoutArg> for SiteLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::New => SiteLayout::New,
            LayoutArg::Old => SiteLayout::Old,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PivotFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            month,
            year,
            layout,
            config,
            out_dir,
            keep_going,
            allow_incomplete,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(layout) = layout {
                config.web.layout = layout.into();
            }
            if let Some(dir) = out_dir {
                config.output.dir = dir;
            }
            run_fetch(resolve_period(month, year)?, &config, keep_going, allow_incomplete)
        }
        Commands::Convert {
            month,
            year,
            archive_dir,
            config,
            out_dir,
            allow_incomplete,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = out_dir {
                config.output.dir = dir;
            }
            run_convert(resolve_period(month, year)?, &archive_dir, &config, allow_incomplete)
        }
        Commands::Pivot {
            csv,
            out,
            format,
            require_complete,
        } => run_pivot(&csv, out.as_deref(), format, require_complete),
        Commands::Inspect { csv } => run_inspect(&csv),
    }
}

fn load_config(path: Option<&Path>) -> Result<RdnConfig> {
    match path {
        Some(path) => RdnConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RdnConfig::default()),
    }
}

fn resolve_period(month: u32, year: Option<i32>) -> Result<Period> {
    let year = year.unwrap_or_else(|| chrono::Local::now().year());
    Ok(Period::new(year, month)?)
}

fn run_fetch(period: Period, config: &RdnConfig, keep_going: bool, allow_incomplete: bool) -> Result<()> {
    let provider = WebTableProvider::from_config(&config.web)?;
    info!(%period, layout = ?config.web.layout, "fetching month");

    let options = FetchOptions::from_config(&config.web, keep_going);
    let summary = fetch_month(&provider, period, options, &LogProgress)
        .with_context(|| format!("fetching {period}; nothing written"))?;

    if !summary.all_succeeded() {
        for (date, err) in &summary.failures {
            error!(%date, "{err}");
        }
        bail!(
            "{} of {} days failed for {period}; nothing written",
            summary.failures.len(),
            summary.days_requested
        );
    }

    let path = config.output.dir.join(period.canonical_file_name());
    write_month(summary.records, period, config, allow_incomplete, DataSource::WebTable, &path)
}

fn run_convert(
    period: Period,
    archive_dir: &Path,
    config: &RdnConfig,
    allow_incomplete: bool,
) -> Result<()> {
    let files = discover_archive_files(archive_dir, period, &config.spreadsheet.file_prefix)?;
    if files.is_empty() {
        bail!("no archive workbooks for {period} in {}", archive_dir.display());
    }
    info!(%period, files = files.len(), "converting archive");

    let load = read_archive(&files, &config.spreadsheet)?;
    for report in &load.files {
        let name = report
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{name}: {} hours ({} rows skipped)", report.records, report.skipped);
    }

    let path = config.output.dir.join(period.spreadsheet_file_name());
    write_month(load.records, period, config, allow_incomplete, DataSource::Spreadsheet, &path)
}

/// Normalize, gate and write one month; print the run summary.
fn write_month(
    records: Vec<HourlyPriceRecord>,
    period: Period,
    config: &RdnConfig,
    allow_incomplete: bool,
    source: DataSource,
    path: &Path,
) -> Result<()> {
    let normalized = normalize(records, config.validation.duplicate_policy)?;
    for key in &normalized.dropped_duplicates {
        warn!(%key, "dropped duplicate record");
    }

    if config.validation.require_complete_month && !allow_incomplete {
        check_completeness(&normalized.records, period)?;
    } else {
        check_within_period(&normalized.records, period)?;
    }

    let meta = write_csv_atomic(path, &normalized.records, source, Some(period))
        .with_context(|| format!("writing {}", path.display()))?;

    println!("Wrote {} ({} records)", path.display(), meta.record_count);
    println!("{}", PriceSummary::from_records(&normalized.records));
    Ok(())
}

fn run_pivot(csv: &Path, out: Option<&Path>, format: PivotFormat, require_complete: bool) -> Result<()> {
    let records = read_csv(csv).with_context(|| format!("reading {}", csv.display()))?;

    let matrix = if require_complete {
        let period = records
            .first()
            .map(|r| Period::of(r.trade_date))
            .ok_or_else(|| anyhow!("{} has no records", csv.display()))?;
        pivot_complete_month(&records, period)?
    } else {
        pivot_month(&records)?
    };

    if let Some((min, max)) = matrix.min_max() {
        info!(period = %matrix.period(), days = matrix.days().len(), min, max, "pivoted");
    }

    let text = match format {
        PivotFormat::Csv => matrix.to_csv_string()?,
        PivotFormat::Json => matrix.to_json()?,
    };

    match out {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn run_inspect(csv: &Path) -> Result<()> {
    let records = read_csv(csv).with_context(|| format!("reading {}", csv.display()))?;

    println!("File: {}", csv.display());
    println!("Records: {}", records.len());

    let first = records.iter().map(|r| r.trade_date).min();
    let last = records.iter().map(|r| r.trade_date).max();
    if let (Some(first), Some(last)) = (first, last) {
        println!("Dates: {first} .. {last}");
    }
    println!("Prices: {}", PriceSummary::from_records(&records));

    if let Err(e) = normalize(records.clone(), DuplicatePolicy::Reject) {
        println!("Duplicates: {e}");
    }

    if let Some(first) = first {
        let period = Period::of(first);
        match check_completeness(&records, period) {
            Ok(()) => println!("Month {period}: complete ({} records)", period.expected_records()),
            Err(e) => println!("Month {period}: {e}"),
        }
    }

    match read_meta(csv) {
        Some(meta) => {
            let hash = if verify_hash(csv, &meta)? { "ok" } else { "MISMATCH" };
            println!(
                "Sidecar: source={}, written_at={}, records={}, hash {hash}",
                meta.source, meta.written_at, meta.record_count
            );
        }
        None => println!("Sidecar: none"),
    }
    Ok(())
}

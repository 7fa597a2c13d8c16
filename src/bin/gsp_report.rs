//! Build the GSP delivery report from a listing of the delivery bucket.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use sarpack::core::report::read_listing;
use sarpack::core::{build_report, write_report, ReportConfig, ReportFormat};

#[derive(Parser)]
#[command(author, version, about = "Create a report of the products listed in the delivery bucket", long_about = None)]
struct Args {
    /// Text file with one object key per line
    listing: PathBuf,

    /// Keep only keys containing this sub-directory
    #[arg(short = 'S', long = "sub_dir")]
    sub_dir: Option<String>,

    /// Output directory
    #[arg(short = 'O', long = "out_dir", default_value = ".")]
    out_dir: PathBuf,

    /// Report format: csv or txt
    #[arg(short = 'F', long, default_value = "csv")]
    format: ReportFormat,

    /// Delivery date written for every product (YYYY-MM-DD)
    #[arg(long = "delivery_date", default_value = "2024-03-15")]
    delivery_date: NaiveDate,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    let config = ReportConfig {
        sub_dir: args.sub_dir,
        out_dir: args.out_dir,
        format: args.format,
        delivery_date: args.delivery_date,
        report_date: Local::now().date_naive(),
    };

    let keys = read_listing(&args.listing)
        .with_context(|| format!("Failed to read listing {}", args.listing.display()))?;
    let rows = build_report(keys.iter().map(String::as_str), &config)?;
    let path = write_report(&rows, &config)
        .with_context(|| format!("Failed to write report to {}", config.out_dir.display()))?;

    log::info!("{} products reported in {}", rows.len(), path.display());
    log::info!("Computation Time: {:.2?}", start.elapsed());
    Ok(())
}

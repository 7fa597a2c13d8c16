//! Merge the burst products of a track into single deliverables, one per
//! calibration type.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use sarpack::core::{merge_bursts, MergeConfig};
use sarpack::OutputFormat;

#[derive(Parser)]
#[command(author, version, about = "Merge GSP Bursts belonging to track into a single Product", long_about = None)]
struct Args {
    /// Index file containing the list of bursts available over the AOI
    index_file: PathBuf,

    /// Output directory where the results will be saved
    #[arg(short = 'D', long = "out_dir", default_value = ".")]
    out_dir: PathBuf,

    /// Clip the output to this AOI
    #[arg(short = 'C', long = "clip_aoi")]
    clip_aoi: Option<PathBuf>,

    /// Output format: csv or shp
    #[arg(short = 'F', long, default_value = "csv")]
    format: OutputFormat,

    /// Merge only this track
    #[arg(short = 'T', long)]
    track: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    let config = MergeConfig {
        index_file: args.index_file,
        out_dir: args.out_dir,
        clip_aoi: args.clip_aoi,
        format: args.format,
        track: args.track,
    };
    let products = merge_bursts(&config)
        .with_context(|| format!("Failed to merge bursts of {}", config.index_file.display()))?;

    for product in &products {
        log::info!(
            "{}: {} points from {} bursts",
            product.archive.display(),
            product.records,
            product.sources
        );
    }
    log::info!("Computation Time: {:.2?}", start.elapsed());
    Ok(())
}

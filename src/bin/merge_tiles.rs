//! Merge the 2D deformation tiles of an AOI into East-West and Vertical deliverables.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use sarpack::core::{merge_tiles, MergeConfig};
use sarpack::OutputFormat;

#[derive(Parser)]
#[command(author, version, about = "Merge GSP 2D Deformation Tiles (East-West and Vertical) into a single Product", long_about = None)]
struct Args {
    /// Index file containing the list of Tiles available over the AOI
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
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    let mut config = MergeConfig::new(args.index_file, args.out_dir);
    config.clip_aoi = args.clip_aoi;
    config.format = args.format;

    let products = merge_tiles(&config)
        .with_context(|| format!("Failed to merge tiles of {}", config.index_file.display()))?;

    for product in &products {
        log::info!(
            "{}: {} points from {} tiles",
            product.archive.display(),
            product.records,
            product.sources
        );
    }
    log::info!("Computation Time: {:.2?}", start.elapsed());
    Ok(())
}

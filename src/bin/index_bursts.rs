//! Identify the Sentinel-1 bursts covering an area of interest and save the
//! burst index to an ESRI shapefile.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use sarpack::core::{index_bursts, BurstIndexConfig};

#[derive(Parser)]
#[command(author, version, about = "Identify bursts of the same satellite track covering the selected area of interest", long_about = None)]
struct Args {
    /// Path to the Sentinel-1 burst catalog shapefile
    burst_file: PathBuf,

    /// Path to the area of interest shapefile
    aoi: PathBuf,

    /// Directory containing the Sentinel-1 burst archives
    #[arg(short = 'D', long = "burst_dir", default_value = ".")]
    burst_dir: PathBuf,

    /// Output directory [default: <burst_dir>/../AOIs_bursts]
    #[arg(short = 'O', long = "out_dir")]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    let config = BurstIndexConfig {
        catalog: args.burst_file,
        aoi: args.aoi,
        burst_dir: args.burst_dir,
        out_dir: args.out_dir,
    };
    let summary = index_bursts(&config)
        .with_context(|| format!("Failed to index bursts for {}", config.aoi.display()))?;

    log::info!(
        "{} bursts intersect the AOI, {} index records written to {}",
        summary.matched,
        summary.records,
        summary.output.display()
    );
    log::info!("Computation Time: {:.2?}", start.elapsed());
    Ok(())
}

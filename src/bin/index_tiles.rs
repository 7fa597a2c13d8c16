//! Identify the 2D deformation tiles covering an area of interest and save the
//! tile index to an ESRI shapefile.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use sarpack::core::{index_tiles, TileIndexConfig};

#[derive(Parser)]
#[command(author, version, about = "Identify S3-01-SNT-03 Tiles covering the selected area of interest", long_about = None)]
struct Args {
    /// Path to the tile grid shapefile
    tile_file: PathBuf,

    /// Path to the area of interest shapefile
    aoi: PathBuf,

    /// Directory containing the tile archives
    #[arg(short = 'T', long = "tile_dir", default_value = ".")]
    tile_dir: PathBuf,

    /// Output directory [default: <tile_dir>/../AOIs_tiles]
    #[arg(short = 'O', long = "out_dir")]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    let config = TileIndexConfig {
        catalog: args.tile_file,
        aoi: args.aoi,
        tile_dir: args.tile_dir,
        out_dir: args.out_dir,
    };
    let summary = index_tiles(&config)
        .with_context(|| format!("Failed to index tiles for {}", config.aoi.display()))?;

    log::info!(
        "{} tiles intersect the AOI, {} index records written to {}",
        summary.matched,
        summary.records,
        summary.output.display()
    );
    log::info!("Computation Time: {:.2?}", start.elapsed());
    Ok(())
}

//! Re-pack every provider archive of a directory so that its XML and CSV
//! members sit at the root of the new archive.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use sarpack::core::index::list_archives;
use sarpack::io::flatten_archive;

#[derive(Parser)]
#[command(author, version, about = "Save the XML and CSV members of every zip file without the original directory structure", long_about = None)]
struct Args {
    /// Input directory containing the zip files
    in_dir: PathBuf,

    /// Output directory where the results will be saved
    #[arg(short = 'D', long = "out_dir", default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start = Instant::now();
    let args = Args::parse();

    if !args.in_dir.is_dir() {
        bail!("Input directory {} does not exist", args.in_dir.display());
    }

    let archives = list_archives(&args.in_dir)?;
    for name in &archives {
        let path = args.in_dir.join(name);
        flatten_archive(&path, &args.out_dir)
            .with_context(|| format!("Failed to flatten {}", path.display()))?;
    }

    log::info!("{} archives flattened into {}", archives.len(), args.out_dir.display());
    log::info!("Computation Time: {:.2?}", start.elapsed());
    Ok(())
}

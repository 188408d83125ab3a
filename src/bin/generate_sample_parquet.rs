//! Sample catalog generator
//!
//! Writes a parquet file of mock galaxies in the catalog column layout, for
//! trying the ingester without real survey data.
//!
//! Usage:
//!   cargo run --bin generate_sample_parquet -- [--output sample_galaxies.parquet] [--count 100]

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use galaxy_ingest::mock::{write_sample_parquet, MockGalaxyConfig, MockIdScheme};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate a sample parquet file with mock galaxy data",
    long_about = None
)]
struct Args {
    /// Output parquet file path
    #[arg(short, long, default_value = "sample_galaxies.parquet")]
    output: PathBuf,

    /// Number of galaxies to generate
    #[arg(short, long, default_value_t = 100)]
    count: usize,

    /// Random seed for reproducible files
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Generating {} sample galaxies...", args.count);
    let mut config = MockGalaxyConfig::new()
        .with_count(args.count)
        .with_id_scheme(MockIdScheme::Sequential);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    let rows = config.generate();

    write_sample_parquet(&args.output, &rows)?;
    let size = fs::metadata(&args.output)?.len();

    println!("Generated {} galaxies", rows.len());
    println!("Saved to: {}", args.output.display());
    println!("File size: {:.1} KB", size as f64 / 1024.0);
    println!();
    println!("You can now test the loader with:");
    println!(
        "  cargo run --bin ingest_galaxies -- --parquet-file {} --dry-run",
        args.output.display()
    );

    Ok(())
}

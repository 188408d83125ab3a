//! Mock galaxy ingester
//!
//! Generates a handful of random galaxies and sends them to the ingestion
//! endpoint as a single batch. Useful for checking a deployment end to end.
//!
//! Usage:
//!   cargo run --bin ingest_mock -- [--count 5] [--seed 42] [--dry-run]

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{ArgAction, Parser};
use galaxy_ingest::client::batch_payload;
use galaxy_ingest::config::load_configuration;
use galaxy_ingest::logging::init_logging;
use galaxy_ingest::mapping::multiband_mapping;
use galaxy_ingest::mock::MockGalaxyConfig;
use galaxy_ingest::{prepare_row, BatchSink, HttpIngestClient, ShapedRecord};
use serde_json::Value;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Send a batch of mock galaxies to the ingestion endpoint",
    long_about = None
)]
struct Args {
    /// Number of galaxies to generate
    #[arg(long, default_value_t = 5)]
    count: usize,

    /// Random seed for reproducible values
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    convex_http_actions_url: Option<String>,

    #[arg(long)]
    ingest_token: Option<String>,

    #[arg(long)]
    dot_env_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Print the payload instead of sending it
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut mock = MockGalaxyConfig::new().with_count(args.count);
    if let Some(seed) = args.seed {
        mock = mock.with_seed(seed);
    }

    let mapping = multiband_mapping();
    let galaxies = mock
        .generate()
        .iter()
        .enumerate()
        .map(|(i, row)| prepare_row(row, &mapping, i))
        .collect::<galaxy_ingest::Result<Vec<ShapedRecord>>>()?;

    if args.dry_run {
        let payload: Value = serde_json::from_str(&batch_payload(&galaxies)?)?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let config = load_configuration(
        args.convex_http_actions_url,
        args.ingest_token,
        args.dot_env_file.as_deref(),
    )?;
    let mut client = HttpIngestClient::new(&config, Duration::from_secs(args.timeout_secs))?;

    println!("Sending {} galaxies to {} ...", galaxies.len(), client.url());
    let response = client.send(&galaxies)?;

    println!("Status: {}", response.status);
    match serde_json::from_str::<Value>(&response.body) {
        Ok(json) => println!("Response: {}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("Raw response: {}", response.body),
    }

    if !response.is_success() {
        process::exit(1);
    }
    Ok(())
}

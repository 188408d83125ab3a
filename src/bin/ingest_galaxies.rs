//! Galaxy catalog ingester
//!
//! Reads a parquet or CSV catalog, maps each row onto the ingestion schema and
//! uploads the rows in batches. A failed batch stops the run (unless
//! `--continue-on-error` is given) and the summary names the `--offset` to
//! resume from.
//!
//! Usage:
//!   cargo run --bin ingest_galaxies -- --parquet-file galaxies.parquet [--dry-run]

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{ArgAction, Parser};
use galaxy_ingest::config::load_configuration;
use galaxy_ingest::logging::init_logging;
use galaxy_ingest::prompt::confirm_stdin;
use galaxy_ingest::uploader::EXIT_FAILURE;
use galaxy_ingest::{
    open_catalog, HttpIngestClient, MappingProfile, RunOutcome, UploadOptions, Uploader,
};
use log::{error, info};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Ingest galaxies from a parquet or CSV catalog into the galaxy database",
    long_about = None
)]
struct Args {
    /// Catalog to ingest (.parquet, .csv or .csv.gz)
    #[arg(long, visible_alias = "input", required_unless_present = "dump_mapping")]
    parquet_file: Option<PathBuf>,

    /// Base URL of the HTTP actions deployment
    #[arg(long)]
    convex_http_actions_url: Option<String>,

    /// Bearer token for the ingestion route
    #[arg(long)]
    ingest_token: Option<String>,

    /// Dotenv file to read configuration from (defaults to ./.env)
    #[arg(long)]
    dot_env_file: Option<PathBuf>,

    /// Galaxies per request
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: u64,

    /// Read and map everything but send nothing
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// First input row to process
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Maximum number of rows to process (0 means all)
    #[arg(long)]
    limit: Option<usize>,

    /// Keep going after a failed batch or row
    #[arg(long, action = ArgAction::SetTrue)]
    continue_on_error: bool,

    /// Column layout of the input catalog
    #[arg(long, value_enum, default_value_t = MappingProfile::Multiband)]
    mapping: MappingProfile,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Skip the confirmation prompt
    #[arg(short, long, action = ArgAction::SetTrue)]
    yes: bool,

    /// Print the selected mapping table as JSON and exit
    #[arg(long, action = ArgAction::SetTrue)]
    dump_mapping: bool,

    /// Debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let code = match run(&args) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("{}", e);
            EXIT_FAILURE
        }
    };
    process::exit(code);
}

fn run(args: &Args) -> Result<RunOutcome> {
    let mapping = args.mapping.table();
    if args.dump_mapping {
        println!("{}", serde_json::to_string_pretty(&mapping)?);
        return Ok(RunOutcome::MappingDumped);
    }

    let input = args.parquet_file.as_ref().ok_or("No input file given")?;

    let config = load_configuration(
        args.convex_http_actions_url.clone(),
        args.ingest_token.clone(),
        args.dot_env_file.as_deref(),
    )?;

    let table = open_catalog(input, args.offset, args.limit)?;

    let total = table.total_rows;
    if total == 0 {
        info!("No rows to ingest");
        return Ok(RunOutcome::NothingToDo);
    }

    if args.dry_run {
        info!("Dry run: {} galaxies will be mapped but not sent", total);
    } else if !args.yes {
        let question = format!("Proceed ingesting {} galaxies?", total);
        if !confirm_stdin(&question)? {
            info!("Aborted by user");
            return Ok(RunOutcome::Declined);
        }
    }

    let client = HttpIngestClient::new(&config, Duration::from_secs(args.timeout_secs))?;
    info!("Target endpoint: {}", client.url());

    let options = UploadOptions::new()
        .with_batch_size(args.batch_size as usize)
        .with_dry_run(args.dry_run)
        .with_continue_on_error(args.continue_on_error)
        .with_global_offset(args.offset);

    let mut uploader = Uploader::new(client, options);
    let stats = uploader.run(table, total, &mapping)?;
    Ok(RunOutcome::Finished(stats))
}

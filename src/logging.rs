//! Logger setup shared by the binaries

use log::LevelFilter;
use std::io::Write;

/// Default level for a run
pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install `env_logger` with `timestamp - target - LEVEL - message` lines.
///
/// `RUST_LOG`, when set, overrides the level chosen by `verbose`. Calling this
/// more than once is harmless.
pub fn init_logging(verbose: bool) {
    let _ = env_logger::Builder::new()
        .filter_level(default_level(verbose))
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .try_init();
}

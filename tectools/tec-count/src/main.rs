//! Entry point for tec-count
//!
//! Loads and validates the run settings, sizes the worker pool and
//! drives the chunk pipeline from tag counting to the merged
//! per-sample count table.

use clap::Parser;
use log::{error, info, Level};
use simple_logger::init_with_level;

use tec_count::cli::Args;

fn main() {
    let start = std::time::Instant::now();
    init_with_level(Level::Info).unwrap();

    let args: Args = Args::parse();

    args.check().unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .unwrap();

    tec_count::core::run(args).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}

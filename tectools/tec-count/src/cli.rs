use clap::Parser;
use std::path::PathBuf;

use config::{validate, CliError};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(
        short = 'c',
        long = "config",
        required = true,
        value_name = "PATH",
        num_args = 1,
        help = "Path to the YAML run settings"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'o',
        long = "outdir",
        required = false,
        value_name = "PATH",
        num_args = 1,
        help = "Path to output directory",
        default_value = "."
    )]
    pub outdir: PathBuf,

    #[arg(
        short = 't',
        long = "threads",
        help = "Number of threads",
        value_name = "THREADS",
        default_value_t = num_cpus::get()
    )]
    pub threads: usize,
}

impl Args {
    pub fn check(&self) -> Result<(), CliError> {
        validate(&self.config)
    }
}

//! Umbrella launcher for the tectools suite
//!
//! `tectools <tool> -- <args>` forwards the trailing arguments to the
//! matching subtool binary built in the workspace release directory.
//! Clusters that install a single binary on PATH get one entry point;
//! the subtools stay independent and keep their own argument surfaces.
//! Standard streams are inherited, so `tectools tec-count -- --help`
//! prints the subtool's help directly.

use clap::{Parser, Subcommand};
use log::{error, Level};
use simple_logger::init_with_level;

use std::path::PathBuf;
use std::process::{Command, ExitCode};

#[derive(Parser)]
#[command(name = "tectools")]
#[command(version, about = "differential 3'-end transcript counting")]
struct Cli {
    #[command(subcommand)]
    tool: Tool,
}

#[derive(Subcommand)]
enum Tool {
    /// Run the chunk-parallel counting pipeline
    #[command(name = "tec-count")]
    Count {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Downsample an aligned read file, keeping mate pairs intact
    #[command(name = "tec-sample")]
    Sample {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Tool {
    fn binary(&self) -> &'static str {
        match self {
            Tool::Count { .. } => "tec-count",
            Tool::Sample { .. } => "tec-sample",
        }
    }

    fn into_args(self) -> Vec<String> {
        match self {
            Tool::Count { args } | Tool::Sample { args } => args,
        }
    }
}

// entry/ sits one level below the workspace root
fn release_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("ERROR: could not locate workspace root")
        .join("target/release")
}

fn main() -> ExitCode {
    init_with_level(Level::Info).unwrap();

    let cli = Cli::parse();
    let binary = release_dir().join(cli.tool.binary());

    let status = Command::new(&binary)
        .args(cli.tool.into_args())
        .status()
        .unwrap_or_else(|e| {
            error!("could not launch {:?}: {}", binary, e);
            std::process::exit(1);
        });

    match status.code() {
        Some(0) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

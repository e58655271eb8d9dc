use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use config::{validate, CliError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PairSense {
    /// Pairs by flag only
    Paired,
    /// Pairs with both mates mapped
    Mapped,
    /// Properly paired in the aligner's sense
    Proper,
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(
        short = 'b',
        long = "bam",
        required = true,
        value_name = "PATH",
        num_args = 1,
        help = "Path to the source BAM file"
    )]
    pub bam: PathBuf,

    #[arg(
        short = 'o',
        long = "output",
        required = true,
        value_name = "PATH",
        num_args = 1,
        help = "Path to the downsampled BAM file"
    )]
    pub output: PathBuf,

    #[arg(
        short = 'n',
        long = "target",
        required = true,
        value_name = "PAIRS",
        help = "Number of pairs to retain"
    )]
    pub target: u64,

    #[arg(
        long = "source",
        required = false,
        value_name = "PAIRS",
        help = "Pair count of the source; estimated from the index when omitted"
    )]
    pub source: Option<u64>,

    #[arg(
        long = "sense",
        value_enum,
        default_value_t = PairSense::Paired,
        value_name = "SENSE",
        help = "Which records count as a pair"
    )]
    pub sense: PairSense,

    #[arg(
        long = "seed",
        value_name = "SEED",
        default_value_t = 0,
        help = "RNG seed for reproducible retention"
    )]
    pub seed: u64,
}

impl Args {
    pub fn check(&self) -> Result<(), CliError> {
        if self.target == 0 {
            return Err(CliError::InvalidInput(
                "ERROR: target must be a positive pair count".to_string(),
            ));
        }
        validate(&self.bam)
    }
}

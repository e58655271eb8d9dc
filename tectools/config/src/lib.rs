//! Shared configuration layer for the tectools pipeline
//!
//! This crate holds everything the subtools agree on: universal
//! constants, the run-settings file and its validation, the strand
//! type used across every stage, and small quality-of-life helpers
//! (progress bars, file writers, path validation).

use serde::{Deserialize, Serialize};

pub mod fns;
pub mod settings;

pub use fns::*;
pub use settings::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// numeric values
pub const MAX_RUN_NAME_LEN: usize = 128;
pub const DEFAULT_BIN_SIZE: u64 = 100;
pub const DEFAULT_PEAK_BUFFER: u64 = 100;
pub const DEFAULT_MISMATCH_THRESHOLD: u32 = 0;
pub const DEFAULT_SIG_LEVEL: f64 = 0.001;
pub const DEFAULT_READ2_LENGTH: u64 = 50;
pub const MIN_END_READS: u64 = 4;
pub const POLYA_WINDOW: u64 = 10;
pub const POLYA_LEADING_A: usize = 4;
pub const POLYA_MAX_A: usize = 6;

// file names
pub const ARTIFACT_DIR: &str = "artifacts";
pub const COUNTS_TABLE: &str = "counts.tsv";

/// Alignment strand, printed as `+1` / `-1` in every table the
/// pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }

    pub fn as_i8(&self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+1"),
            Strand::Reverse => write!(f, "-1"),
        }
    }
}

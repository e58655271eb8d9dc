//! Core module for mate-paired downsampling
//!
//! The source file is streamed once. The first record of each pair
//! rolls the dice with probability `target / source`; the decision is
//! memoized by read name so the sibling mate shares its fate, and the
//! memo entry is evicted as soon as both mates have been handled to
//! bound memory. Retention stops once the target pair count is
//! reached. The output keeps the source header.

use hashbrown::HashMap;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_htslib::bam::{self, Read};
use thiserror::Error;

use crate::cli::{Args, PairSense};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Alignment file error: {0}")]
    Hts(#[from] rust_htslib::errors::Error),
}

impl PairSense {
    fn admits(&self, record: &bam::Record) -> bool {
        match self {
            PairSense::Paired => record.is_paired(),
            PairSense::Mapped => {
                record.is_paired() && !record.is_unmapped() && !record.is_mate_unmapped()
            }
            PairSense::Proper => record.is_paired() && record.is_proper_pair(),
        }
    }
}

/// First-sight retention decisions with mate memoization.
struct PairDecider {
    target: u64,
    probability: f64,
    rng: StdRng,
    pending: HashMap<Vec<u8>, bool>,
    accepted: u64,
    open_kept: u64,
}

impl PairDecider {
    fn new(target: u64, source: u64, seed: u64) -> Self {
        let probability = if source == 0 {
            0.0
        } else {
            (target as f64 / source as f64).min(1.0)
        };

        PairDecider {
            target,
            probability,
            rng: StdRng::seed_from_u64(seed),
            pending: HashMap::new(),
            accepted: 0,
            open_kept: 0,
        }
    }

    /// Whether to write this record. The second sighting of a name
    /// evicts its memo entry.
    fn decide(&mut self, name: &[u8]) -> bool {
        match self.pending.remove(name) {
            Some(keep) => {
                if keep {
                    self.open_kept -= 1;
                }
                keep
            }
            None => {
                let keep = self.accepted < self.target && self.rng.gen_bool(self.probability);
                if keep {
                    self.accepted += 1;
                    self.open_kept += 1;
                }
                self.pending.insert(name.to_vec(), keep);
                keep
            }
        }
    }

    /// True once the target is met and no kept mate is outstanding.
    fn saturated(&self) -> bool {
        self.accepted >= self.target && self.open_kept == 0
    }
}

/// Pair count of the source, estimated from the index.
fn source_pairs(bam: &std::path::Path) -> Result<u64, SampleError> {
    let mut reader = bam::IndexedReader::from_path(bam)?;
    let stats = reader.index_stats()?;

    let records: u64 = stats
        .iter()
        .map(|(_, _, mapped, unmapped)| mapped + unmapped)
        .sum();

    Ok(records / 2)
}

/// Stream the source once and write the retained pairs.
pub fn downsample(args: &Args) -> Result<(), SampleError> {
    let source = match args.source {
        Some(pairs) => pairs,
        None => {
            let estimated = source_pairs(&args.bam)?;
            info!("Estimated {} source pairs from the index", estimated);
            estimated
        }
    };

    if source == 0 {
        return Err(SampleError::Invalid(
            "source contains no pairs".to_string(),
        ));
    }

    let mut reader = bam::Reader::from_path(&args.bam)?;
    let header = bam::Header::from_template(reader.header());
    let mut writer = bam::Writer::from_path(&args.output, &header, bam::Format::Bam)?;

    let mut decider = PairDecider::new(args.target, source, args.seed);
    let mut record = bam::Record::new();

    while let Some(result) = reader.read(&mut record) {
        result?;

        if record.is_secondary() || record.is_supplementary() {
            continue;
        }
        if !args.sense.admits(&record) {
            continue;
        }

        if decider.decide(record.qname()) {
            writer.write(&record)?;
        }

        if decider.saturated() {
            break;
        }
    }

    info!(
        "Retained {} of {} pairs (target {})",
        decider.accepted, source, args.target
    );

    Ok(())
}

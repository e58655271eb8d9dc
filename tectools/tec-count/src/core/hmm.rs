//! Segmentation driver
//!
//! Binned read counts are handed to an external segmentation binary,
//! one invocation per chunk, over a deterministic line protocol:
//! stdin carries a header per (reference, strand) track followed by
//! `bin<TAB>count` lines; stdout answers one
//! `reference<TAB>strand<TAB>bin<TAB>state<TAB>log_prob` line per bin.
//! The model sits behind a trait so tests substitute canned state
//! assignments. Contiguous positive-state bins join into regions.

use serde::{Deserialize, Serialize};

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::core::bins::BinTrack;
use crate::core::peaks::Peak;
use crate::core::PipelineError;
use config::Strand;

/// Per-reference summary handed to the segmentation model next to the
/// binned counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefSummary {
    pub total_bp: u64,
    pub read_length: u64,
    pub sig_level: f64,
    pub bin_size: u64,
}

/// One (reference, strand) track of binned counts under peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedTrack {
    pub reference: String,
    pub strand: Strand,
    pub summary: RefSummary,
    pub bins: BinTrack,
}

/// One bin's state assignment as reported by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct BinState {
    pub reference: String,
    pub strand: Strand,
    pub bin: u64,
    pub positive: bool,
    pub log_prob: f64,
}

/// A candidate transcript footprint joined from positive bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub start: u64,
    pub end: u64,
    pub max_count: u64,
    pub log_prob: f64,
    pub strand: Strand,
}

/// Assigns a state to every bin of every track of one chunk.
pub trait SegmentationModel {
    fn assign_states(&self, tracks: &[BinnedTrack]) -> Result<Vec<BinState>, PipelineError>;
}

/// Production model: the external binary, one subprocess per chunk.
/// Non-zero exit is fatal.
pub struct HmmProcess {
    pub binary: PathBuf,
}

impl HmmProcess {
    pub fn new(binary: PathBuf) -> Self {
        HmmProcess { binary }
    }

    fn encode(tracks: &[BinnedTrack]) -> String {
        let mut payload = String::new();

        for track in tracks {
            payload.push_str(&format!(
                ">{}\t{}\t{}\t{}\t{}\t{}\n",
                track.reference,
                track.strand,
                track.summary.total_bp,
                track.summary.read_length,
                track.summary.sig_level,
                track.summary.bin_size,
            ));
            for (bin, count) in &track.bins {
                payload.push_str(&format!("{}\t{}\n", bin, count));
            }
        }

        payload
    }

    fn decode(stdout: &str) -> Result<Vec<BinState>, PipelineError> {
        let mut states = Vec::new();

        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 5 {
                return Err(PipelineError::mismatch(
                    "segmentation output",
                    format!("malformed state line '{}'", line),
                ));
            }

            let strand = match fields[1] {
                "+1" => Strand::Forward,
                "-1" => Strand::Reverse,
                other => {
                    return Err(PipelineError::mismatch(
                        "segmentation output",
                        format!("unknown strand '{}'", other),
                    ))
                }
            };

            states.push(BinState {
                reference: fields[0].to_string(),
                strand,
                bin: fields[2].parse().map_err(|_| {
                    PipelineError::mismatch("segmentation output", "non-numeric bin")
                })?,
                positive: fields[3] != "0",
                log_prob: fields[4].parse().map_err(|_| {
                    PipelineError::mismatch("segmentation output", "non-numeric log prob")
                })?,
            });
        }

        Ok(states)
    }
}

impl SegmentationModel for HmmProcess {
    fn assign_states(&self, tracks: &[BinnedTrack]) -> Result<Vec<BinState>, PipelineError> {
        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        child
            .stdin
            .take()
            .expect("no piped stdin")
            .write_all(Self::encode(tracks).as_bytes())?;

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(PipelineError::Subprocess {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Self::decode(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Restrict a bin track to the bins whose interval overlaps a peak;
/// covered bins absent from the track are carried with a zero count.
pub fn peak_bins(track: &BinTrack, peaks: &[Peak], bin_size: u64) -> BinTrack {
    let mut covered = BinTrack::new();

    for peak in peaks {
        let first = (peak.start - 1) / bin_size;
        let last = (peak.end - 1) / bin_size;
        for bin in first..=last {
            covered.insert(bin, track.get(&bin).copied().unwrap_or(0));
        }
    }

    covered
}

/// Join contiguous positive-state bins of one (reference, strand)
/// track into regions carrying the per-bin maximum read count and the
/// summed log probability.
pub fn join_regions(states: &[BinState], bins: &BinTrack, bin_size: u64) -> Vec<Region> {
    let mut ordered: Vec<&BinState> = states.iter().collect();
    ordered.sort_by_key(|s| s.bin);

    let mut regions: Vec<Region> = Vec::new();
    let mut open: Option<(u64, u64, u64, f64, Strand)> = None;

    for state in ordered {
        if !state.positive {
            continue;
        }

        let count = bins.get(&state.bin).copied().unwrap_or(0);
        let extends = matches!(&open, Some((_, last, _, _, _)) if state.bin == *last + 1);

        if extends {
            if let Some((_, last, max, logp, _)) = open.as_mut() {
                *last = state.bin;
                *max = (*max).max(count);
                *logp += state.log_prob;
            }
        } else {
            if let Some(span) = open.take() {
                regions.push(close_region(span, bin_size));
            }
            open = Some((state.bin, state.bin, count, state.log_prob, state.strand));
        }
    }

    if let Some(span) = open {
        regions.push(close_region(span, bin_size));
    }

    regions
}

fn close_region(span: (u64, u64, u64, f64, Strand), bin_size: u64) -> Region {
    let (first, last, max_count, log_prob, strand) = span;
    Region {
        start: first * bin_size + 1,
        end: (last + 1) * bin_size,
        max_count,
        log_prob,
        strand,
    }
}

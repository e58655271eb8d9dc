//! Reference sequence I/O
//!
//! Reference descriptors come from the BAM header; subsequences come
//! from an indexed FASTA. Retrieval is behind a trait so the polyA
//! screen can run against a remote-annotation source (which pads past
//! the sequence end with `N`) or a canned double in tests.

use rust_htslib::bam::{self, Read};
use rust_htslib::faidx;

use hashbrown::HashMap;
use std::path::Path;

use crate::core::PipelineError;
use config::Strand;

/// A named contiguous coordinate space with its ordinal position in
/// the genome assembly.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RefSeq {
    pub name: String,
    pub length: u64,
    pub ordinal: usize,
}

/// Reference name/length pairs from a BAM header, in header order.
pub fn reference_lengths(bam: &Path) -> Result<Vec<RefSeq>, PipelineError> {
    let reader = bam::Reader::from_path(bam)?;
    let header = reader.header();

    let mut refs = Vec::with_capacity(header.target_count() as usize);
    for tid in 0..header.target_count() {
        let name = String::from_utf8_lossy(header.tid2name(tid)).into_owned();
        let length = header
            .target_len(tid)
            .unwrap_or_else(|| panic!("ERROR: no length for reference '{}'!", name));

        refs.push(RefSeq {
            name,
            length,
            ordinal: tid as usize,
        });
    }

    Ok(refs)
}

/// Genomic subsequence retrieval, 1-based inclusive coordinates.
///
/// Out-of-range queries are clipped to the sequence bounds; queries
/// entirely outside return an empty string. The reverse complement is
/// applied iff `strand` is reverse.
pub trait SequenceSource {
    fn get_subsequence(
        &self,
        name: &str,
        start: u64,
        end: u64,
        strand: Strand,
    ) -> Result<String, PipelineError>;

    /// Exactly `length` bases 5' of `pos` on `strand` when in range.
    fn get_upstream_subsequence(
        &self,
        name: &str,
        pos: u64,
        strand: Strand,
        length: u64,
    ) -> Result<String, PipelineError> {
        match strand {
            Strand::Forward => {
                self.get_subsequence(name, pos.saturating_sub(length), pos.saturating_sub(1), strand)
            }
            Strand::Reverse => self.get_subsequence(name, pos + 1, pos + length, strand),
        }
    }

    /// Exactly `length` bases 3' of `pos` on `strand` when in range.
    fn get_downstream_subsequence(
        &self,
        name: &str,
        pos: u64,
        strand: Strand,
        length: u64,
    ) -> Result<String, PipelineError> {
        match strand {
            Strand::Forward => self.get_subsequence(name, pos + 1, pos + length, strand),
            Strand::Reverse => {
                self.get_subsequence(name, pos.saturating_sub(length), pos.saturating_sub(1), strand)
            }
        }
    }
}

/// Indexed FASTA source.
pub struct FastaSource {
    reader: faidx::Reader,
    lengths: HashMap<String, u64>,
}

impl FastaSource {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let reader = faidx::Reader::from_path(path)?;

        let mut lengths = HashMap::new();
        for name in reader.seq_names()? {
            let length = reader.fetch_seq_len(&name);
            lengths.insert(name, length);
        }

        Ok(FastaSource { reader, lengths })
    }
}

impl SequenceSource for FastaSource {
    fn get_subsequence(
        &self,
        name: &str,
        start: u64,
        end: u64,
        strand: Strand,
    ) -> Result<String, PipelineError> {
        let length = *self.lengths.get(name).ok_or_else(|| {
            PipelineError::mismatch("sequence retrieval", format!("unknown reference '{}'", name))
        })?;

        let (start, end) = match clip_range(start, end, length) {
            Some(range) => range,
            None => return Ok(String::new()),
        };

        let fetched = self
            .reader
            .fetch_seq_string(name, start as usize - 1, end as usize - 1)?
            .to_uppercase();

        Ok(orient(fetched, strand))
    }
}

/// Clip a 1-based inclusive range to `[1, length]`; `None` when the
/// range lies entirely outside the sequence.
pub fn clip_range(start: u64, end: u64, length: u64) -> Option<(u64, u64)> {
    let start = start.max(1);
    let end = end.min(length);

    if length == 0 || start > end {
        return None;
    }

    Some((start, end))
}

/// Apply strand orientation to a fetched subsequence.
pub fn orient(sequence: String, strand: Strand) -> String {
    match strand {
        Strand::Forward => sequence,
        Strand::Reverse => {
            String::from_utf8(bio::alphabets::dna::revcomp(sequence.as_bytes()))
                .expect("no utf8 error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory source with remote-annotation semantics: windows past
    /// the sequence end are padded with `N`.
    pub struct PaddedSource {
        pub name: String,
        pub sequence: String,
    }

    impl SequenceSource for PaddedSource {
        fn get_subsequence(
            &self,
            name: &str,
            start: u64,
            end: u64,
            strand: Strand,
        ) -> Result<String, PipelineError> {
            assert_eq!(name, self.name);
            let requested = (end - start + 1) as usize;

            let mut out = String::new();
            for pos in start..=end {
                let idx = pos as usize - 1;
                out.push(self.sequence.as_bytes().get(idx).map(|b| *b as char).unwrap_or('N'));
            }
            assert_eq!(out.len(), requested);

            Ok(orient(out, strand))
        }
    }

    #[test]
    fn test_clip_range_clamps_low_and_high() {
        assert_eq!(clip_range(0, 10, 100), Some((1, 10)));
        assert_eq!(clip_range(95, 200, 100), Some((95, 100)));
        assert_eq!(clip_range(101, 200, 100), None);
        assert_eq!(clip_range(5, 4, 100), None);
    }

    #[test]
    fn test_orient_reverse_complements() {
        assert_eq!(orient("ACGT".to_string(), Strand::Forward), "ACGT");
        assert_eq!(orient("AACG".to_string(), Strand::Reverse), "CGTT");
    }

    #[test]
    fn test_downstream_window_forward() {
        let source = PaddedSource {
            name: "1".to_string(),
            sequence: "ACGTACGTACGTACGT".to_string(),
        };
        let window = source
            .get_downstream_subsequence("1", 4, Strand::Forward, 4)
            .unwrap();
        assert_eq!(window, "ACGT");
    }

    #[test]
    fn test_downstream_window_reverse_is_complemented() {
        let source = PaddedSource {
            name: "1".to_string(),
            sequence: "AACCGGTTAACCGGTT".to_string(),
        };
        // downstream of pos 5 on the reverse strand is [1, 4]
        let window = source
            .get_downstream_subsequence("1", 5, Strand::Reverse, 4)
            .unwrap();
        assert_eq!(window, "GGTT");
    }

    #[test]
    fn test_upstream_window_clips_at_sequence_start() {
        let source = PaddedSource {
            name: "1".to_string(),
            sequence: "AACCGGTT".to_string(),
        };
        let window = source
            .get_upstream_subsequence("1", 6, Strand::Forward, 5)
            .unwrap();
        assert_eq!(window, "AACCG");

        // upstream of a reverse-strand position reads rightward
        let window = source
            .get_upstream_subsequence("1", 4, Strand::Reverse, 4)
            .unwrap();
        assert_eq!(window, "AACC");
    }

    #[test]
    fn test_remote_source_pads_past_end() {
        let source = PaddedSource {
            name: "1".to_string(),
            sequence: "ACGT".to_string(),
        };
        let window = source
            .get_downstream_subsequence("1", 2, Strand::Forward, 6)
            .unwrap();
        assert_eq!(window, "GTNNNN");
    }
}

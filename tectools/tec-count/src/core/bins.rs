//! Read-2 coverage binning
//!
//! Bin `b` names the half-open interval `[b*W, (b+1)*W)` for bin
//! width `W`. A surviving read-2 increments every bin its alignment
//! spans; tracks are kept per strand and feed the segmentation model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::filters::{survives_read2, Alignment};
use crate::core::tags::TagMatcher;
use crate::utils::RejectCounter;
use config::Strand;

/// Sparse coverage map, bin ordinal to read count.
pub type BinTrack = BTreeMap<u64, u64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrandTracks {
    pub forward: BinTrack,
    pub reverse: BinTrack,
}

impl StrandTracks {
    pub fn track(&self, strand: Strand) -> &BinTrack {
        match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        }
    }

    fn track_mut(&mut self, strand: Strand) -> &mut BinTrack {
        match strand {
            Strand::Forward => &mut self.forward,
            Strand::Reverse => &mut self.reverse,
        }
    }
}

/// Increment every bin a 1-based inclusive alignment span touches.
pub fn bin_span(track: &mut BinTrack, start: u64, end: u64, bin_size: u64) {
    let first = (start - 1) / bin_size;
    let last = (end - 1) / bin_size;

    for bin in first..=last {
        *track.entry(bin).or_insert(0) += 1;
    }
}

/// Bin the read-2s of one reference that survive the filters: mapped,
/// not duplicate, under the mismatch threshold, tag matched.
pub fn bin_reads<'a, I>(
    alignments: I,
    matcher: &TagMatcher,
    bin_size: u64,
    mismatch_threshold: u32,
    counter: &RejectCounter,
) -> StrandTracks
where
    I: IntoIterator<Item = &'a Alignment>,
{
    let mut tracks = StrandTracks::default();

    for alignment in alignments {
        if !survives_read2(alignment, matcher, mismatch_threshold, counter) {
            continue;
        }

        bin_span(
            tracks.track_mut(alignment.strand),
            alignment.start,
            alignment.end,
            bin_size,
        );
    }

    tracks
}

/// Sum bin tracks from several inputs into one.
pub fn merge_tracks<'a, I>(tracks: I) -> StrandTracks
where
    I: IntoIterator<Item = &'a StrandTracks>,
{
    let mut merged = StrandTracks::default();

    for input in tracks {
        for (bin, count) in &input.forward {
            *merged.forward.entry(*bin).or_insert(0) += count;
        }
        for (bin, count) in &input.reverse {
            *merged.reverse.entry(*bin).or_insert(0) += count;
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read2(start: u64, end: u64, strand: Strand) -> Alignment {
        Alignment {
            name: "r#ACGTCGAGGC".to_string(),
            start,
            end,
            strand,
            paired: true,
            read2: true,
            duplicate: false,
            unmapped: false,
            mate_unmapped: false,
            properly_paired: true,
            mate_same_reference: true,
            mate_start: Some(start + 150),
            mate_end: Some(end + 150),
            edit_distance: 0,
            soft_clipped: 0,
        }
    }

    fn matcher() -> TagMatcher {
        TagMatcher::new(&["NNNNBGAGGC".to_string()]).unwrap()
    }

    #[test]
    fn test_spanning_read_touches_every_bin() {
        let mut track = BinTrack::new();
        bin_span(&mut track, 195, 310, 100);
        assert_eq!(track.get(&1), Some(&1));
        assert_eq!(track.get(&2), Some(&1));
        assert_eq!(track.get(&3), Some(&1));
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn test_bin_boundaries_are_half_open() {
        let mut track = BinTrack::new();
        // [101, 200] in 1-based coordinates is exactly bin 1 of width 100
        bin_span(&mut track, 101, 200, 100);
        assert_eq!(track.len(), 1);
        assert_eq!(track.get(&1), Some(&1));
    }

    #[test]
    fn test_strands_are_stratified() {
        let reads = vec![
            read2(10, 60, Strand::Forward),
            read2(10, 60, Strand::Reverse),
            read2(210, 260, Strand::Reverse),
        ];
        let tracks = bin_reads(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert_eq!(tracks.forward.len(), 1);
        assert_eq!(tracks.reverse.len(), 2);
    }

    #[test]
    fn test_filtered_reads_do_not_bin() {
        let mut duplicate = read2(10, 60, Strand::Forward);
        duplicate.duplicate = true;

        let mut mismatched = read2(10, 60, Strand::Forward);
        mismatched.edit_distance = 3;

        let mut untagged = read2(10, 60, Strand::Forward);
        untagged.name = "r#TTTTTTTTTT".to_string();

        let reads = vec![duplicate, mismatched, untagged];
        let tracks = bin_reads(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert!(tracks.forward.is_empty());
        assert!(tracks.reverse.is_empty());
    }

    #[test]
    fn test_merge_tracks_is_additive() {
        let reads_a = vec![read2(10, 60, Strand::Forward)];
        let reads_b = vec![read2(20, 70, Strand::Forward)];

        let a = bin_reads(&reads_a, &matcher(), 100, 0, &RejectCounter::default());
        let b = bin_reads(&reads_b, &matcher(), 100, 0, &RejectCounter::default());
        let merged = merge_tracks([&a, &b]);

        assert_eq!(merged.forward.get(&0), Some(&2));
    }
}

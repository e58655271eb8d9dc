//! Strand-stratified peak construction
//!
//! A peak is a maximal run of read-2 alignments on one strand whose
//! inter-alignment gaps stay below the buffer width. Traversal is in
//! coordinate order; merging peak lists from several inputs reapplies
//! the same buffered-proximity rule to the coordinate-ordered union.

use serde::{Deserialize, Serialize};

use crate::core::filters::{survives_read2, Alignment};
use crate::core::tags::TagMatcher;
use crate::utils::RejectCounter;
use config::Strand;

/// Closed interval on one strand with its read count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    pub start: u64,
    pub end: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrandPeaks {
    pub forward: Vec<Peak>,
    pub reverse: Vec<Peak>,
}

impl StrandPeaks {
    pub fn peaks(&self, strand: Strand) -> &[Peak] {
        match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        }
    }
}

/// Incremental builder for one strand. Feed coordinate-ordered spans;
/// a span whose start is within `buffer` of the open peak's end
/// extends it, anything farther emits the peak and opens a new one.
#[derive(Debug)]
pub struct PeakBuilder {
    buffer: u64,
    open: Option<Peak>,
    emitted: Vec<Peak>,
}

impl PeakBuilder {
    pub fn new(buffer: u64) -> Self {
        PeakBuilder {
            buffer,
            open: None,
            emitted: Vec::new(),
        }
    }

    pub fn push(&mut self, start: u64, end: u64) {
        match self.open.as_mut() {
            None => {
                self.open = Some(Peak {
                    start,
                    end,
                    count: 1,
                });
            }
            Some(peak) if start.saturating_sub(peak.end) < self.buffer => {
                peak.end = peak.end.max(end);
                peak.count += 1;
            }
            Some(peak) => {
                self.emitted.push(peak.clone());
                self.open = Some(Peak {
                    start,
                    end,
                    count: 1,
                });
            }
        }
    }

    pub fn finish(mut self) -> Vec<Peak> {
        if let Some(peak) = self.open.take() {
            self.emitted.push(peak);
        }
        self.emitted
    }
}

/// Build both strand peak lists for one reference from surviving
/// read-2s (mapped, not duplicate, under the mismatch threshold, tag
/// matched), in coordinate order.
pub fn build_peaks<'a, I>(
    alignments: I,
    matcher: &TagMatcher,
    buffer: u64,
    mismatch_threshold: u32,
    counter: &RejectCounter,
) -> StrandPeaks
where
    I: IntoIterator<Item = &'a Alignment>,
{
    let mut forward = PeakBuilder::new(buffer);
    let mut reverse = PeakBuilder::new(buffer);

    for alignment in alignments {
        if !survives_read2(alignment, matcher, mismatch_threshold, counter) {
            continue;
        }

        match alignment.strand {
            Strand::Forward => forward.push(alignment.start, alignment.end),
            Strand::Reverse => reverse.push(alignment.start, alignment.end),
        }
    }

    StrandPeaks {
        forward: forward.finish(),
        reverse: reverse.finish(),
    }
}

/// Merge peak lists from several inputs for one (reference, strand) by
/// coordinate-ordered union under the buffered-proximity rule. Counts
/// of joined peaks add. Merging a single list is the identity.
pub fn merge_peaks(lists: &[&[Peak]], buffer: u64) -> Vec<Peak> {
    let mut union: Vec<&Peak> = lists.iter().flat_map(|list| list.iter()).collect();
    union.sort_by_key(|p| (p.start, p.end));

    let mut merged: Vec<Peak> = Vec::new();
    for peak in union {
        match merged.last_mut() {
            Some(open) if peak.start.saturating_sub(open.end) < buffer => {
                open.end = open.end.max(peak.end);
                open.count += peak.count;
            }
            _ => merged.push(peak.clone()),
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
    fn test_reads_within_buffer_join() {
        let reads = vec![
            read2(195, 244, Strand::Forward),
            read2(230, 279, Strand::Forward),
            read2(245, 294, Strand::Forward),
        ];
        let peaks = build_peaks(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert_eq!(
            peaks.forward,
            vec![Peak {
                start: 195,
                end: 294,
                count: 3
            }]
        );
    }

    #[test]
    fn test_gap_at_buffer_width_splits() {
        // gap of exactly `buffer` does not join: rs - pe < buffer is strict
        let reads = vec![
            read2(100, 150, Strand::Forward),
            read2(250, 300, Strand::Forward),
            read2(349, 400, Strand::Forward),
        ];
        let peaks = build_peaks(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert_eq!(peaks.forward.len(), 2);
        assert_eq!(peaks.forward[0].end, 150);
        assert_eq!(peaks.forward[1].start, 250);
        assert_eq!(peaks.forward[1].end, 400);
        assert_eq!(peaks.forward[1].count, 2);
    }

    #[test]
    fn test_contained_read_does_not_shrink_peak() {
        let reads = vec![
            read2(100, 400, Strand::Forward),
            read2(150, 200, Strand::Forward),
        ];
        let peaks = build_peaks(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert_eq!(
            peaks.forward,
            vec![Peak {
                start: 100,
                end: 400,
                count: 2
            }]
        );
    }

    #[test]
    fn test_strands_build_independently() {
        let reads = vec![
            read2(100, 150, Strand::Forward),
            read2(120, 170, Strand::Reverse),
        ];
        let peaks = build_peaks(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert_eq!(peaks.forward.len(), 1);
        assert_eq!(peaks.reverse.len(), 1);
    }

    #[test]
    fn test_trailing_peak_is_emitted() {
        let reads = vec![read2(6450, 6503, Strand::Forward)];
        let peaks = build_peaks(&reads, &matcher(), 100, 0, &RejectCounter::default());
        assert_eq!(
            peaks.forward,
            vec![Peak {
                start: 6450,
                end: 6503,
                count: 1
            }]
        );
    }

    #[test]
    fn test_merge_joins_across_inputs() {
        let a = vec![Peak {
            start: 100,
            end: 200,
            count: 3,
        }];
        let b = vec![Peak {
            start: 250,
            end: 320,
            count: 2,
        }];
        let merged = merge_peaks(&[&a, &b], 100);
        assert_eq!(
            merged,
            vec![Peak {
                start: 100,
                end: 320,
                count: 5
            }]
        );
    }

    #[test]
    fn test_merge_single_list_is_identity() {
        let a = vec![
            Peak {
                start: 100,
                end: 200,
                count: 3,
            },
            Peak {
                start: 300,
                end: 400,
                count: 1,
            },
        ];
        let merged = merge_peaks(&[&a], 100);
        assert_eq!(merged, a);
    }
}

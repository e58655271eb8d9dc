//! 3'-end derivation
//!
//! A region's 3'-end candidates come from the mate alignments of the
//! read-2s it covers: the mate end on the forward strand, the mate
//! start on the reverse strand. Candidate lists from parallel inputs
//! are fused additively for structurally identical regions, screened
//! against a read-count floor and a downstream polyA window, and
//! collapsed to one chosen end per region, possibly shrinking the
//! region toward it.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::filters::{above_mismatch_threshold, Alignment};
use crate::core::hmm::Region;
use crate::core::sequence::SequenceSource;
use crate::core::tags::TagMatcher;
use crate::core::PipelineError;
use crate::utils::zip_regions;
use config::{Strand, MIN_END_READS, POLYA_LEADING_A, POLYA_MAX_A, POLYA_WINDOW};

/// A candidate cleavage position with its supporting read count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndCandidate {
    pub reference: String,
    pub position: u64,
    pub strand: Strand,
    pub count: u64,
}

/// A region augmented with its ordered candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEnds {
    pub region: Region,
    pub candidates: Vec<EndCandidate>,
}

/// The single 3' end elected for a region. The strand is always set:
/// it falls back to the region strand when no candidate survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChosenEnd {
    Present {
        reference: String,
        position: u64,
        strand: Strand,
        count: u64,
    },
    Absent {
        strand: Strand,
    },
}

impl ChosenEnd {
    pub fn strand(&self) -> Strand {
        match self {
            ChosenEnd::Present { strand, .. } => *strand,
            ChosenEnd::Absent { strand } => *strand,
        }
    }
}

/// A region with its chosen end, bounds possibly shrunk toward it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenRegion {
    pub region: Region,
    pub end: ChosenEnd,
}

/// Derive the candidate ends of one region on a target strand from
/// the alignments overlapping it.
///
/// Only read-2s survive that are not duplicates, lie on the target
/// strand (read-1 opposite), have the mate mapped on the same
/// reference, pass the mismatch threshold, and match a configured
/// tag. The candidate position is the mate end on the forward target
/// strand and the mate start on the reverse one. Counts accumulate
/// per position; the result is ordered by descending count.
pub fn extract_region_ends(
    region: &Region,
    reference: &str,
    target: Strand,
    alignments: &[Alignment],
    matcher: &TagMatcher,
    mismatch_threshold: u32,
) -> Vec<EndCandidate> {
    let mut counts: hashbrown::HashMap<u64, u64> = hashbrown::HashMap::new();

    for alignment in alignments {
        if !alignment.is_read2() || alignment.is_duplicate() {
            continue;
        }
        if !alignment.overlaps(region.start, region.end) {
            continue;
        }
        if alignment.strand != target || !alignment.mate_same_reference {
            continue;
        }
        if above_mismatch_threshold(alignment, mismatch_threshold) {
            continue;
        }
        if matcher.match_name(&alignment.name).is_none() {
            continue;
        }

        let position = match target {
            Strand::Forward => alignment.mate_end,
            Strand::Reverse => alignment.mate_start,
        };

        if let Some(position) = position {
            *counts.entry(position).or_insert(0) += 1;
        }
    }

    let mut candidates: Vec<EndCandidate> = counts
        .into_iter()
        .map(|(position, count)| EndCandidate {
            reference: reference.to_string(),
            position,
            strand: target,
            count,
        })
        .collect();

    sort_candidates(&mut candidates);
    candidates
}

fn sort_candidates(candidates: &mut [EndCandidate]) {
    candidates.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.position.cmp(&b.position))
            .then(a.reference.cmp(&b.reference))
    });
}

/// Fuse per-input candidate lists for structurally identical regions.
///
/// Branch lists must agree region-for-region on the identity tuple;
/// any divergence is fatal. Counts add over identical
/// (reference, position, strand) keys. A single branch is returned
/// unchanged.
pub fn merge_ends(branches: &[Vec<RegionEnds>]) -> Result<Vec<RegionEnds>, PipelineError> {
    let grouped = zip_regions(branches, |ends: &RegionEnds| &ends.region, "3'-end merge")?;

    let mut merged = Vec::with_capacity(grouped.len());
    for group in grouped {
        let region = group[0].region.clone();

        let mut fused: Vec<EndCandidate> = Vec::new();
        for branch in &group {
            for candidate in &branch.candidates {
                match fused.iter_mut().find(|c| {
                    c.reference == candidate.reference
                        && c.position == candidate.position
                        && c.strand == candidate.strand
                }) {
                    Some(existing) => existing.count += candidate.count,
                    None => fused.push(candidate.clone()),
                }
            }
        }

        sort_candidates(&mut fused);
        merged.push(RegionEnds {
            region,
            candidates: fused,
        });
    }

    Ok(merged)
}

/// Downstream-polyA screen over the 10 bp window 3' of a candidate.
pub struct PolyaScreen {
    spaced: Vec<Regex>,
}

impl PolyaScreen {
    pub fn new() -> Result<Self, PipelineError> {
        let spaced = [r"^.AAAA", r"^A.AAA", r"^AA.AA", r"^AAA.A"]
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PolyaScreen { spaced })
    }

    /// A window is downstream-polyA when it starts with four or more
    /// adenines, carries more than six in total, or matches a spaced
    /// run of four adenines at its head.
    pub fn is_downstream_polya(&self, window: &str) -> bool {
        let window = window.to_uppercase();

        if window.starts_with(&"A".repeat(POLYA_LEADING_A)) {
            return true;
        }
        if window.chars().filter(|b| *b == 'A').count() > POLYA_MAX_A {
            return true;
        }

        self.spaced.iter().any(|re| re.is_match(&window))
    }
}

/// Screen a region's candidates: drop those under the read-count
/// floor, then those whose downstream window looks polyA-primed.
pub fn filter_ends(
    ends: &mut RegionEnds,
    source: &dyn SequenceSource,
    screen: &PolyaScreen,
) -> Result<(), PipelineError> {
    let mut rejected: Vec<(String, u64, Strand)> = Vec::new();

    for candidate in &ends.candidates {
        if candidate.count < MIN_END_READS {
            rejected.push((
                candidate.reference.clone(),
                candidate.position,
                candidate.strand,
            ));
            continue;
        }

        let window = source.get_downstream_subsequence(
            &candidate.reference,
            candidate.position,
            candidate.strand,
            POLYA_WINDOW,
        )?;

        if screen.is_downstream_polya(&window) {
            rejected.push((
                candidate.reference.clone(),
                candidate.position,
                candidate.strand,
            ));
        }
    }

    for key in rejected {
        remove_candidate(&mut ends.candidates, &key)?;
    }

    Ok(())
}

/// Remove one candidate by identity. Asking for an end that is not in
/// the list is a structural fault, not a no-op.
fn remove_candidate(
    candidates: &mut Vec<EndCandidate>,
    key: &(String, u64, Strand),
) -> Result<(), PipelineError> {
    let index = candidates
        .iter()
        .position(|c| c.reference == key.0 && c.position == key.1 && c.strand == key.2)
        .ok_or_else(|| {
            PipelineError::mismatch(
                "3'-end filter",
                format!("unknown end {}:{}:{}", key.0, key.1, key.2),
            )
        })?;

    candidates.remove(index);
    Ok(())
}

/// Elect one end for a region and shrink the region toward it when it
/// falls strictly inside the bounds.
///
/// Candidates order by count descending, then by ascending distance
/// to the nearest region bound (a candidate on a foreign reference
/// sorts last), then by smaller position. Without a surviving
/// candidate the chosen end is absent and keeps the region strand.
pub fn choose_end(ends: &RegionEnds, region_reference: &str) -> ChosenRegion {
    let region = &ends.region;

    let mut ranked: Vec<&EndCandidate> = ends.candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| {
                bound_distance(a, region, region_reference)
                    .cmp(&bound_distance(b, region, region_reference))
            })
            .then(a.position.cmp(&b.position))
    });

    match ranked.first() {
        None => ChosenRegion {
            region: region.clone(),
            end: ChosenEnd::Absent {
                strand: region.strand,
            },
        },
        Some(best) => {
            let mut shrunk = region.clone();

            if best.reference == region_reference
                && best.position > region.start
                && best.position < region.end
            {
                match best.strand {
                    Strand::Forward => shrunk.end = best.position,
                    Strand::Reverse => shrunk.start = best.position,
                }
            }

            ChosenRegion {
                region: shrunk,
                end: ChosenEnd::Present {
                    reference: best.reference.clone(),
                    position: best.position,
                    strand: best.strand,
                    count: best.count,
                },
            }
        }
    }
}

fn bound_distance(candidate: &EndCandidate, region: &Region, region_reference: &str) -> u64 {
    if candidate.reference != region_reference {
        return u64::MAX;
    }

    let to_start = region.start.abs_diff(candidate.position);
    let to_end = region.end.abs_diff(candidate.position);
    to_start.min(to_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: u64, end: u64, strand: Strand) -> Region {
        Region {
            start,
            end,
            max_count: 10,
            log_prob: -4.5,
            strand,
        }
    }

    fn candidate(position: u64, count: u64, strand: Strand) -> EndCandidate {
        EndCandidate {
            reference: "1".to_string(),
            position,
            strand,
            count,
        }
    }

    fn read2(start: u64, end: u64, strand: Strand, mate_start: u64, mate_end: u64) -> Alignment {
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
            mate_start: Some(mate_start),
            mate_end: Some(mate_end),
            edit_distance: 0,
            soft_clipped: 0,
        }
    }

    fn matcher() -> TagMatcher {
        TagMatcher::new(&["NNNNBGAGGC".to_string()]).unwrap()
    }

    struct CannedSource(String);

    impl SequenceSource for CannedSource {
        fn get_subsequence(
            &self,
            _name: &str,
            _start: u64,
            _end: u64,
            _strand: Strand,
        ) -> Result<String, PipelineError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_extraction_counts_mate_ends_forward() {
        let region = region(1000, 2000, Strand::Forward);
        let reads = vec![
            read2(1100, 1150, Strand::Forward, 1300, 1194),
            read2(1120, 1170, Strand::Forward, 1300, 1194),
            read2(1200, 1250, Strand::Forward, 1400, 1450),
        ];

        let candidates =
            extract_region_ends(&region, "1", Strand::Forward, &reads, &matcher(), 0);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].position, 1194);
        assert_eq!(candidates[0].count, 2);
        assert_eq!(candidates[1].position, 1450);
    }

    #[test]
    fn test_extraction_uses_mate_start_on_reverse() {
        let region = region(1000, 2000, Strand::Reverse);
        let reads = vec![read2(1100, 1150, Strand::Reverse, 1038, 900)];

        let candidates =
            extract_region_ends(&region, "1", Strand::Reverse, &reads, &matcher(), 0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].position, 1038);
        assert_eq!(candidates[0].strand, Strand::Reverse);
    }

    #[test]
    fn test_extraction_skips_wrong_strand_and_duplicates() {
        let region = region(1000, 2000, Strand::Forward);

        let mut duplicate = read2(1100, 1150, Strand::Forward, 1300, 1194);
        duplicate.duplicate = true;
        let wrong_strand = read2(1100, 1150, Strand::Reverse, 1300, 1194);
        let mut far_mate = read2(1100, 1150, Strand::Forward, 1300, 1194);
        far_mate.mate_same_reference = false;
        far_mate.mate_start = None;
        far_mate.mate_end = None;

        let reads = vec![duplicate, wrong_strand, far_mate];
        let candidates =
            extract_region_ends(&region, "1", Strand::Forward, &reads, &matcher(), 0);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_merge_fuses_identical_positions() {
        let shared = region(1000, 2000, Strand::Forward);
        let a = vec![RegionEnds {
            region: shared.clone(),
            candidates: vec![candidate(1194, 3, Strand::Forward)],
        }];
        let b = vec![RegionEnds {
            region: shared,
            candidates: vec![
                candidate(1194, 2, Strand::Forward),
                candidate(1450, 4, Strand::Forward),
            ],
        }];

        let merged = merge_ends(&[a, b]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].candidates.len(), 2);
        assert_eq!(merged[0].candidates[0].position, 1194);
        assert_eq!(merged[0].candidates[0].count, 5);
    }

    #[test]
    fn test_merge_single_branch_is_identity() {
        let branch = vec![RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![
                candidate(1194, 5, Strand::Forward),
                candidate(1450, 2, Strand::Forward),
            ],
        }];

        let merged = merge_ends(&[branch.clone()]).unwrap();
        assert_eq!(merged, branch);
    }

    #[test]
    fn test_merge_rejects_diverging_regions() {
        let a = vec![RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![],
        }];
        let b = vec![RegionEnds {
            region: region(1000, 2001, Strand::Forward),
            candidates: vec![],
        }];

        assert!(merge_ends(&[a, b]).is_err());
    }

    #[test]
    fn test_merge_rejects_length_mismatch() {
        let a = vec![RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![],
        }];

        assert!(merge_ends(&[a, vec![]]).is_err());
    }

    #[test]
    fn test_polya_screen_rules() {
        let screen = PolyaScreen::new().unwrap();
        assert!(screen.is_downstream_polya("AAAATTTTTT"));
        assert!(screen.is_downstream_polya("TATATAAAAA")); // 7 As in total
        assert!(screen.is_downstream_polya("TAAAATTTTT")); // spaced head
        assert!(!screen.is_downstream_polya("TTTTTTTTTT"));
        assert!(!screen.is_downstream_polya("ACGTACGTAC"));
    }

    #[test]
    fn test_filter_drops_polya_windows() {
        let screen = PolyaScreen::new().unwrap();
        let source = CannedSource("AAAATTTTTT".to_string());

        let mut ends = RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![
                candidate(1194, 10, Strand::Forward),
                candidate(1450, 8, Strand::Forward),
            ],
        };

        filter_ends(&mut ends, &source, &screen).unwrap();
        assert!(ends.candidates.is_empty());
    }

    #[test]
    fn test_filter_enforces_read_floor() {
        let screen = PolyaScreen::new().unwrap();
        let source = CannedSource("TTTTTTTTTT".to_string());

        let mut ends = RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![
                candidate(1194, 4, Strand::Forward),
                candidate(1450, 3, Strand::Forward),
                candidate(1700, 2, Strand::Forward),
            ],
        };

        filter_ends(&mut ends, &source, &screen).unwrap();
        assert_eq!(ends.candidates.len(), 1);
        assert_eq!(ends.candidates[0].position, 1194);
    }

    #[test]
    fn test_choose_breaks_count_tie_by_distance() {
        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Reverse),
            candidates: vec![
                candidate(900, 20, Strand::Reverse),
                candidate(2200, 20, Strand::Reverse),
            ],
        };

        let chosen = choose_end(&ends, "1");
        match &chosen.end {
            ChosenEnd::Present { position, count, .. } => {
                assert_eq!(*position, 900);
                assert_eq!(*count, 20);
            }
            ChosenEnd::Absent { .. } => panic!("expected a chosen end"),
        }
        // an end outside the region does not shrink it
        assert_eq!(chosen.region.start, 1000);
        assert_eq!(chosen.region.end, 2000);
    }

    #[test]
    fn test_choose_shrinks_toward_interior_end() {
        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![candidate(1500, 9, Strand::Forward)],
        };

        let chosen = choose_end(&ends, "1");
        assert_eq!(chosen.region.start, 1000);
        assert_eq!(chosen.region.end, 1500);

        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Reverse),
            candidates: vec![candidate(1500, 9, Strand::Reverse)],
        };

        let chosen = choose_end(&ends, "1");
        assert_eq!(chosen.region.start, 1500);
        assert_eq!(chosen.region.end, 2000);
    }

    #[test]
    fn test_choose_at_bound_does_not_shrink() {
        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![candidate(2000, 9, Strand::Forward)],
        };

        let chosen = choose_end(&ends, "1");
        assert_eq!(chosen.region.start, 1000);
        assert_eq!(chosen.region.end, 2000);
    }

    #[test]
    fn test_choose_sorts_foreign_reference_last() {
        let mut foreign = candidate(1500, 20, Strand::Forward);
        foreign.reference = "2".to_string();

        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![foreign, candidate(2200, 20, Strand::Forward)],
        };

        let chosen = choose_end(&ends, "1");
        match &chosen.end {
            ChosenEnd::Present { reference, position, .. } => {
                assert_eq!(reference, "1");
                assert_eq!(*position, 2200);
            }
            ChosenEnd::Absent { .. } => panic!("expected a chosen end"),
        }
    }

    #[test]
    fn test_choose_without_candidates_keeps_strand() {
        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Reverse),
            candidates: vec![],
        };

        let chosen = choose_end(&ends, "1");
        assert_eq!(chosen.end, ChosenEnd::Absent { strand: Strand::Reverse });
        assert_eq!(chosen.region.start, 1000);
    }

    #[test]
    fn test_choose_tie_at_equal_distance_takes_smaller_position() {
        let ends = RegionEnds {
            region: region(1000, 2000, Strand::Forward),
            candidates: vec![
                candidate(2100, 20, Strand::Forward),
                candidate(900, 20, Strand::Forward),
            ],
        };

        let chosen = choose_end(&ends, "1");
        match &chosen.end {
            ChosenEnd::Present { position, .. } => assert_eq!(*position, 900),
            ChosenEnd::Absent { .. } => panic!("expected a chosen end"),
        }
    }
}

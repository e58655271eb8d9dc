//! Per-sample read counting at chosen 3' ends
//!
//! Each input revisits every region and tallies its surviving read-2s
//! per barcode; the merger aligns the per-input tallies to the
//! canonical sample order, verifying on the way that every branch
//! still talks about the same regions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::ends::{ChosenEnd, ChosenRegion};
use crate::core::filters::{above_mismatch_threshold, Alignment};
use crate::core::tags::TagMatcher;
use crate::core::PipelineError;
use crate::utils::zip_regions;
use config::Settings;

/// One region's per-barcode tallies for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub region: crate::core::hmm::Region,
    pub end: ChosenEnd,
    pub tags: BTreeMap<String, u64>,
}

/// One region carrying its final per-sample count vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountedRegion {
    pub region: crate::core::hmm::Region,
    pub end: ChosenEnd,
    pub counts: Vec<u64>,
}

/// Count the read-2s of one input overlapping a region on the chosen
/// end's strand. Every configured barcode of the input gets a slot,
/// zero when nothing matched.
pub fn count_reads(
    chosen: &ChosenRegion,
    alignments: &[Alignment],
    matcher: &TagMatcher,
    mismatch_threshold: u32,
) -> RegionCounts {
    let mut tags: BTreeMap<String, u64> = matcher.barcodes().map(|b| (b.to_string(), 0)).collect();
    let strand = chosen.end.strand();

    for alignment in alignments {
        if !alignment.is_read2() || alignment.is_duplicate() || alignment.unmapped {
            continue;
        }
        if !alignment.overlaps(chosen.region.start, chosen.region.end) {
            continue;
        }
        if alignment.strand != strand {
            continue;
        }
        if above_mismatch_threshold(alignment, mismatch_threshold) {
            continue;
        }

        if let Some(hit) = matcher.match_name(&alignment.name) {
            *tags
                .get_mut(hit.barcode)
                .unwrap_or_else(|| panic!("ERROR: counter lost barcode '{}'!", hit.barcode)) += 1;
        }
    }

    RegionCounts {
        region: chosen.region.clone(),
        end: chosen.end.clone(),
        tags,
    }
}

/// Stitch per-input tallies into per-sample vectors in the canonical
/// sample order.
///
/// Branches must agree region-for-region through the chosen 3'-end
/// read count; a tally for an (input, barcode) pair absent from the
/// sample table is fatal.
pub fn merge_counts(
    settings: &Settings,
    branches: &[(std::path::PathBuf, Vec<RegionCounts>)],
) -> Result<Vec<CountedRegion>, PipelineError> {
    let lists: Vec<Vec<RegionCounts>> = branches.iter().map(|(_, list)| list.clone()).collect();
    let grouped = zip_regions(&lists, |counts: &RegionCounts| &counts.region, "count merge")?;

    for group in &grouped {
        let end = &group[0].end;
        for (branch, counts) in group.iter().enumerate().skip(1) {
            if &counts.end != end {
                return Err(PipelineError::mismatch(
                    "count merge",
                    format!(
                        "chosen end diverges in branch {}: {:?} vs {:?}",
                        branch, end, counts.end
                    ),
                ));
            }
        }
    }

    let mut merged = Vec::with_capacity(grouped.len());
    for group in grouped {
        let mut counts = vec![0u64; settings.samples.len()];

        for (branch, region_counts) in group.iter().enumerate() {
            let input: &Path = &branches[branch].0;

            for (barcode, count) in &region_counts.tags {
                let slot = settings.sample_index(input, barcode).ok_or_else(|| {
                    PipelineError::mismatch(
                        "count merge",
                        format!("unknown (input, barcode) pair ({:?}, {})", input, barcode),
                    )
                })?;
                counts[slot] += count;
            }
        }

        merged.push(CountedRegion {
            region: group[0].region.clone(),
            end: group[0].end.clone(),
            counts,
        });
    }

    Ok(merged)
}

//! Alignment view and filter predicates
//!
//! Every stage consumes alignments through the `Alignment` view, a
//! plain decode of the BAM record fields the pipeline cares about:
//! 1-based coordinates, strand, mate position, flags, edit distance
//! and soft-clipped length. Decoding once keeps the per-stage filters
//! pure and testable without alignment files.

use rust_htslib::bam;
use rust_htslib::bam::record::{Aux, Cigar};

use crate::core::tags::TagMatcher;
use crate::utils::RejectCounter;
use config::Strand;

/// One aligned read as consumed by the pipeline. Coordinates are
/// 1-based with inclusive ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub paired: bool,
    pub read2: bool,
    pub duplicate: bool,
    pub unmapped: bool,
    pub mate_unmapped: bool,
    pub properly_paired: bool,
    pub mate_same_reference: bool,
    pub mate_start: Option<u64>,
    pub mate_end: Option<u64>,
    pub edit_distance: u32,
    pub soft_clipped: u32,
}

impl Alignment {
    /// Decode a BAM record. The mate end is reported through the
    /// template length and is therefore only known when this record is
    /// the leftmost of a same-reference pair; the mate start is known
    /// whenever the mate is mapped on the same reference.
    pub fn from_record(record: &bam::Record) -> Self {
        let start = record.pos() as u64 + 1;
        let end = record.cigar().end_pos() as u64;
        let mate_same_reference =
            !record.is_mate_unmapped() && record.mtid() >= 0 && record.mtid() == record.tid();

        let (mate_start, mate_end) = if mate_same_reference {
            let insert = record.insert_size();
            let mate_end = if insert > 0 {
                Some(start + insert as u64 - 1)
            } else {
                None
            };
            (Some(record.mpos() as u64 + 1), mate_end)
        } else {
            (None, None)
        };

        Alignment {
            name: String::from_utf8_lossy(record.qname()).into_owned(),
            start,
            end,
            strand: Strand::from_reverse(record.is_reverse()),
            paired: record.is_paired(),
            read2: record.is_last_in_template(),
            duplicate: record.is_duplicate(),
            unmapped: record.is_unmapped(),
            mate_unmapped: record.is_mate_unmapped(),
            properly_paired: record.is_proper_pair(),
            mate_same_reference,
            mate_start,
            mate_end,
            edit_distance: edit_distance(record),
            soft_clipped: soft_clipped(record),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.paired
    }

    pub fn is_read2(&self) -> bool {
        self.read2
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    pub fn is_properly_paired(&self) -> bool {
        self.properly_paired
    }

    pub fn mates_mapped(&self) -> bool {
        !self.unmapped && !self.mate_unmapped
    }

    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start <= end && self.end >= start
    }
}

/// NM tag plus the soft-clipped base count.
pub fn mismatch_score(alignment: &Alignment) -> u32 {
    alignment.edit_distance + alignment.soft_clipped
}

pub fn above_mismatch_threshold(alignment: &Alignment, threshold: u32) -> bool {
    mismatch_score(alignment) > threshold
}

/// The shared read-2 filter: mapped, not duplicate, under the
/// mismatch threshold, tag matched. Rejections tick the diagnostic
/// counter; they are not errors.
pub fn survives_read2(
    alignment: &Alignment,
    matcher: &TagMatcher,
    threshold: u32,
    counter: &RejectCounter,
) -> bool {
    if !alignment.is_read2() || alignment.unmapped {
        return false;
    }
    if alignment.is_duplicate() {
        counter.duplicate();
        return false;
    }
    if above_mismatch_threshold(alignment, threshold) {
        counter.mismatch();
        return false;
    }
    if matcher.match_name(&alignment.name).is_none() {
        counter.untagged();
        return false;
    }

    counter.keep();
    true
}

fn edit_distance(record: &bam::Record) -> u32 {
    match record.aux(b"NM") {
        Ok(Aux::U8(n)) => n as u32,
        Ok(Aux::I8(n)) => n as u32,
        Ok(Aux::U16(n)) => n as u32,
        Ok(Aux::I16(n)) => n as u32,
        Ok(Aux::U32(n)) => n,
        Ok(Aux::I32(n)) => n as u32,
        _ => 0,
    }
}

fn soft_clipped(record: &bam::Record) -> u32 {
    record
        .cigar()
        .iter()
        .map(|op| match op {
            Cigar::SoftClip(len) => *len,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn stub(start: u64, end: u64, strand: Strand) -> Alignment {
        Alignment {
            name: "read#ACGTCGAGGC".to_string(),
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
            mate_start: Some(start + 200),
            mate_end: Some(end + 200),
            edit_distance: 0,
            soft_clipped: 0,
        }
    }

    #[test]
    fn test_mismatch_score_sums_nm_and_clips() {
        let mut a = stub(100, 150, Strand::Forward);
        a.edit_distance = 2;
        a.soft_clipped = 3;
        assert_eq!(mismatch_score(&a), 5);
        assert!(above_mismatch_threshold(&a, 4));
        assert!(!above_mismatch_threshold(&a, 5));
    }

    #[test]
    fn test_mates_mapped_requires_both() {
        let mut a = stub(100, 150, Strand::Forward);
        assert!(a.mates_mapped());
        a.mate_unmapped = true;
        assert!(!a.mates_mapped());
    }

    #[test]
    fn test_overlap_is_inclusive() {
        let a = stub(100, 150, Strand::Forward);
        assert!(a.overlaps(150, 200));
        assert!(a.overlaps(50, 100));
        assert!(!a.overlaps(151, 200));
        assert!(!a.overlaps(10, 99));
    }
}

//! Genome chunking
//!
//! References are grouped into a fixed number of chunks whose summed
//! lengths approximate `total_bp / chunk_total`, so per-job memory is
//! capped and chunks parallelize evenly. Packing is a deterministic
//! greedy fit: references are placed longest-first into the currently
//! lightest chunk, ties broken by reference ordinal, so repeated runs
//! over the same inputs derive identical chunks.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::sequence::RefSeq;

/// An ordered group of references processed together. Ordinals are
/// 1-based and stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub ordinal: u64,
    pub references: Vec<RefSeq>,
}

impl Chunk {
    pub fn total_bp(&self) -> u64 {
        self.references.iter().map(|r| r.length).sum()
    }
}

/// Group references into `chunk_total` chunks.
///
/// # Arguments
///
/// * `refs` - Header references in assembly order
/// * `chunk_total` - Requested number of chunks
/// * `skip` - Reference names excluded before chunking
/// * `test_chunk` - Optional 1-based selector returning a single chunk
///
/// # Example
///
/// ```rust, no_run
/// use std::collections::HashSet;
/// use tec_count::core::chunks::chunk_references;
/// use tec_count::core::sequence::RefSeq;
///
/// let refs = vec![RefSeq { name: "1".to_string(), length: 1000, ordinal: 0 }];
/// let chunks = chunk_references(&refs, 25, &HashSet::new(), None);
/// assert_eq!(chunks.len(), 1);
/// ```
pub fn chunk_references(
    refs: &[RefSeq],
    chunk_total: u64,
    skip: &HashSet<String>,
    test_chunk: Option<u64>,
) -> Vec<Chunk> {
    let included: Vec<&RefSeq> = refs.iter().filter(|r| !skip.contains(&r.name)).collect();

    let mut order: Vec<&RefSeq> = included.clone();
    order.sort_by(|a, b| b.length.cmp(&a.length).then(a.ordinal.cmp(&b.ordinal)));

    let slots = (chunk_total as usize).min(order.len()).max(1);
    let mut bins: Vec<Vec<&RefSeq>> = vec![Vec::new(); slots];
    let mut weights = vec![0u64; slots];

    for reference in order {
        let lightest = weights
            .iter()
            .enumerate()
            .min_by_key(|(i, w)| (**w, *i))
            .map(|(i, _)| i)
            .expect("no empty chunk set");

        weights[lightest] += reference.length;
        bins[lightest].push(reference);
    }

    for members in bins.iter_mut() {
        members.sort_by_key(|r| r.ordinal);
    }

    bins.retain(|members| !members.is_empty());
    bins.sort_by_key(|members| members[0].ordinal);

    let mut chunks: Vec<Chunk> = bins
        .into_iter()
        .enumerate()
        .map(|(i, members)| Chunk {
            ordinal: i as u64 + 1,
            references: members.into_iter().cloned().collect(),
        })
        .collect();

    if let Some(selected) = test_chunk {
        chunks.retain(|c| c.ordinal == selected);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(lengths: &[u64]) -> Vec<RefSeq> {
        lengths
            .iter()
            .enumerate()
            .map(|(i, len)| RefSeq {
                name: format!("{}", i + 1),
                length: *len,
                ordinal: i,
            })
            .collect()
    }

    #[test]
    fn test_every_reference_in_exactly_one_chunk() {
        let refs = refs(&[1000, 900, 500, 400, 300, 100]);
        let chunks = chunk_references(&refs, 3, &HashSet::new(), None);

        let total: u64 = chunks.iter().map(|c| c.total_bp()).sum();
        assert_eq!(total, 3200);

        let mut seen = HashSet::new();
        for chunk in &chunks {
            for reference in &chunk.references {
                assert!(seen.insert(reference.name.clone()));
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let refs = refs(&[1000, 1000, 1000, 1000]);
        let a = chunk_references(&refs, 2, &HashSet::new(), None);
        let b = chunk_references(&refs, 2, &HashSet::new(), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_skip_list_excludes_before_packing() {
        let refs = refs(&[1000, 900, 500]);
        let skip: HashSet<String> = ["2".to_string()].into_iter().collect();
        let chunks = chunk_references(&refs, 2, &skip, None);

        let total: u64 = chunks.iter().map(|c| c.total_bp()).sum();
        assert_eq!(total, 1500);
        assert!(chunks
            .iter()
            .all(|c| c.references.iter().all(|r| r.name != "2")));
    }

    #[test]
    fn test_test_chunk_selects_single_ordinal() {
        let refs = refs(&[1000, 900, 500, 400]);
        let chunks = chunk_references(&refs, 2, &HashSet::new(), Some(2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 2);
    }

    #[test]
    fn test_more_chunks_than_references_collapses() {
        let refs = refs(&[1000, 900]);
        let chunks = chunk_references(&refs, 8, &HashSet::new(), None);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].ordinal, 1);
        assert_eq!(chunks[1].ordinal, 2);
    }

    #[test]
    fn test_members_ordered_by_ordinal_within_chunk() {
        let refs = refs(&[100, 1000, 200, 900]);
        let chunks = chunk_references(&refs, 1, &HashSet::new(), None);
        let ordinals: Vec<usize> = chunks[0].references.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }
}

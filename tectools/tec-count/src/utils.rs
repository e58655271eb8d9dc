//! Shared plumbing for the pipeline stages
//!
//! The structural-equality zip lives here: every fan-in stage joins
//! its parallel branches through `zip_regions`, which fails hard the
//! moment two branches disagree on length or region identity instead
//! of silently mis-aggregating. Artifact persistence (write to temp,
//! rename) and the per-job reject counters live here too.

use serde::de::DeserializeOwned;
use serde::Serialize;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::hmm::Region;
use crate::core::PipelineError;

/// Zip parallel per-branch region lists, verifying they agree
/// region-for-region on the identity tuple. Returns, per region
/// index, the branch entries in branch order.
pub fn zip_regions<'a, T, F>(
    branches: &'a [Vec<T>],
    key: F,
    context: &str,
) -> Result<Vec<Vec<&'a T>>, PipelineError>
where
    F: Fn(&T) -> &Region,
{
    let Some(first) = branches.first() else {
        return Ok(Vec::new());
    };

    for (branch, entries) in branches.iter().enumerate().skip(1) {
        if entries.len() != first.len() {
            return Err(PipelineError::mismatch(
                context,
                format!(
                    "branch {} carries {} regions, branch 0 carries {}",
                    branch,
                    entries.len(),
                    first.len()
                ),
            ));
        }
    }

    let mut zipped = Vec::with_capacity(first.len());
    for index in 0..first.len() {
        let reference_region = key(&first[index]);

        for (branch, entries) in branches.iter().enumerate().skip(1) {
            let other = key(&entries[index]);
            if other != reference_region {
                return Err(PipelineError::mismatch(
                    context,
                    format!(
                        "region {} diverges in branch {}: {:?} vs {:?}",
                        index, branch, reference_region, other
                    ),
                ));
            }
        }

        zipped.push(branches.iter().map(|entries| &entries[index]).collect());
    }

    Ok(zipped)
}

/// Persist one job artifact atomically: serialize next to the final
/// path, rename into place. A cancelled or failed job never leaves a
/// final artifact behind.
pub fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp = path.with_extension("tmp");
    let payload = serde_json::to_vec(value)?;
    fs::write(&temp, payload)?;
    fs::rename(&temp, path)?;

    Ok(())
}

pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let payload = fs::read(path)?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Cooperative cancellation with an optional wall-clock deadline. A
/// cancelled or timed-out job stops after the current record and
/// discards its partial output; since every input is persisted and
/// immutable, such a job is re-runnable as-is.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(limit: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + limit),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }

        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    pub fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Diagnostic tallies of reads rejected by the per-stage filters.
/// Rejection is not an error; the counts are logged per job.
#[derive(Debug, Default)]
pub struct RejectCounter {
    pub kept: AtomicU64,
    pub duplicates: AtomicU64,
    pub mismatched: AtomicU64,
    pub untagged: AtomicU64,
}

impl RejectCounter {
    pub fn keep(&self) {
        self.kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mismatch(&self) {
        self.mismatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn untagged(&self) {
        self.untagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log(&self, job: &str) {
        log::info!(
            "{}: kept {}, dropped {} duplicate / {} mismatched / {} untagged",
            job,
            self.kept.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.mismatched.load(Ordering::Relaxed),
            self.untagged.load(Ordering::Relaxed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Strand;

    fn region(start: u64, end: u64) -> Region {
        Region {
            start,
            end,
            max_count: 5,
            log_prob: -1.25,
            strand: Strand::Forward,
        }
    }

    #[test]
    fn test_zip_regions_groups_by_index() {
        let branches = vec![
            vec![region(1, 10), region(20, 30)],
            vec![region(1, 10), region(20, 30)],
        ];

        let zipped = zip_regions(&branches, |r| r, "test").unwrap();
        assert_eq!(zipped.len(), 2);
        assert_eq!(zipped[0].len(), 2);
        assert_eq!(zipped[1][1].start, 20);
    }

    #[test]
    fn test_zip_regions_rejects_length_divergence() {
        let branches = vec![vec![region(1, 10)], vec![]];
        assert!(zip_regions(&branches, |r| r, "test").is_err());
    }

    #[test]
    fn test_zip_regions_rejects_identity_divergence() {
        let mut other = region(1, 10);
        other.log_prob = -9.0;
        let branches = vec![vec![region(1, 10)], vec![other]];
        assert!(zip_regions(&branches, |r| r, "test").is_err());
    }

    #[test]
    fn test_artifact_roundtrip_and_atomicity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage.c1.json");

        let regions = vec![region(1, 10)];
        write_artifact(&path, &regions).unwrap();

        assert!(path.is_file());
        assert!(!path.with_extension("tmp").exists());

        let back: Vec<Region> = read_artifact(&path).unwrap();
        assert_eq!(back, regions);
    }

    #[test]
    fn test_cancel_token_checkpoint() {
        let token = CancelToken::new();
        assert!(token.checkpoint().is_ok());
        token.cancel();
        assert!(token.checkpoint().is_err());
    }

    #[test]
    fn test_deadline_expires() {
        let token = CancelToken::with_deadline(Duration::from_secs(0));
        assert!(token.checkpoint().is_err());

        let token = CancelToken::with_deadline(Duration::from_secs(3600));
        assert!(token.checkpoint().is_ok());
    }
}

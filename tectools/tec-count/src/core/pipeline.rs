//! Chunk orchestrator
//!
//! Materializes the stage DAG over (input x chunk) and per-chunk
//! jobs. Jobs within a stage are mutually independent and run on the
//! rayon pool; across stages the only coupling is the presence of the
//! upstream artifacts on disk. Every job publishes exactly one
//! artifact atomically, so rerunning a completed job is a no-op and a
//! failed run resumes from its last completed jobs.

use rayon::prelude::*;
use rust_htslib::bam::{self, Read};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::bins::{bin_reads, merge_tracks, StrandTracks};
use crate::core::chunks::{chunk_references, Chunk};
use crate::core::counts::{count_reads, merge_counts, CountedRegion, RegionCounts};
use crate::core::ends::{
    choose_end, extract_region_ends, filter_ends, merge_ends, ChosenEnd, ChosenRegion, PolyaScreen,
    RegionEnds,
};
use crate::core::filters::Alignment;
use crate::core::hmm::{
    join_regions, peak_bins, BinState, BinnedTrack, HmmProcess, RefSummary, Region,
    SegmentationModel,
};
use crate::core::peaks::{build_peaks, merge_peaks, StrandPeaks};
use crate::core::sequence::{reference_lengths, FastaSource, RefSeq};
use crate::core::tags::TagMatcher;
use crate::core::PipelineError;
use crate::utils::{read_artifact, write_artifact, CancelToken, RejectCounter};
use config::{ConfigError, Settings, Strand, ARTIFACT_DIR, COUNTS_TABLE};

const STAGE_TAGS: &str = "tags";
const STAGE_BINS: &str = "bins";
const STAGE_PEAKS: &str = "peaks";
const STAGE_MERGE: &str = "peakmerge";
const STAGE_REGIONS: &str = "regions";
const STAGE_ENDS: &str = "ends";
const STAGE_ENDMERGE: &str = "endmerge";
const STAGE_ENDFILTER: &str = "endfilter";
const STAGE_CHOOSE: &str = "choose";
const STAGE_COUNTS: &str = "counts";
const STAGE_TABLE: &str = "table";

/// Merged per-chunk coverage and peaks across inputs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct MergedChunk {
    bins: BTreeMap<String, StrandTracks>,
    peaks: BTreeMap<String, StrandPeaks>,
}

pub struct Pipeline {
    settings: Settings,
    outdir: PathBuf,
    inputs: Vec<PathBuf>,
    chunks: Vec<Chunk>,
    token: CancelToken,
}

impl Pipeline {
    /// Derive the chunk layout and verify that every input talks
    /// about the same genome.
    pub fn new(settings: Settings, outdir: PathBuf) -> Result<Self, PipelineError> {
        let inputs = settings.inputs();
        let references = reference_lengths(&inputs[0])?;

        for input in inputs.iter().skip(1) {
            let other = reference_lengths(input)?;
            if other != references {
                return Err(PipelineError::Config(ConfigError::Invalid(format!(
                    "input {:?} references a different genome than {:?}",
                    input, inputs[0]
                ))));
            }
        }

        let chunks = chunk_references(
            &references,
            settings.chunk_total,
            &settings.skip_sequences,
            settings.test_chunk,
        );

        for chunk in &chunks {
            log::info!(
                "chunk {}: {} references, {} bp",
                chunk.ordinal,
                chunk.references.len(),
                chunk.total_bp()
            );
        }

        Ok(Pipeline {
            settings,
            outdir,
            inputs,
            chunks,
            token: CancelToken::new(),
        })
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Drive every stage over every chunk, then assemble the final
    /// count table.
    pub fn run(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(self.outdir.join(ARTIFACT_DIR))?;

        log::info!("Stage 1/11: tag counting");
        self.per_input_stage(STAGE_TAGS, |input, chunk| self.job_tags(input, chunk))?;
        self.check_tag_presence()?;

        log::info!("Stage 2/11: read binning");
        self.per_input_stage(STAGE_BINS, |input, chunk| self.job_bins(input, chunk))?;

        log::info!("Stage 3/11: peak extraction");
        self.per_input_stage(STAGE_PEAKS, |input, chunk| self.job_peaks(input, chunk))?;

        log::info!("Stage 4/11: peak merging");
        self.per_chunk_stage(STAGE_MERGE, |chunk| self.job_merge(chunk))?;

        log::info!("Stage 5/11: segmentation");
        self.per_chunk_stage(STAGE_REGIONS, |chunk| self.job_regions(chunk))?;

        log::info!("Stage 6/11: 3'-end extraction");
        self.per_input_stage(STAGE_ENDS, |input, chunk| self.job_ends(input, chunk))?;

        log::info!("Stage 7/11: 3'-end merging");
        self.per_chunk_stage(STAGE_ENDMERGE, |chunk| self.job_endmerge(chunk))?;

        log::info!("Stage 8/11: 3'-end filtering");
        self.per_chunk_stage(STAGE_ENDFILTER, |chunk| self.job_endfilter(chunk))?;

        log::info!("Stage 9/11: 3'-end choosing");
        self.per_chunk_stage(STAGE_CHOOSE, |chunk| self.job_choose(chunk))?;

        log::info!("Stage 10/11: read counting");
        self.per_input_stage(STAGE_COUNTS, |input, chunk| self.job_counts(input, chunk))?;

        log::info!("Stage 11/11: count merging");
        self.per_chunk_stage(STAGE_TABLE, |chunk| self.job_table(chunk))?;

        self.write_table()
    }

    // -- job scheduling ---------------------------------------------------

    fn per_input_stage<F>(&self, stage: &str, job: F) -> Result<(), PipelineError>
    where
        F: Fn(&Path, &Chunk) -> Result<(), PipelineError> + Sync,
    {
        let jobs: Vec<(&PathBuf, &Chunk)> = self
            .inputs
            .iter()
            .flat_map(|input| self.chunks.iter().map(move |chunk| (input, chunk)))
            .collect();

        let pb = config::get_progress_bar(jobs.len() as u64, stage);

        let result = jobs.par_iter().try_for_each(|&(input, chunk)| {
            self.token.checkpoint()?;
            job(input, chunk).map_err(|e| {
                log::error!(
                    "{} job failed for input {:?}, chunk {}: {}",
                    stage,
                    input,
                    chunk.ordinal,
                    e
                );
                e
            })?;

            pb.inc(1);
            Ok(())
        });

        pb.finish_and_clear();
        result
    }

    fn per_chunk_stage<F>(&self, stage: &str, job: F) -> Result<(), PipelineError>
    where
        F: Fn(&Chunk) -> Result<(), PipelineError> + Sync,
    {
        let pb = config::get_progress_bar(self.chunks.len() as u64, stage);

        let result = self.chunks.par_iter().try_for_each(|chunk| {
            self.token.checkpoint()?;
            job(chunk).map_err(|e| {
                log::error!("{} job failed for chunk {}: {}", stage, chunk.ordinal, e);
                e
            })?;

            pb.inc(1);
            Ok(())
        });

        pb.finish_and_clear();
        result
    }

    // -- artifact naming --------------------------------------------------

    fn chunk_artifact(&self, stage: &str, chunk: &Chunk) -> PathBuf {
        self.outdir
            .join(ARTIFACT_DIR)
            .join(format!("{}.c{}.json", stage, chunk.ordinal))
    }

    fn input_artifact(&self, stage: &str, chunk: &Chunk, input: &Path) -> PathBuf {
        let index = self
            .inputs
            .iter()
            .position(|i| i == input)
            .unwrap_or_else(|| panic!("ERROR: unknown input {:?}!", input));

        self.outdir
            .join(ARTIFACT_DIR)
            .join(format!("{}.c{}.i{}.json", stage, chunk.ordinal, index))
    }

    fn matcher_for(&self, input: &Path) -> Result<TagMatcher, PipelineError> {
        TagMatcher::new(&self.settings.barcodes_for(input))
    }

    // -- BAM traversal ----------------------------------------------------

    /// Pull every primary mapped alignment of one reference, in
    /// coordinate order.
    fn scan_reference(
        &self,
        input: &Path,
        reference: &RefSeq,
    ) -> Result<Vec<Alignment>, PipelineError> {
        let mut reader = bam::IndexedReader::from_path(input)?;
        let tid = reader
            .header()
            .tid(reference.name.as_bytes())
            .unwrap_or_else(|| {
                panic!(
                    "ERROR: reference '{}' missing from input {:?}!",
                    reference.name, input
                )
            });

        reader.fetch(tid as i32)?;

        let mut alignments = Vec::new();
        for result in reader.records() {
            self.token.checkpoint()?;
            let record = result?;
            if record.is_unmapped() || record.is_secondary() || record.is_supplementary() {
                continue;
            }
            alignments.push(Alignment::from_record(&record));
        }

        Ok(alignments)
    }

    // -- per (input x chunk) jobs -----------------------------------------

    fn job_tags(&self, input: &Path, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.input_artifact(STAGE_TAGS, chunk, input);
        if path.is_file() {
            return Ok(());
        }

        let matcher = self.matcher_for(input)?;
        let mut tallies: BTreeMap<String, u64> =
            matcher.barcodes().map(|b| (b.to_string(), 0)).collect();

        for reference in &chunk.references {
            for alignment in self.scan_reference(input, reference)? {
                if let Some(hit) = matcher.match_name(&alignment.name) {
                    *tallies.get_mut(hit.barcode).expect("no tallied barcode") += 1;
                }
            }
        }

        write_artifact(&path, &tallies)
    }

    /// A barcode with zero matches across every scanned chunk of its
    /// input is a configuration fault.
    fn check_tag_presence(&self) -> Result<(), PipelineError> {
        for input in &self.inputs {
            let mut totals: BTreeMap<String, u64> = BTreeMap::new();

            for chunk in &self.chunks {
                let tallies: BTreeMap<String, u64> =
                    read_artifact(&self.input_artifact(STAGE_TAGS, chunk, input))?;
                for (barcode, count) in tallies {
                    *totals.entry(barcode).or_insert(0) += count;
                }
            }

            for (barcode, total) in totals {
                if total == 0 {
                    return Err(PipelineError::Config(ConfigError::Invalid(format!(
                        "barcode '{}' matches no read in input {:?}",
                        barcode, input
                    ))));
                }
                log::info!("{:?}: {} reads tagged '{}'", input, total, barcode);
            }
        }

        Ok(())
    }

    fn job_bins(&self, input: &Path, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.input_artifact(STAGE_BINS, chunk, input);
        if path.is_file() {
            return Ok(());
        }

        let matcher = self.matcher_for(input)?;
        let counter = RejectCounter::default();
        let mut tracks: BTreeMap<String, StrandTracks> = BTreeMap::new();

        for reference in &chunk.references {
            let alignments = self.scan_reference(input, reference)?;
            tracks.insert(
                reference.name.clone(),
                bin_reads(
                    &alignments,
                    &matcher,
                    self.settings.bin_size,
                    self.settings.mismatch_threshold,
                    &counter,
                ),
            );
        }

        counter.log(&format!("bins c{} {:?}", chunk.ordinal, input));
        write_artifact(&path, &tracks)
    }

    fn job_peaks(&self, input: &Path, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.input_artifact(STAGE_PEAKS, chunk, input);
        if path.is_file() {
            return Ok(());
        }

        let matcher = self.matcher_for(input)?;
        let counter = RejectCounter::default();
        let mut peaks: BTreeMap<String, StrandPeaks> = BTreeMap::new();

        for reference in &chunk.references {
            let alignments = self.scan_reference(input, reference)?;
            peaks.insert(
                reference.name.clone(),
                build_peaks(
                    &alignments,
                    &matcher,
                    self.settings.peak_buffer_width,
                    self.settings.mismatch_threshold,
                    &counter,
                ),
            );
        }

        counter.log(&format!("peaks c{} {:?}", chunk.ordinal, input));
        write_artifact(&path, &peaks)
    }

    fn job_ends(&self, input: &Path, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.input_artifact(STAGE_ENDS, chunk, input);
        if path.is_file() {
            return Ok(());
        }

        let regions: BTreeMap<String, Vec<Region>> =
            read_artifact(&self.chunk_artifact(STAGE_REGIONS, chunk))?;
        let matcher = self.matcher_for(input)?;

        let mut ends: BTreeMap<String, Vec<RegionEnds>> = BTreeMap::new();
        for reference in &chunk.references {
            let Some(region_list) = regions.get(&reference.name) else {
                ends.insert(reference.name.clone(), Vec::new());
                continue;
            };

            let alignments = self.scan_reference(input, reference)?;
            let list = region_list
                .iter()
                .map(|region| RegionEnds {
                    region: region.clone(),
                    candidates: extract_region_ends(
                        region,
                        &reference.name,
                        region.strand,
                        &alignments,
                        &matcher,
                        self.settings.mismatch_threshold,
                    ),
                })
                .collect();

            ends.insert(reference.name.clone(), list);
        }

        write_artifact(&path, &ends)
    }

    fn job_counts(&self, input: &Path, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.input_artifact(STAGE_COUNTS, chunk, input);
        if path.is_file() {
            return Ok(());
        }

        let chosen: BTreeMap<String, Vec<ChosenRegion>> =
            read_artifact(&self.chunk_artifact(STAGE_CHOOSE, chunk))?;
        let matcher = self.matcher_for(input)?;

        let mut counts: BTreeMap<String, Vec<RegionCounts>> = BTreeMap::new();
        for reference in &chunk.references {
            let Some(region_list) = chosen.get(&reference.name) else {
                counts.insert(reference.name.clone(), Vec::new());
                continue;
            };

            let alignments = self.scan_reference(input, reference)?;
            let list = region_list
                .iter()
                .map(|region| {
                    count_reads(
                        region,
                        &alignments,
                        &matcher,
                        self.settings.mismatch_threshold,
                    )
                })
                .collect();

            counts.insert(reference.name.clone(), list);
        }

        write_artifact(&path, &counts)
    }

    // -- per chunk jobs ---------------------------------------------------

    fn job_merge(&self, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.chunk_artifact(STAGE_MERGE, chunk);
        if path.is_file() {
            return Ok(());
        }

        let mut input_bins: Vec<BTreeMap<String, StrandTracks>> = Vec::new();
        let mut input_peaks: Vec<BTreeMap<String, StrandPeaks>> = Vec::new();

        for input in &self.inputs {
            input_bins.push(read_artifact(&self.input_artifact(STAGE_BINS, chunk, input))?);
            input_peaks.push(read_artifact(&self.input_artifact(
                STAGE_PEAKS,
                chunk,
                input,
            ))?);
        }

        let mut merged = MergedChunk {
            bins: BTreeMap::new(),
            peaks: BTreeMap::new(),
        };

        for reference in &chunk.references {
            let tracks: Vec<&StrandTracks> = input_bins
                .iter()
                .filter_map(|bins| bins.get(&reference.name))
                .collect();
            merged
                .bins
                .insert(reference.name.clone(), merge_tracks(tracks));

            let forward: Vec<&[crate::core::peaks::Peak]> = input_peaks
                .iter()
                .filter_map(|peaks| peaks.get(&reference.name))
                .map(|p| p.forward.as_slice())
                .collect();
            let reverse: Vec<&[crate::core::peaks::Peak]> = input_peaks
                .iter()
                .filter_map(|peaks| peaks.get(&reference.name))
                .map(|p| p.reverse.as_slice())
                .collect();

            merged.peaks.insert(
                reference.name.clone(),
                StrandPeaks {
                    forward: merge_peaks(&forward, self.settings.peak_buffer_width),
                    reverse: merge_peaks(&reverse, self.settings.peak_buffer_width),
                },
            );
        }

        write_artifact(&path, &merged)
    }

    fn job_regions(&self, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.chunk_artifact(STAGE_REGIONS, chunk);
        if path.is_file() {
            return Ok(());
        }

        let merged: MergedChunk = read_artifact(&self.chunk_artifact(STAGE_MERGE, chunk))?;

        let mut tracks: Vec<BinnedTrack> = Vec::new();
        for reference in &chunk.references {
            let summary = RefSummary {
                total_bp: reference.length,
                read_length: self.settings.read2_length,
                sig_level: self.settings.hmm_sig_level,
                bin_size: self.settings.bin_size,
            };

            let bins = &merged.bins[&reference.name];
            let peaks = &merged.peaks[&reference.name];

            for strand in [Strand::Forward, Strand::Reverse] {
                let covered =
                    peak_bins(bins.track(strand), peaks.peaks(strand), self.settings.bin_size);
                if covered.is_empty() {
                    continue;
                }

                tracks.push(BinnedTrack {
                    reference: reference.name.clone(),
                    strand,
                    summary: summary.clone(),
                    bins: covered,
                });
            }
        }

        let model = HmmProcess::new(self.settings.hmm_binary.clone());
        let states = if tracks.is_empty() {
            Vec::new()
        } else {
            model.assign_states(&tracks)?
        };

        let mut regions: BTreeMap<String, Vec<Region>> = BTreeMap::new();
        for track in &tracks {
            let track_states: Vec<BinState> = states
                .iter()
                .filter(|s| s.reference == track.reference && s.strand == track.strand)
                .cloned()
                .collect();

            let joined = join_regions(&track_states, &track.bins, self.settings.bin_size);
            regions
                .entry(track.reference.clone())
                .or_default()
                .extend(joined);
        }

        for list in regions.values_mut() {
            list.sort_by_key(|r| (r.start, r.end, r.strand.as_i8()));
        }

        write_artifact(&path, &regions)
    }

    fn job_endmerge(&self, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.chunk_artifact(STAGE_ENDMERGE, chunk);
        if path.is_file() {
            return Ok(());
        }

        let mut branches: Vec<BTreeMap<String, Vec<RegionEnds>>> = Vec::new();
        for input in &self.inputs {
            branches.push(read_artifact(&self.input_artifact(STAGE_ENDS, chunk, input))?);
        }

        let mut merged: BTreeMap<String, Vec<RegionEnds>> = BTreeMap::new();
        for reference in &chunk.references {
            let lists: Vec<Vec<RegionEnds>> = branches
                .iter()
                .map(|branch| branch.get(&reference.name).cloned().unwrap_or_default())
                .collect();

            merged.insert(reference.name.clone(), merge_ends(&lists)?);
        }

        write_artifact(&path, &merged)
    }

    fn job_endfilter(&self, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.chunk_artifact(STAGE_ENDFILTER, chunk);
        if path.is_file() {
            return Ok(());
        }

        let fasta = self.settings.ref_fasta.as_ref().ok_or_else(|| {
            PipelineError::Config(ConfigError::Invalid(
                "3'-end filtering needs ref_fasta; remote retrieval is handled by the annotation resolver"
                    .to_string(),
            ))
        })?;
        let source = FastaSource::open(fasta)?;
        let screen = PolyaScreen::new()?;

        let mut merged: BTreeMap<String, Vec<RegionEnds>> =
            read_artifact(&self.chunk_artifact(STAGE_ENDMERGE, chunk))?;

        for list in merged.values_mut() {
            for ends in list.iter_mut() {
                filter_ends(ends, &source, &screen)?;
            }
        }

        write_artifact(&path, &merged)
    }

    fn job_choose(&self, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.chunk_artifact(STAGE_CHOOSE, chunk);
        if path.is_file() {
            return Ok(());
        }

        let filtered: BTreeMap<String, Vec<RegionEnds>> =
            read_artifact(&self.chunk_artifact(STAGE_ENDFILTER, chunk))?;

        let mut chosen: BTreeMap<String, Vec<ChosenRegion>> = BTreeMap::new();
        for (reference, list) in &filtered {
            chosen.insert(
                reference.clone(),
                list.iter().map(|ends| choose_end(ends, reference)).collect(),
            );
        }

        write_artifact(&path, &chosen)
    }

    fn job_table(&self, chunk: &Chunk) -> Result<(), PipelineError> {
        let path = self.chunk_artifact(STAGE_TABLE, chunk);
        if path.is_file() {
            return Ok(());
        }

        let mut branches: Vec<(PathBuf, BTreeMap<String, Vec<RegionCounts>>)> = Vec::new();
        for input in &self.inputs {
            branches.push((
                input.clone(),
                read_artifact(&self.input_artifact(STAGE_COUNTS, chunk, input))?,
            ));
        }

        let mut table: BTreeMap<String, Vec<CountedRegion>> = BTreeMap::new();
        for reference in &chunk.references {
            let per_input: Vec<(PathBuf, Vec<RegionCounts>)> = branches
                .iter()
                .map(|(input, counts)| {
                    (
                        input.clone(),
                        counts.get(&reference.name).cloned().unwrap_or_default(),
                    )
                })
                .collect();

            table.insert(
                reference.name.clone(),
                merge_counts(&self.settings, &per_input)?,
            );
        }

        write_artifact(&path, &table)
    }

    // -- final table ------------------------------------------------------

    /// Concatenate the per-chunk tables into one file ordered by
    /// reference ordinal, then region start.
    fn write_table(&self) -> Result<(), PipelineError> {
        let mut rows: Vec<(usize, u64, String)> = Vec::new();

        for chunk in &self.chunks {
            let table: BTreeMap<String, Vec<CountedRegion>> =
                read_artifact(&self.chunk_artifact(STAGE_TABLE, chunk))?;

            for reference in &chunk.references {
                let Some(regions) = table.get(&reference.name) else {
                    continue;
                };

                for counted in regions {
                    rows.push((
                        reference.ordinal,
                        counted.region.start,
                        format_row(&reference.name, counted),
                    ));
                }
            }
        }

        rows.sort_by_key(|(ordinal, start, _)| (*ordinal, *start));

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(header_row(&self.settings));
        lines.extend(rows.into_iter().map(|(_, _, line)| line));

        config::write_collection(&lines, &self.outdir.join(COUNTS_TABLE));
        log::info!("Wrote {} regions to {}", lines.len() - 1, COUNTS_TABLE);

        Ok(())
    }
}

fn header_row(settings: &Settings) -> String {
    let mut columns = vec![
        "chr".to_string(),
        "region_start".to_string(),
        "region_end".to_string(),
        "max_read_count".to_string(),
        "log_prob_sum".to_string(),
        "end_chr".to_string(),
        "end_position".to_string(),
        "end_strand".to_string(),
        "end_read_count".to_string(),
    ];
    columns.extend(settings.samples.iter().map(|s| s.name.clone()));
    columns.join("\t")
}

fn format_row(reference: &str, counted: &CountedRegion) -> String {
    let region = &counted.region;

    let (end_chr, end_pos, end_strand, end_count) = match &counted.end {
        ChosenEnd::Present {
            reference,
            position,
            strand,
            count,
        } => (
            reference.clone(),
            position.to_string(),
            strand.to_string(),
            count.to_string(),
        ),
        ChosenEnd::Absent { strand } => (
            "NA".to_string(),
            "NA".to_string(),
            strand.to_string(),
            "NA".to_string(),
        ),
    };

    let mut fields = vec![
        reference.to_string(),
        region.start.to_string(),
        region.end.to_string(),
        region.max_count.to_string(),
        format!("{:.6}", region.log_prob),
        end_chr,
        end_pos,
        end_strand,
        end_count,
    ];
    fields.extend(counted.counts.iter().map(|c| c.to_string()));
    fields.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row_with_absent_end() {
        let counted = CountedRegion {
            region: Region {
                start: 1000,
                end: 2000,
                max_count: 30,
                log_prob: -8.5,
                strand: Strand::Reverse,
            },
            end: ChosenEnd::Absent {
                strand: Strand::Reverse,
            },
            counts: vec![0, 4],
        };

        let row = format_row("2", &counted);
        assert_eq!(
            row,
            "2\t1000\t2000\t30\t-8.500000\tNA\tNA\t-1\tNA\t0\t4"
        );
    }

    #[test]
    fn test_format_row_with_present_end() {
        let counted = CountedRegion {
            region: Region {
                start: 1000,
                end: 1800,
                max_count: 30,
                log_prob: -8.5,
                strand: Strand::Forward,
            },
            end: ChosenEnd::Present {
                reference: "2".to_string(),
                position: 1800,
                strand: Strand::Forward,
                count: 12,
            },
            counts: vec![10, 20],
        };

        let row = format_row("2", &counted);
        assert!(row.starts_with("2\t1000\t1800\t30\t-8.500000\t2\t1800\t+1\t12"));
        assert!(row.ends_with("\t10\t20"));
    }
}

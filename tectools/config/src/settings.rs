//! Run settings for the counting pipeline
//!
//! A run is described by a single YAML file naming the genome, the
//! chunking granularity, the segmentation binary and one entry per
//! sample. Everything is validated up front so a misconfigured run
//! dies before the first job is dispatched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::{
    DEFAULT_BIN_SIZE, DEFAULT_MISMATCH_THRESHOLD, DEFAULT_PEAK_BUFFER, DEFAULT_READ2_LENGTH,
    DEFAULT_SIG_LEVEL, MAX_RUN_NAME_LEN,
};

/// IUPAC nucleotide alphabet accepted in molecular barcodes
pub const BARCODE_ALPHABET: &str = "ACGTNRYKMSWBDHV";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed settings file: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// One sequencing sample: a barcode inside one input file, plus the
/// labels the downstream testing engine groups it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub bam_file: PathBuf,
    pub tag: String,
    pub condition: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Optional remote-annotation connection used to back sequence
/// retrieval when no FASTA is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnsemblSettings {
    pub ensembl_host: String,
    pub ensembl_port: u32,
    pub ensembl_user: String,
    pub ensembl_database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub name: String,
    pub chunk_total: u64,
    #[serde(default)]
    pub ref_fasta: Option<PathBuf>,
    #[serde(default = "default_mismatch_threshold")]
    pub mismatch_threshold: u32,
    #[serde(default = "default_bin_size")]
    pub bin_size: u64,
    #[serde(default = "default_peak_buffer")]
    pub peak_buffer_width: u64,
    #[serde(default = "default_sig_level")]
    pub hmm_sig_level: f64,
    #[serde(default = "default_read2_length")]
    pub read2_length: u64,
    pub hmm_binary: PathBuf,
    #[serde(flatten)]
    pub ensembl: Option<EnsemblSettings>,
    #[serde(default)]
    pub test_chunk: Option<u64>,
    #[serde(default)]
    pub skip_sequences: HashSet<String>,
    pub samples: Vec<Sample>,
}

fn default_mismatch_threshold() -> u32 {
    DEFAULT_MISMATCH_THRESHOLD
}

fn default_bin_size() -> u64 {
    DEFAULT_BIN_SIZE
}

fn default_peak_buffer() -> u64 {
    DEFAULT_PEAK_BUFFER
}

fn default_sig_level() -> f64 {
    DEFAULT_SIG_LEVEL
}

fn default_read2_length() -> u64 {
    DEFAULT_READ2_LENGTH
}

impl Settings {
    /// Load a settings file and validate it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML run description
    ///
    /// # Returns
    ///
    /// * `Result<Settings, ConfigError>` - The validated settings
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// use config::Settings;
    ///
    /// let settings = Settings::from_file("run.yaml".as_ref()).unwrap();
    /// assert!(!settings.samples.is_empty());
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let settings: Settings = serde_yml::from_reader(file)?;
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_name()?;
        self.check_genome()?;
        self.check_ensembl()?;
        self.check_samples()?;

        Ok(())
    }

    fn check_name(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "run name must not be empty or blank".to_string(),
            ));
        }
        if self.name.len() > MAX_RUN_NAME_LEN {
            return Err(ConfigError::Invalid(format!(
                "run name exceeds {} characters",
                MAX_RUN_NAME_LEN
            )));
        }

        Ok(())
    }

    fn check_genome(&self) -> Result<(), ConfigError> {
        if self.chunk_total == 0 {
            return Err(ConfigError::Invalid(
                "chunk_total must be a positive integer".to_string(),
            ));
        }

        match &self.ref_fasta {
            Some(fasta) => {
                File::open(fasta).map_err(|e| {
                    ConfigError::Invalid(format!("ref_fasta {:?} is not readable: {}", fasta, e))
                })?;
            }
            None if self.ensembl.is_none() => {
                return Err(ConfigError::Invalid(
                    "either ref_fasta or an ensembl connection must be configured".to_string(),
                ));
            }
            None => {}
        }

        if !self.hmm_binary.is_file() {
            return Err(ConfigError::Invalid(format!(
                "hmm_binary {:?} does not exist",
                self.hmm_binary
            )));
        }

        if let Some(chunk) = self.test_chunk {
            if chunk == 0 || chunk > self.chunk_total {
                return Err(ConfigError::Invalid(format!(
                    "test_chunk must be within 1..={}",
                    self.chunk_total
                )));
            }
        }

        Ok(())
    }

    fn check_ensembl(&self) -> Result<(), ConfigError> {
        if let Some(ensembl) = &self.ensembl {
            if ensembl.ensembl_host.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "ensembl_host must not be blank".to_string(),
                ));
            }
            if ensembl.ensembl_port == 0 || ensembl.ensembl_port > 65535 {
                return Err(ConfigError::Invalid(format!(
                    "ensembl_port {} is not a valid port",
                    ensembl.ensembl_port
                )));
            }
        }

        Ok(())
    }

    fn check_samples(&self) -> Result<(), ConfigError> {
        if self.samples.is_empty() {
            return Err(ConfigError::Invalid("no samples configured".to_string()));
        }

        let cardinality = self.samples[0].groups.len();
        let mut names = HashSet::new();
        let mut pairs = HashSet::new();
        let mut labels = HashSet::new();

        for sample in &self.samples {
            if !names.insert(sample.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate sample name '{}'",
                    sample.name
                )));
            }

            if !pairs.insert((sample.bam_file.as_path(), sample.tag.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate (input, barcode) pair ({:?}, {})",
                    sample.bam_file, sample.tag
                )));
            }

            if sample.groups.len() != cardinality {
                return Err(ConfigError::Invalid(format!(
                    "sample '{}' carries {} group labels, expected {}",
                    sample.name,
                    sample.groups.len(),
                    cardinality
                )));
            }

            for label in &sample.groups {
                if !labels.insert(label.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "group label '{}' appears in more than one sample",
                        label
                    )));
                }
            }

            check_barcode(&sample.tag)?;
            check_indexed(&sample.bam_file)?;
        }

        Ok(())
    }

    /// Distinct input files in first-appearance order. Several samples
    /// may share one file under different barcodes.
    pub fn inputs(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut inputs = Vec::new();

        for sample in &self.samples {
            if seen.insert(sample.bam_file.clone()) {
                inputs.push(sample.bam_file.clone());
            }
        }

        inputs
    }

    /// Barcodes configured for one input file, in sample order.
    pub fn barcodes_for(&self, input: &Path) -> Vec<String> {
        self.samples
            .iter()
            .filter(|s| s.bam_file == input)
            .map(|s| s.tag.clone())
            .collect()
    }

    /// Index of the sample owning an (input, barcode) pair in the
    /// canonical sample order, if any.
    pub fn sample_index(&self, input: &Path, tag: &str) -> Option<usize> {
        self.samples
            .iter()
            .position(|s| s.bam_file == input && s.tag == tag)
    }
}

fn check_barcode(tag: &str) -> Result<(), ConfigError> {
    if tag.is_empty() {
        return Err(ConfigError::Invalid("empty barcode".to_string()));
    }

    for base in tag.chars() {
        if !BARCODE_ALPHABET.contains(base) {
            return Err(ConfigError::Invalid(format!(
                "barcode '{}' contains non-IUPAC letter '{}'",
                tag, base
            )));
        }
    }

    Ok(())
}

fn check_indexed(bam: &Path) -> Result<(), ConfigError> {
    if !bam.is_file() {
        return Err(ConfigError::Invalid(format!(
            "input file {:?} does not exist",
            bam
        )));
    }

    let mut sibling = bam.as_os_str().to_owned();
    sibling.push(".bai");
    let with_suffix = PathBuf::from(sibling);
    let swapped = bam.with_extension("bai");

    if !with_suffix.is_file() && !swapped.is_file() {
        return Err(ConfigError::Invalid(format!(
            "input file {:?} has no sibling index",
            bam
        )));
    }

    Ok(())
}

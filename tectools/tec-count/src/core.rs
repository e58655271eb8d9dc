//! Core module for the 3'-end counting pipeline
//!
//! The pipeline is a directed acyclic graph over fixed genome chunks.
//! Per (input, chunk) stages tally tags, bin read-2 coverage and build
//! per-input peaks; per-chunk stages merge peaks across inputs, drive
//! the segmentation subprocess into candidate regions, derive and fuse
//! 3'-end candidates, pick one end per region and stitch per-sample
//! count vectors. Every stage persists exactly one artifact, so a run
//! is resumable and each stage is testable on its own.

use thiserror::Error;

pub mod bins;
pub mod chunks;
pub mod counts;
pub mod ends;
pub mod filters;
pub mod hmm;
pub mod peaks;
pub mod pipeline;
pub mod sequence;
pub mod tags;

pub use pipeline::Pipeline;

/// Load the run settings and drive every stage over every chunk.
///
/// # Arguments
///
/// * `args` - The command line arguments
///
/// # Returns
///
/// * `Result<()>` - The result of the run
///
/// # Example
///
/// ```rust, no_run
/// use clap::Parser;
/// use tec_count::cli::Args;
///
/// let args = Args::parse();
/// tec_count::core::run(args).unwrap();
/// ```
pub fn run(args: crate::cli::Args) -> anyhow::Result<()> {
    let settings = config::Settings::from_file(&args.config)?;
    log::info!(
        "Run '{}': {} samples over {} inputs",
        settings.name,
        settings.samples.len(),
        settings.inputs().len()
    );

    let pipeline = Pipeline::new(settings, args.outdir)?;
    pipeline.run()?;

    Ok(())
}

/// Error kinds surfaced to the orchestrator. All of them are fatal at
/// the job level; the orchestrator does not retry.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Alignment file error: {0}")]
    Hts(#[from] rust_htslib::errors::Error),
    #[error("Artifact encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Barcode pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Structural mismatch in {context}: {detail}")]
    StructuralMismatch { context: String, detail: String },
    #[error("Segmentation subprocess failed with status {status}: {stderr}")]
    Subprocess { status: i32, stderr: String },
    #[error("Job cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn mismatch(context: &str, detail: impl Into<String>) -> Self {
        PipelineError::StructuralMismatch {
            context: context.to_string(),
            detail: detail.into(),
        }
    }
}

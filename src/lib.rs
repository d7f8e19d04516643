//! # GenCompass batch driver
//!
//! Prepares whole-genome-sequencing workflow batches for an external workflow
//! engine: per-unit input and options JSON, engine invocations, and the
//! submission scripts that run them.
//!
//! ## Pieces
//!
//! 1. **Interval binning**: contiguous, near-equal nucleotide bins per chromosome
//!    with a rebalancing pass for undersized bins ([`intervals`])
//! 2. **Sample bookkeeping**: manifest and fastq list joined into a sample set
//!    ([`manifest`])
//! 3. **Batch construction**: one deterministic workflow instance per sample,
//!    caller or bin, resumable from existing outputs ([`workflow`])
//!
//! ## Usage Example
//!
//! ```ignore
//! use gencompass::config::PipelineConfig;
//!
//! let config = PipelineConfig::new("cohort", "fastq.txt", "manifest.tsv")
//!     .with_output_dir("batch");
//! let summaries = gencompass::pipeline::prepare(&config)?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod intervals;
pub mod manifest;
pub mod pipeline;
pub mod workflow;

pub use config::{PipelineConfig, StageKind};
pub use intervals::{BinLabel, Interval, IntervalBinner};
pub use manifest::{FastqTable, Manifest};
pub use workflow::{BatchBuilder, Environment, Mode, WorkflowInstance};

use thiserror::Error;

/// Errors from any stage of batch preparation.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Interval reading or binning failed.
    #[error(transparent)]
    Binning(#[from] intervals::BinningError),

    /// Manifest, fastq list or sample list problem.
    #[error(transparent)]
    Manifest(#[from] manifest::ManifestError),

    /// Template, options or batch output problem.
    #[error(transparent)]
    Workflow(#[from] workflow::WorkflowError),
}

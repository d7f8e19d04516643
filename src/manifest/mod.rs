//! Sample manifest and fastq bookkeeping.
//!
//! The manifest ties sequencing runs to samples; the fastq list ties files to
//! runs. Together they decide which samples a batch covers and which fastq
//! files feed each sample's mapping.

mod fastq;
mod table;

pub use fastq::{
    extract_sample_lane_id, extract_sample_paired_end, extract_sample_run_id, FastqEntry,
    FastqTable,
};
pub use table::{read_table, standardize_column, Manifest};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Errors raised while reading manifests, fastq lists, and sample lists.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Filesystem failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed delimited table.
    #[error("table error in {path}: {source}")]
    Csv {
        /// Table path.
        path: PathBuf,
        /// Reader error.
        #[source]
        source: csv::Error,
    },

    /// Spreadsheet could not be read.
    #[error("spreadsheet error in {path}: {message}")]
    Excel {
        /// Workbook path.
        path: PathBuf,
        /// Reader message.
        message: String,
    },

    /// Extension is not one of csv/tsv/txt/xlsx/xls.
    #[error("unknown table type for {path}: expected .csv, .txt, .tsv, .xls or .xlsx")]
    UnsupportedFormat {
        /// Offending path.
        path: PathBuf,
    },

    /// Required column absent.
    #[error("{path} has no '{column}' column")]
    MissingColumn {
        /// Manifest path.
        path: PathBuf,
        /// Column that was looked up.
        column: String,
    },

    /// A requested sample is not in the manifest.
    #[error("sample '{sample}' is not listed in manifest {manifest}")]
    UnknownSample {
        /// Requested sample ID.
        sample: String,
        /// Manifest path.
        manifest: PathBuf,
    },
}

/// Decide which samples a batch covers.
///
/// Union of explicit IDs and the first column of `sample_list`; when both are
/// empty, every sample with fastq files. Every requested sample must be in the
/// manifest.
pub fn resolve_sample_ids(
    explicit: &[String],
    sample_list: Option<&Path>,
    manifest: &Manifest,
    fastq: &FastqTable,
) -> Result<BTreeSet<String>, ManifestError> {
    let mut samples: BTreeSet<String> = explicit
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    if let Some(path) = sample_list {
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        samples.extend(
            contents
                .lines()
                .filter_map(|line| line.split('\t').next())
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        );
    }

    if samples.is_empty() {
        samples = fastq.sample_ids();
    }

    if let Some(unknown) = samples.iter().find(|id| !manifest.contains_sample(id)) {
        return Err(ManifestError::UnknownSample {
            sample: unknown.clone(),
            manifest: manifest.path().to_path_buf(),
        });
    }

    info!(samples = samples.len(), "resolved sample set");
    Ok(samples)
}

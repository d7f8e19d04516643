//! Genomic interval binning.
//!
//! Reads interval bedfiles, partitions each chromosome into contiguous bins of
//! roughly equal nucleotide count, and names the resulting bins. Joint
//! genotyping and harmonization batch over these bin labels.

mod bed;
mod binner;
mod types;

pub use bed::{parse_bed, read_bedfile, write_interval_bins, BINNED_INTERVALS_FOF};
pub use binner::{IntervalBinner, DEFAULT_NUCLEOTIDES_PER_BIN};
pub use types::{Bin, BinLabel, BinnedInterval, ChromosomeBins, Interval};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing interval files.
#[derive(Debug, Error)]
pub enum BinningError {
    /// Filesystem failure on the given path.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed bed record.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// Source file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the record.
        message: String,
    },
}

impl BinningError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        BinningError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, line: usize, message: impl Into<String>) -> Self {
        BinningError::Parse {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Read a bedfile and bin every chromosome it contains.
pub fn bin_bedfile<P: AsRef<Path>>(
    bedfile: P,
    binner: &IntervalBinner,
) -> Result<Vec<ChromosomeBins>, BinningError> {
    let intervals = read_bedfile(bedfile)?;
    Ok(binner.bin_all(&intervals))
}

/// Ordered bin labels for a bedfile: `chr` or `chr.N` per surviving bin.
pub fn interval_names<P: AsRef<Path>>(
    bedfile: P,
    nucleotides_per_bin: i64,
) -> Result<Vec<BinLabel>, BinningError> {
    let binner = IntervalBinner::new(nucleotides_per_bin);
    let chromosomes = bin_bedfile(bedfile, &binner)?;
    Ok(chromosomes
        .iter()
        .flat_map(|chromosome| chromosome.labels().cloned())
        .collect())
}

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{Manifest, ManifestError};

const NOT_AVAILABLE: &str = "N/A";

// `_R1_`, `.R2.`, `_R1.` ...
fn paired_end_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"[._]R\d[._]").expect("paired-end pattern is valid"))
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Sample run ID: the fastq basename up to the first `_`.
pub fn extract_sample_run_id(fastq_path: &str) -> String {
    basename(fastq_path)
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Lane ID: everything in the basename before the last paired-end marker.
///
/// `I3-98765_S23_L001_R1_001.fastq.gz` and `I3-98765_S23_L001.R1.001.fastq.gz`
/// both give `I3-98765_S23_L001`. Returns `N/A` when there is no marker.
pub fn extract_sample_lane_id(fastq_path: &str) -> String {
    let name = basename(fastq_path);
    let marker = paired_end_marker();

    let mut last = None;
    let mut from = 0;
    while let Some(found) = marker.find_at(name, from) {
        last = Some(found.start());
        from = found.start() + 1;
    }

    match last {
        Some(end) => name[..end].to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Paired end (`R1`, `R2`, ...) from the first paired-end marker, or `N/A`.
pub fn extract_sample_paired_end(fastq_path: &str) -> String {
    paired_end_marker()
        .find(basename(fastq_path))
        .map(|found| found.as_str().trim_matches(|c| c == '.' || c == '_').to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// One fastq file attributed to a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqEntry {
    /// Sample the run belongs to.
    pub sample_id: String,
    /// Fastq location as listed.
    pub location: String,
}

impl FastqEntry {
    /// Lane ID of this file.
    pub fn lane_id(&self) -> String {
        extract_sample_lane_id(&self.location)
    }

    /// Paired end of this file.
    pub fn paired_end(&self) -> String {
        extract_sample_paired_end(&self.location)
    }
}

/// Fastq files joined to manifest samples.
#[derive(Debug, Clone, Default)]
pub struct FastqTable {
    entries: Vec<FastqEntry>,
}

impl FastqTable {
    /// Read a fastq file-of-files (one path per line).
    pub fn from_path<P: AsRef<Path>>(path: P, manifest: &Manifest) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_locations(
            contents.lines().map(str::trim).filter(|line| !line.is_empty()),
            manifest,
        ))
    }

    /// Attribute each location to a sample through the manifest's run IDs.
    ///
    /// Locations whose run ID is not in the manifest are dropped.
    pub fn from_locations<'a, I>(locations: I, manifest: &Manifest) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let run_map = manifest.sample_run_id_map();
        let mut entries = Vec::new();
        for location in locations {
            let run_id = extract_sample_run_id(location);
            match run_map.get(&run_id) {
                Some(sample_id) => entries.push(FastqEntry {
                    sample_id: sample_id.clone(),
                    location: location.to_string(),
                }),
                None => warn!(location, run_id = %run_id, "fastq run ID not found in manifest, skipping"),
            }
        }
        Self { entries }
    }

    /// All entries in input order.
    pub fn entries(&self) -> &[FastqEntry] {
        &self.entries
    }

    /// Entries of one sample, in input order.
    pub fn for_sample<'a>(&'a self, sample_id: &'a str) -> impl Iterator<Item = &'a FastqEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.sample_id == sample_id)
    }

    /// Distinct samples with at least one fastq file.
    pub fn sample_ids(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|entry| entry.sample_id.clone())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no fastq was attributed to a sample.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

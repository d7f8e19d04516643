use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};

use super::ManifestError;

/// Sample manifest: one row per sequencing run of a sample.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    sample_id_column: usize,
    sample_run_id_column: usize,
    flowcell_column: Option<usize>,
}

impl Manifest {
    /// Load a manifest from `.tsv`, `.txt`, `.csv`, `.xlsx` or `.xls`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let (headers, rows) = read_table(path)?;
        Self::from_table(path, headers, rows)
    }

    /// Build a manifest from an already parsed table.
    pub fn from_table(
        path: &Path,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, ManifestError> {
        let sample_id_column =
            column_match(&headers, "Sample ID").ok_or_else(|| ManifestError::MissingColumn {
                path: path.to_path_buf(),
                column: "Sample ID".to_string(),
            })?;
        let sample_run_id_column =
            column_match(&headers, "Sample Run ID").unwrap_or(sample_id_column);
        let flowcell_column = column_match(&headers, "Flowcell");

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
            sample_id_column,
            sample_run_id_column,
            flowcell_column,
        })
    }

    /// Source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header of the matched `Sample ID` column.
    pub fn sample_id_header(&self) -> &str {
        &self.headers[self.sample_id_column]
    }

    /// Unique sample IDs in file order.
    pub fn sample_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.rows
            .iter()
            .filter_map(|row| cell(row, self.sample_id_column))
            .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Unique run IDs recorded for `sample_id`.
    pub fn sample_run_ids(&self, sample_id: &str) -> Vec<String> {
        let mut run_ids: Vec<String> = Vec::new();
        for row in &self.rows {
            if cell(row, self.sample_id_column) != Some(sample_id) {
                continue;
            }
            if let Some(run_id) = cell(row, self.sample_run_id_column) {
                if !run_ids.iter().any(|known| known == run_id) {
                    run_ids.push(run_id.to_string());
                }
            }
        }
        run_ids
    }

    /// Map of run ID to sample ID. Later rows win on duplicate run IDs.
    pub fn sample_run_id_map(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .filter_map(|row| {
                let run_id = cell(row, self.sample_run_id_column)?;
                let sample_id = cell(row, self.sample_id_column)?;
                Some((run_id.to_string(), sample_id.to_string()))
            })
            .collect()
    }

    /// Flowcells recorded for `sample_id`, if the manifest has that column.
    pub fn flowcells(&self, sample_id: &str) -> Vec<String> {
        let Some(column) = self.flowcell_column else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|row| cell(row, self.sample_id_column) == Some(sample_id))
            .filter_map(|row| cell(row, column))
            .map(str::to_string)
            .collect()
    }

    /// True when `sample_id` appears in the manifest.
    pub fn contains_sample(&self, sample_id: &str) -> bool {
        self.rows
            .iter()
            .any(|row| cell(row, self.sample_id_column) == Some(sample_id))
    }
}

fn cell(row: &[String], column: usize) -> Option<&str> {
    row.get(column).map(|value| value.trim())
}

/// Lowercase and drop spaces/underscores so `Sample_ID` matches `sample id`.
pub fn standardize_column(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn column_match(headers: &[String], column: &str) -> Option<usize> {
    let wanted = standardize_column(column);
    headers
        .iter()
        .position(|header| standardize_column(header) == wanted)
}

/// Read a delimited or spreadsheet table, returning header and data rows.
pub fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), ManifestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "tsv" | "txt" => read_delimited(path, b'\t'),
        "csv" => read_delimited(path, b','),
        "xlsx" | "xls" => read_workbook(path),
        _ => Err(ManifestError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
) -> Result<(Vec<String>, Vec<Vec<String>>), ManifestError> {
    let csv_error = |source: csv::Error| ManifestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn read_workbook(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), ManifestError> {
    let excel_error = |message: String| ManifestError::Excel {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|err| excel_error(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| excel_error("workbook has no worksheets".to_string()))?
        .map_err(|err| excel_error(err.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|value| value.to_string()).collect::<Vec<_>>());
    let headers = rows
        .next()
        .ok_or_else(|| excel_error("first worksheet is empty".to_string()))?;
    Ok((headers, rows.collect()))
}

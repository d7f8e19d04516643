use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::types::{ChromosomeBins, Interval};
use super::BinningError;

/// File-of-files listing every bed written by [`write_interval_bins`].
pub const BINNED_INTERVALS_FOF: &str = "binned_intervals_FOF.txt";

/// Read a bedfile from disk.
pub fn read_bedfile<P: AsRef<Path>>(path: P) -> Result<Vec<Interval>, BinningError> {
    let path = path.as_ref();
    info!(path = %path.display(), "reading bed file");
    let file = File::open(path).map_err(|source| BinningError::io(path, source))?;
    parse_bed(BufReader::new(file), path)
}

/// Parse tab-separated `chrom, start, stop, ...` records.
///
/// Lines starting with `@` or holding fewer than three fields are skipped.
/// `origin` only labels error messages.
pub fn parse_bed<R: BufRead>(reader: R, origin: &Path) -> Result<Vec<Interval>, BinningError> {
    let mut intervals = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| BinningError::io(origin, source))?;
        let line_no = idx + 1;
        if line.starts_with('@') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            continue;
        }

        let start = parse_coordinate(fields[1], origin, line_no, "start")?;
        let stop = parse_coordinate(fields[2], origin, line_no, "stop")?;
        if stop <= start {
            return Err(BinningError::parse(
                origin,
                line_no,
                format!("stop {} must be greater than start {}", stop, start),
            ));
        }
        intervals.push(Interval::new(fields[0], start, stop));
    }
    Ok(intervals)
}

fn parse_coordinate(
    field: &str,
    origin: &Path,
    line_no: usize,
    name: &str,
) -> Result<u64, BinningError> {
    field.trim().parse::<u64>().map_err(|_| {
        BinningError::parse(origin, line_no, format!("invalid {} coordinate '{}'", name, field))
    })
}

/// Write one `{label}.bed` per bin plus [`BINNED_INTERVALS_FOF`] into `odir`.
///
/// Returns the bed paths in the order they were written.
pub fn write_interval_bins<P: AsRef<Path>>(
    chromosomes: &[ChromosomeBins],
    odir: P,
) -> Result<Vec<PathBuf>, BinningError> {
    let odir = odir.as_ref();
    fs::create_dir_all(odir).map_err(|source| BinningError::io(odir, source))?;

    let mut written = Vec::new();
    for chromosome in chromosomes {
        info!(chrom = %chromosome.chrom, bins = chromosome.bins.len(), "saving binned bed files");
        for bin in &chromosome.bins {
            let path = odir.join(format!("{}.bed", bin.label));
            let file = File::create(&path).map_err(|source| BinningError::io(&path, source))?;
            let mut writer = BufWriter::new(file);
            for interval in &bin.intervals {
                writeln!(writer, "{}\t{}\t{}", interval.chrom, interval.start, interval.stop)
                    .map_err(|source| BinningError::io(&path, source))?;
            }
            writer.flush().map_err(|source| BinningError::io(&path, source))?;
            written.push(path);
        }
    }

    let fof = odir.join(BINNED_INTERVALS_FOF);
    let listing = written
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&fof, listing).map_err(|source| BinningError::io(&fof, source))?;

    Ok(written)
}

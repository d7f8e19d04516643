use std::fmt;
use std::sync::Arc;

/// Half-open genomic interval `[start, stop)` read from a bedfile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Chromosome/contig name.
    pub chrom: Arc<str>,
    /// 0-based start coordinate.
    pub start: u64,
    /// Exclusive end coordinate (`stop > start`).
    pub stop: u64,
}

impl Interval {
    /// Construct a new interval.
    pub fn new(chrom: impl Into<Arc<str>>, start: u64, stop: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            stop,
        }
    }

    /// Number of nucleotides covered.
    pub fn size(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }
}

/// Interval tagged with the bin it was assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinnedInterval {
    /// The source interval.
    pub interval: Interval,
    /// Raw bin index (0-based, non-decreasing in input order).
    pub bin: usize,
}

/// External name of a bin: `chr` when the chromosome has a single bin,
/// `chr.N` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinLabel {
    chrom: Arc<str>,
    index: Option<usize>,
}

impl BinLabel {
    /// Label for a chromosome that produced exactly one bin.
    pub fn whole(chrom: impl Into<Arc<str>>) -> Self {
        Self {
            chrom: chrom.into(),
            index: None,
        }
    }

    /// Label for the `index`-th bin of a multi-bin chromosome.
    pub fn indexed(chrom: impl Into<Arc<str>>, index: usize) -> Self {
        Self {
            chrom: chrom.into(),
            index: Some(index),
        }
    }

    /// Chromosome the bin belongs to.
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// Dense bin index, `None` for single-bin chromosomes.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

impl fmt::Display for BinLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}.{}", self.chrom, index),
            None => f.write_str(&self.chrom),
        }
    }
}

/// One surviving bin after rebalancing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    /// External label.
    pub label: BinLabel,
    /// Member intervals in input order.
    pub intervals: Vec<Interval>,
}

impl Bin {
    /// Sum of member interval sizes.
    pub fn total_size(&self) -> u64 {
        self.intervals.iter().map(Interval::size).sum()
    }
}

/// All bins of one chromosome, in label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeBins {
    /// Chromosome name.
    pub chrom: Arc<str>,
    /// Bins in ascending order.
    pub bins: Vec<Bin>,
}

impl ChromosomeBins {
    /// Labels of every bin, in order.
    pub fn labels(&self) -> impl Iterator<Item = &BinLabel> {
        self.bins.iter().map(|bin| &bin.label)
    }

    /// True when the chromosome had no intervals.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

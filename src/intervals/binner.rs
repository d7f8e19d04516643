//! Balanced partitioning of a chromosome's intervals into contiguous bins.
//!
//! Two passes:
//! 1. **Forward fill**: walk the intervals in input order and open a new bin
//!    once the current one has overflowed the target, or once the next
//!    interval would push a non-empty bin past three quarters of the target.
//! 2. **Rebalance**: every bin holding less than half the target is folded
//!    into its smaller neighbor, using the bin totals from before the pass.
//!
//! Intervals are never split or reordered, so each bin is a contiguous run of
//! the input.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::types::{Bin, BinLabel, BinnedInterval, ChromosomeBins, Interval};

/// Default number of nucleotides a bin attempts to hold.
pub const DEFAULT_NUCLEOTIDES_PER_BIN: i64 = 85_000_000;

/// Fold state threaded through the forward-fill pass.
#[derive(Debug, Clone, Copy, Default)]
struct FillState {
    bin: usize,
    accumulated: u64,
    members: usize,
}

impl FillState {
    /// Admit one interval, returning the updated state and the bin it landed in.
    fn admit(self, size: u64, target: i64) -> (Self, usize) {
        let target = i128::from(target);
        let accumulated = i128::from(self.accumulated);
        let overflowed = self.members > 0 && accumulated > target;
        // acc + size > 0.75 * target, kept in integers
        let soft_limit = self.accumulated > 0 && 4 * (accumulated + i128::from(size)) > 3 * target;

        let mut next = if overflowed || soft_limit {
            FillState {
                bin: self.bin + 1,
                accumulated: 0,
                members: 0,
            }
        } else {
            self
        };
        next.accumulated += size;
        next.members += 1;
        (next, next.bin)
    }
}

/// Splits per-chromosome interval runs into near-equal bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBinner {
    target_size: i64,
}

impl Default for IntervalBinner {
    fn default() -> Self {
        Self::new(DEFAULT_NUCLEOTIDES_PER_BIN)
    }
}

impl IntervalBinner {
    /// Create a binner aiming for `target_size` nucleotides per bin.
    ///
    /// A non-positive target is accepted and degenerates to one bin per
    /// interval.
    pub fn new(target_size: i64) -> Self {
        Self { target_size }
    }

    /// Configured target size.
    pub fn target_size(&self) -> i64 {
        self.target_size
    }

    /// Forward-fill pass: raw bin index per interval.
    pub fn partition(&self, intervals: &[Interval]) -> Vec<usize> {
        intervals
            .iter()
            .scan(FillState::default(), |state, interval| {
                let (next, bin) = state.admit(interval.size(), self.target_size);
                *state = next;
                Some(bin)
            })
            .collect()
    }

    /// Fold undersized bins into their smaller neighbor.
    ///
    /// Totals are snapshotted before the pass. When bin `b` is visited, every
    /// interval currently carrying index `b` moves, including intervals an
    /// earlier step merged into it. Ties go to `b - 1`.
    pub fn rebalance(&self, intervals: &[Interval], assignments: &mut [usize]) {
        let last = match assignments.iter().max() {
            Some(&last) if last > 0 => last,
            _ => return,
        };

        let mut totals = vec![0u64; last + 1];
        for (interval, &bin) in intervals.iter().zip(assignments.iter()) {
            totals[bin] += interval.size();
        }

        let target = i128::from(self.target_size);
        for bin in 0..=last {
            if 2 * i128::from(totals[bin]) >= target {
                continue;
            }
            let lower = bin.checked_sub(1).map(|b| totals[b]);
            let upper = totals.get(bin + 1).copied();
            let destination = match (lower, upper) {
                (Some(lower), Some(upper)) if lower <= upper => bin - 1,
                (Some(_), Some(_)) => bin + 1,
                (Some(_), None) => bin - 1,
                (None, Some(_)) => bin + 1,
                (None, None) => continue,
            };
            debug!(
                bin,
                destination,
                size = totals[bin],
                "merging undersized bin"
            );
            for assigned in assignments.iter_mut().filter(|assigned| **assigned == bin) {
                *assigned = destination;
            }
        }
    }

    /// Bin one chromosome's intervals (caller guarantees a single chromosome).
    pub fn bin(&self, intervals: &[Interval]) -> Vec<BinnedInterval> {
        let mut assignments = self.partition(intervals);
        self.rebalance(intervals, &mut assignments);
        intervals
            .iter()
            .cloned()
            .zip(assignments)
            .map(|(interval, bin)| BinnedInterval { interval, bin })
            .collect()
    }

    /// Bin one chromosome and attach dense labels.
    pub fn bin_chromosome(&self, chrom: impl Into<Arc<str>>, intervals: &[Interval]) -> ChromosomeBins {
        let chrom = chrom.into();
        let binned = self.bin(intervals);
        ChromosomeBins {
            bins: label_bins(&chrom, binned),
            chrom,
        }
    }

    /// Bin every chromosome present, in order of first appearance.
    pub fn bin_all(&self, intervals: &[Interval]) -> Vec<ChromosomeBins> {
        group_by_chromosome(intervals)
            .into_iter()
            .map(|(chrom, members)| {
                debug!(chrom = %chrom, intervals = members.len(), "binning chromosome");
                self.bin_chromosome(chrom, &members)
            })
            .collect()
    }
}

/// Renumber surviving bin indices densely (ascending) and group intervals.
fn label_bins(chrom: &Arc<str>, binned: Vec<BinnedInterval>) -> Vec<Bin> {
    let surviving: BTreeSet<usize> = binned.iter().map(|b| b.bin).collect();
    let dense: HashMap<usize, usize> = surviving
        .iter()
        .enumerate()
        .map(|(dense, &raw)| (raw, dense))
        .collect();
    let single = surviving.len() == 1;

    let mut bins: Vec<Bin> = (0..surviving.len())
        .map(|index| Bin {
            label: if single {
                BinLabel::whole(Arc::clone(chrom))
            } else {
                BinLabel::indexed(Arc::clone(chrom), index)
            },
            intervals: Vec::new(),
        })
        .collect();

    for BinnedInterval { interval, bin } in binned {
        bins[dense[&bin]].intervals.push(interval);
    }
    bins
}

fn group_by_chromosome(intervals: &[Interval]) -> Vec<(Arc<str>, Vec<Interval>)> {
    let mut order: Vec<(Arc<str>, Vec<Interval>)> = Vec::new();
    let mut slots: HashMap<Arc<str>, usize> = HashMap::new();
    for interval in intervals {
        let slot = *slots.entry(Arc::clone(&interval.chrom)).or_insert_with(|| {
            order.push((Arc::clone(&interval.chrom), Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(interval.clone());
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    const M: u64 = 1_000_000;

    fn chrom(sizes: &[u64]) -> Vec<Interval> {
        let mut start = 0;
        sizes
            .iter()
            .map(|&size| {
                let interval = Interval::new("chr1", start, start + size);
                start += size + 10;
                interval
            })
            .collect()
    }

    #[test]
    fn oversized_first_interval_absorbs_small_tail() {
        let intervals = chrom(&[90 * M, 10 * M, 5 * M]);
        let binner = IntervalBinner::new(85_000_000);

        assert_eq!(binner.partition(&intervals), vec![0, 1, 1]);

        let bins = binner.bin_chromosome("chr1", &intervals);
        assert_eq!(bins.bins.len(), 1);
        assert_eq!(bins.bins[0].label.to_string(), "chr1");
        assert_eq!(bins.bins[0].intervals.len(), 3);
    }

    #[test]
    fn soft_limit_opens_bin_early() {
        // 40M + 30M = 70M > 63.75M, so the second interval starts bin 1.
        let intervals = chrom(&[40 * M, 30 * M, 50 * M]);
        let binner = IntervalBinner::new(85_000_000);
        assert_eq!(binner.partition(&intervals), vec![0, 1, 2]);
    }

    #[test]
    fn balanced_bins_are_left_alone() {
        let intervals = chrom(&[60 * M, 60 * M, 60 * M]);
        let binner = IntervalBinner::new(85_000_000);
        let bins = binner.bin_chromosome("chr1", &intervals);
        let labels: Vec<String> = bins.labels().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["chr1.0", "chr1.1", "chr1.2"]);
    }

    #[test]
    fn small_middle_bin_merges_into_smaller_neighbor() {
        // partition: [70] [20] [50, 10] -> totals 70, 20, 60
        let intervals = chrom(&[70, 20, 50, 10]);
        let binner = IntervalBinner::new(80);
        assert_eq!(binner.partition(&intervals), vec![0, 1, 2, 2]);

        let binned = binner.bin(&intervals);
        let bins: Vec<usize> = binned.iter().map(|b| b.bin).collect();
        assert_eq!(bins, vec![0, 2, 2, 2]);
    }

    #[test]
    fn ties_merge_downwards() {
        // totals 60, 10, 60 with target 80: bin 1 is undersized and both
        // neighbors hold 60.
        let intervals = chrom(&[60, 10, 60]);
        let binner = IntervalBinner::new(80);
        assert_eq!(binner.partition(&intervals), vec![0, 1, 2]);
        let bins: Vec<usize> = binner.bin(&intervals).iter().map(|b| b.bin).collect();
        assert_eq!(bins, vec![0, 0, 2]);

        let labelled = binner.bin_chromosome("chr1", &intervals);
        let labels: Vec<String> = labelled.labels().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["chr1.0", "chr1.1"]);
        assert_eq!(labelled.bins[0].total_size(), 70);
    }

    #[test]
    fn merged_intervals_move_again_with_their_bin() {
        // partition totals: 100, 40, 40, 100 (target 100, half = 50)
        // bin 1 -> bin 2 (40 < 100); bin 2 (stale total 40) -> bin 1 (40 <= 100)
        let intervals = chrom(&[100, 40, 40, 100]);
        let binner = IntervalBinner::new(100);
        assert_eq!(binner.partition(&intervals), vec![0, 1, 2, 3]);
        let bins: Vec<usize> = binner.bin(&intervals).iter().map(|b| b.bin).collect();
        assert_eq!(bins, vec![0, 1, 1, 3]);
    }

    #[test]
    fn non_positive_target_gives_one_bin_per_interval() {
        let intervals = chrom(&[5, 7, 9]);
        for target in [0, -10] {
            let binner = IntervalBinner::new(target);
            let bins: Vec<usize> = binner.bin(&intervals).iter().map(|b| b.bin).collect();
            assert_eq!(bins, vec![0, 1, 2]);
        }
    }

    #[test]
    fn empty_input_yields_no_bins() {
        let binner = IntervalBinner::default();
        assert!(binner.bin(&[]).is_empty());
        assert!(binner.bin_chromosome("chr9", &[]).is_empty());
    }

    #[test]
    fn chromosomes_are_binned_independently_in_appearance_order() {
        let intervals = vec![
            Interval::new("chr2", 0, 100),
            Interval::new("chr1", 0, 100),
            Interval::new("chr2", 200, 300),
        ];
        let binner = IntervalBinner::new(1_000);
        let all = binner.bin_all(&intervals);
        assert_eq!(all.len(), 2);
        assert_eq!(&*all[0].chrom, "chr2");
        assert_eq!(all[0].bins[0].intervals.len(), 2);
        assert_eq!(&*all[1].chrom, "chr1");
    }
}

//! Interval binning benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gencompass::intervals::{Interval, IntervalBinner};

// Exome-like layout: many small intervals spread over a few chromosomes.
fn synthetic_intervals(per_chrom: usize) -> Vec<Interval> {
    let mut intervals = Vec::with_capacity(per_chrom * 4);
    for chrom in ["chr1", "chr2", "chr3", "chrX"] {
        let mut start = 0u64;
        for i in 0..per_chrom {
            let size = 150 + (i as u64 * 7919) % 5_000;
            intervals.push(Interval::new(chrom, start, start + size));
            start += size + 10_000;
        }
    }
    intervals
}

fn benchmark_binning(c: &mut Criterion) {
    let mut group = c.benchmark_group("bin_all");
    for per_chrom in [1_000usize, 10_000, 50_000] {
        let intervals = synthetic_intervals(per_chrom);
        let binner = IntervalBinner::new(5_000_000);
        group.bench_with_input(BenchmarkId::from_parameter(per_chrom), &intervals, |b, input| {
            b.iter(|| black_box(binner.bin_all(black_box(input))));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_binning);
criterion_main!(benches);

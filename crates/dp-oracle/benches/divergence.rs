//! Oracle hot-path benchmarks
//!
//! Run with: cargo bench -p dp-oracle

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dp_oracle::mechanism::{BoundedQuantiles, QuantilesConfig};
use dp_oracle::{bucketize, verify_approximate_dp, Histogram, NoiseKind, Seed};
use rand::Rng;

fn bench_bucketize(c: &mut Criterion) {
    let mut rng = Seed::from_string("bench-bucketize").trial_rng(0);
    let values: Vec<f64> = (0..10_000).map(|_| rng.gen_range(-10.0..110.0)).collect();

    let mut group = c.benchmark_group("bucketize");
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("record_10k", |b| {
        b.iter(|| {
            let mut histogram = Histogram::new(100);
            for &value in &values {
                histogram.record(black_box(value), 0.0, 100.0);
            }
            histogram
        })
    });

    group.bench_function("index_only", |b| {
        b.iter(|| {
            values
                .iter()
                .map(|&v| bucketize(black_box(v), 0.0, 100.0, 100))
                .sum::<usize>()
        })
    });

    group.finish();
}

fn bench_divergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify_approximate_dp");

    for buckets in [10usize, 100, 1000] {
        let mut rng = Seed::from_string("bench-divergence").trial_rng(buckets as u64);
        let a = Histogram::from_counts((0..buckets).map(|_| rng.gen_range(0..1000)).collect());
        let b = Histogram::from_counts((0..buckets).map(|_| rng.gen_range(0..1000)).collect());

        group.bench_with_input(BenchmarkId::from_parameter(buckets), &buckets, |bench, _| {
            bench.iter(|| verify_approximate_dp(black_box(&a), black_box(&b), 1.0, 1e-5, 0.01))
        });
    }

    group.finish();
}

fn bench_quantiles_sample(c: &mut Criterion) {
    let config = QuantilesConfig {
        epsilon: 1.0,
        delta: None,
        max_contributions_per_partition: 1,
        max_partitions_contributed: 1,
        lower: 0.0,
        upper: 100.0,
        noise: NoiseKind::Laplace,
        tree_height: 4,
        branching_factor: 16,
    };
    let validated = config.validate().unwrap();
    let entries: Vec<f64> = (0..20).map(|i| i as f64 * 5.0).collect();
    let mut rng = Seed::from_string("bench-quantiles").trial_rng(0);

    c.bench_function("bounded_quantiles_median", |b| {
        b.iter(|| {
            let mut quantiles = BoundedQuantiles::new(&validated);
            for &entry in &entries {
                quantiles.add_entry(entry).unwrap();
            }
            quantiles.compute_result(0.5, &mut rng).unwrap()
        })
    });
}

criterion_group!(benches, bench_bucketize, bench_divergence, bench_quantiles_sample);
criterion_main!(benches);

//! Search and index-build benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jstmap::*;

/// Deterministic pseudo-random reference and lightly mutated haplotypes.
fn population(len: usize, haplotypes: usize) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };
    let reference: Vec<u8> = (0..len).map(|_| b"ACGT"[(next() % 4) as usize]).collect();
    let variants = (0..haplotypes)
        .map(|_| {
            let mut haplotype = reference.clone();
            for _ in 0..len / 200 {
                let pos = (next() as usize) % haplotype.len();
                haplotype[pos] = b"ACGT"[(next() % 4) as usize];
            }
            haplotype
        })
        .collect();
    (reference, variants)
}

fn config() -> IndexConfig {
    IndexConfig::default()
        .with_bin_count(16)
        .with_window_length(15)
        .with_slots(1 << 14)
        .with_context_length(64)
}

fn benchmark_build(c: &mut Criterion) {
    let (reference, haplotypes) = population(20_000, 8);
    c.bench_function("build_20kb_8_haplotypes", |b| {
        b.iter(|| black_box(build(&reference, &haplotypes, &config()).map(|out| out.index.fill_ratio())));
    });
}

fn benchmark_search(c: &mut Criterion) {
    let (reference, haplotypes) = population(20_000, 8);
    let built = match build(&reference, &haplotypes, &config()) {
        Ok(built) => built,
        Err(err) => panic!("benchmark setup failed: {err}"),
    };
    let queries: Vec<Query> = (0..32)
        .map(|i| {
            let start = (i * 613) % (reference.len() - 40);
            Query::new(i, haplotypes[i % haplotypes.len()][start..start + 40].to_vec())
        })
        .collect();

    let mut group = c.benchmark_group("search_32_queries");
    for error_rate in [0.0, 0.05] {
        let search_config = SearchConfig::default().with_error_rate(error_rate);
        group.bench_with_input(BenchmarkId::from_parameter(error_rate), &search_config, |b, cfg| {
            b.iter(|| black_box(search(&queries, &built.store, &built.index, cfg).map(|r| r.matches.len())));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_build, benchmark_search);
criterion_main!(benches);

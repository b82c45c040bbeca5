//! Benchmarks for address parsing and chunk key rendering
//!
//! Run with: cargo bench --package kineticio-core --bench addressing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kineticio_core::{chunk_key, ChunkLayout, KineticAddress};

/// Benchmark address parsing for both accepted forms
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("address_parse");

    for address in [
        "kinetic:clusterA:file.dat",
        "kinetic:clusterA:datasets/2024/training/shard-00017.bin",
        "kinetic://clusterA/datasets/2024/training/shard-00017.bin",
    ] {
        group.bench_with_input(
            BenchmarkId::new("parse", address.len()),
            &address,
            |b, address| b.iter(|| KineticAddress::parse(black_box(address))),
        );
    }

    group.finish();
}

/// Benchmark chunk key rendering
fn bench_chunk_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_key");

    for index in [0u64, 4_096, 9_999_999_999] {
        group.bench_with_input(BenchmarkId::new("render", index), &index, |b, index| {
            b.iter(|| chunk_key(black_box("datasets/2024/shard.bin"), *index))
        });
    }

    group.finish();
}

/// Benchmark splitting byte ranges into chunk spans
fn bench_spans(c: &mut Criterion) {
    let layout = ChunkLayout::default();
    let mut group = c.benchmark_group("chunk_spans");

    for len in [
        4 * 1024,         // 4 KB
        1024 * 1024,      // 1 MB
        64 * 1024 * 1024, // 64 MB
    ] {
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("spans", format_size(len)), &len, |b, len| {
            b.iter(|| layout.spans(black_box(12_345), *len).count())
        });
    }

    group.finish();
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{}MB", bytes / (1024 * 1024))
    } else {
        format!("{}KB", bytes / 1024)
    }
}

criterion_group!(benches, bench_parse, bench_chunk_key, bench_spans);
criterion_main!(benches);

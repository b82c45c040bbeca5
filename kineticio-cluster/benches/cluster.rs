//! Benchmarks for cluster backends
//!
//! Run with: cargo bench --package kineticio-cluster --bench cluster

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kineticio_cluster::{Cluster, MemoryCluster, RocksCluster, RocksSettings, SledCluster};
use kineticio_core::{chunk_key, ChunkKey};
use tempfile::TempDir;

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

fn key(index: u64) -> ChunkKey {
    chunk_key("bench/file.bin", index).unwrap()
}

const SIZES: [usize; 3] = [
    4 * 1024,    // 4 KB
    64 * 1024,   // 64 KB
    1024 * 1024, // 1 MB (default chunk)
];

fn bench_put(c: &mut Criterion, name: &str, cluster: &dyn Cluster) {
    let mut group = c.benchmark_group(format!("{name}_put"));

    for size in SIZES {
        let data = Bytes::from(generate_data(size));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("put", format_size(size)), &data, |b, data| {
            let mut counter = 0u64;
            b.iter(|| {
                counter = (counter + 1) % 1000;
                cluster.put(&key(counter), black_box(data.clone())).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion, name: &str, cluster: &dyn Cluster) {
    let mut group = c.benchmark_group(format!("{name}_get"));

    for size in SIZES {
        let data = Bytes::from(generate_data(size));
        for i in 0..100 {
            cluster.put(&key(i), data.clone()).unwrap();
        }
        cluster.flush().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::new("get", format_size(size)), |b| {
            let mut counter = 0u64;
            b.iter(|| {
                counter = (counter + 1) % 100;
                cluster.get(black_box(&key(counter))).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_memory(c: &mut Criterion) {
    let cluster = MemoryCluster::new("bench");
    bench_put(c, "memory", &cluster);
    bench_get(c, "memory", &cluster);
}

fn bench_sled(c: &mut Criterion) {
    let cluster = SledCluster::open_temporary("bench").unwrap();
    bench_put(c, "sled", &cluster);
    bench_get(c, "sled", &cluster);
}

fn bench_rocks(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let cluster = RocksCluster::open("bench", RocksSettings::new(temp_dir.path())).unwrap();
    bench_put(c, "rocksdb", &cluster);
    bench_get(c, "rocksdb", &cluster);
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{}MB", bytes / (1024 * 1024))
    } else {
        format!("{}KB", bytes / 1024)
    }
}

criterion_group!(benches, bench_memory, bench_sled, bench_rocks);
criterion_main!(benches);

//! Performance benchmarks for the file share client
//!
//! This benchmark suite measures the sparse file model and client operations
//! against the in-process store: ranged writes, range listing, whole-file
//! uploads and concurrent writes.
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench
//! ```

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fileshare::{Client, ClientConfig, SparseFile};

const CONNECTION_STRING: &str = "AccountName=bench;AccountKey=YmVuY2gta2V5";

/// Benchmark for scattered writes into a sparse file
///
/// Writes land every 8 KiB so that each write becomes its own extent.
fn bench_sparse_writes(c: &mut Criterion) {
    let chunk = vec![0xA5u8; 512];

    c.bench_function("sparse_write_scattered_1024", |b| {
        b.iter(|| {
            let mut file = SparseFile::new(16 * 1024 * 1024).unwrap();
            for i in 0..1024u64 {
                file.write_range(black_box(i * 8192 + 17), &chunk).unwrap();
            }
            file
        });
    });
}

/// Benchmark for listing ranges of a fragmented file
fn bench_list_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_ranges");

    for extents in [16u64, 256, 4096] {
        let mut file = SparseFile::new(extents * 4096).unwrap();
        for i in 0..extents {
            file.write_range(i * 4096 + 1000, &[1u8; 100]).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(extents), &file, |b, file| {
            b.iter(|| black_box(file.list_ranges()));
        });
    }

    group.finish();
}

/// Benchmark for whole-file uploads of different sizes
///
/// Larger files are split into several range writes.
fn bench_upload_buffer(c: &mut Criterion) {
    // Create runtime for async operations
    let rt = tokio::runtime::Runtime::new().unwrap();

    let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();
    rt.block_on(client.create_share("bench")).unwrap();

    let mut group = c.benchmark_group("upload_buffer");
    for size in [4 * 1024usize, 1024 * 1024, 10 * 1024 * 1024] {
        let data = Bytes::from(vec![7u8; size]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                client
                    .upload_buffer("bench", "upload.bin", black_box(data.clone()))
                    .await
                    .unwrap();
            });
        });
    }
    group.finish();

    // Clean up
    rt.block_on(client.close());
}

/// Benchmark for concurrent writes to disjoint ranges of one file
fn bench_concurrent_writes(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let client = Client::new(ClientConfig::new(CONNECTION_STRING)).unwrap();
    rt.block_on(async {
        client.create_share("bench").await.unwrap();
        client.create_file("bench", "parallel.bin", 64 * 4096).await.unwrap();
    });
    let chunk = Bytes::from(vec![3u8; 4096]);

    c.bench_function("concurrent_writes_64", |b| {
        b.to_async(&rt).iter(|| async {
            let writes = (0..64u64).map(|i| {
                client.write_range("bench", "parallel.bin", i * 4096, chunk.clone())
            });
            for result in futures::future::join_all(writes).await {
                result.unwrap();
            }
        });
    });

    rt.block_on(client.close());
}

// Register all benchmark functions
criterion_group!(
    benches,
    bench_sparse_writes,
    bench_list_ranges,
    bench_upload_buffer,
    bench_concurrent_writes
);

// Main entry point for criterion
criterion_main!(benches);

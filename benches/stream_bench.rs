//! Benchmarks for poolstream.
//!
//! Run with:
//!     cargo bench

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use bytes::Bytes;
use poolstream::{BufferPool, StreamOptions, memory_stream};

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");

    // Different data sizes
    for size in [64 * 1024, 1024 * 1024, 10 * 1024 * 1024] {
        // Deterministic pseudo-random data
        let data: Vec<u8> = (0..size).map(|i| (i * 7 + 13) as u8).collect();
        let data = Bytes::from(data);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(format!("drain_{}kb", size / 1024), &data, |b, data| {
            b.iter(|| {
                let stream = memory_stream(black_box(data.clone()), StreamOptions::default())
                    .unwrap();
                let mut total = 0usize;
                for chunk in stream.chunks() {
                    total += chunk.unwrap().len();
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_watermarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("watermarks");
    let size = 1024 * 1024; // 1 MB
    let data: Vec<u8> = (0..size).map(|i| (i * 7 + 13) as u8).collect();
    let data = Bytes::from(data);

    group.throughput(Throughput::Bytes(size as u64));
    for hwm in [4 * 1024, 64 * 1024, 256 * 1024] {
        group.bench_function(format!("hwm_{}kb", hwm / 1024), |b| {
            let options = StreamOptions::default().with_high_water_mark(hwm);
            b.iter(|| {
                let stream = memory_stream(black_box(data.clone()), options.clone()).unwrap();
                let mut total = 0usize;
                for chunk in stream.chunks() {
                    total += chunk.unwrap().len();
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");

    // Full fills leave no tail to reclaim
    group.bench_function("reserve_full_fill", |b| {
        let pool = BufferPool::new();
        b.iter(|| {
            let reservation = pool.reserve(black_box(8 * 1024), 64 * 1024);
            let filled = reservation.len();
            black_box(pool.reconcile(reservation, filled))
        });
    });

    // Partial fills exercise the rewind path
    group.bench_function("reserve_partial_fill", |b| {
        let pool = BufferPool::new();
        b.iter(|| {
            let reservation = pool.reserve(black_box(8 * 1024), 64 * 1024);
            let filled = reservation.len().min(512);
            black_box(pool.reconcile(reservation, filled))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_stream, bench_watermarks, bench_pool);
criterion_main!(benches);

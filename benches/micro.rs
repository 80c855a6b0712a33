//! Micro-benchmarks for ordoledb core operations.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro        # run all micro-benchmarks
//! cargo bench --bench micro -- put # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use ordoledb::db::{DB, Options, ReadOptions, WriteOptions};
use tempfile::TempDir;

const VALUE_128B: &[u8; 128] = &[0xAB; 128];
const VALUE_1K: &[u8; 1024] = &[0xCD; 1024];

fn make_key(i: u64) -> Vec<u8> {
    format!("key-{i:012}").into_bytes()
}

/// Small write buffer so flushes happen quickly during sustained-write
/// benchmarks.
fn open_small_buffer(dir: &std::path::Path) -> DB {
    DB::open(dir, Options { write_buffer_size: 4 * 1024, ..Options::default() }).expect("open")
}

/// Large write buffer so all data stays in the memtable (no background
/// flushes) during point-read benchmarks.
fn open_memtable_only(dir: &std::path::Path) -> DB {
    DB::open(dir, Options { write_buffer_size: 64 * 1024 * 1024, ..Options::default() }).expect("open")
}

/// Pre-populates a database with `count` sequential keys so tables
/// actually exist on disk for the read benchmarks.
fn prepopulate(dir: &std::path::Path, count: u64, value: &[u8]) {
    let db = open_small_buffer(dir);
    for i in 0..count {
        db.put(&WriteOptions::default(), &make_key(i), value).unwrap();
    }
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    for size in [VALUE_128B.len(), VALUE_1K.len()] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("sequential", size), &size, |b, &size| {
            let value = vec![0xAB; size];
            let dir = TempDir::new().unwrap();
            let db = open_memtable_only(dir.path());
            let mut i = 0u64;
            b.iter(|| {
                db.put(&WriteOptions::default(), &make_key(i), black_box(&value)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    for count in [1_000u64, 50_000u64] {
        group.bench_with_input(BenchmarkId::new("hit", count), &count, |b, &count| {
            let dir = TempDir::new().unwrap();
            prepopulate(dir.path(), count, VALUE_128B);
            let db = DB::open(dir.path(), Options::default()).unwrap();
            let read = ReadOptions::default();
            let mut i = 0u64;
            b.iter(|| {
                let key = make_key(i % count);
                black_box(db.get(&read, &key).unwrap());
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    c.bench_function("delete/sequential", |b| {
        let dir = TempDir::new().unwrap();
        let db = open_memtable_only(dir.path());
        for i in 0..10_000u64 {
            db.put(&WriteOptions::default(), &make_key(i), VALUE_128B).unwrap();
        }
        let mut i = 0u64;
        b.iter(|| {
            db.delete(&WriteOptions::default(), &make_key(i % 10_000)).unwrap();
            i += 1;
        });
    });
}

fn bench_iterator_scan(c: &mut Criterion) {
    c.bench_function("iterator/full_scan_10k", |b| {
        let dir = TempDir::new().unwrap();
        prepopulate(dir.path(), 10_000, VALUE_128B);
        let db = DB::open(dir.path(), Options::default()).unwrap();
        b.iter_batched(
            || db.new_iterator(&ReadOptions::default()),
            |mut it| {
                it.seek_to_first();
                let mut count = 0u64;
                while it.valid() {
                    black_box(it.value());
                    count += 1;
                    it.next();
                }
                black_box(count)
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_put, bench_get, bench_delete, bench_iterator_scan);
criterion_main!(benches);

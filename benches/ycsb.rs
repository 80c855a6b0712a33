//! YCSB-style macro-benchmarks for ordoledb.
//!
//! Measures sustained throughput under mixed read/write/scan workloads
//! inspired by the Yahoo Cloud Serving Benchmark (YCSB).
//!
//! # Workloads
//!
//! | Name | Mix | Description |
//! |------|-----|-------------|
//! | **A** | 50% read, 50% update | Session store — heavy read/write |
//! | **B** | 95% read, 5% update | Photo tagging — read-mostly |
//! | **C** | 100% read | User profile cache — read-only |
//! | **D** | 95% read, 5% insert | Read-latest — status updates |
//! | **E** | 95% scan, 5% insert | Short ranges — threaded conversations |
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench ycsb          # all workloads
//! cargo bench --bench ycsb -- "A"   # workload A only
//! ```

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};

use ordoledb::db::{DB, Options, ReadOptions, WriteOptions};
use rand::Rng;
use std::hint::black_box;
use tempfile::TempDir;

/// Number of records loaded into the database before running workloads.
const RECORD_COUNT: u64 = 10_000;

/// Number of operations per workload run.
const OPS_PER_RUN: u64 = 2_000;

/// Value size in bytes.
const VALUE_SIZE: usize = 256;

/// Scan length for workload E.
const SCAN_LENGTH: u64 = 50;

fn make_key(i: u64) -> Vec<u8> {
    format!("user{i:012}").into_bytes()
}

/// Loads `RECORD_COUNT` sequential records and returns the opened
/// database along with the directory keeping it alive.
fn loaded_db() -> (TempDir, DB) {
    let dir = TempDir::new().unwrap();
    let options = Options { write_buffer_size: 4 * 1024 * 1024, ..Options::default() };
    let db = DB::open(dir.path(), options).unwrap();
    let value = vec![0x5Au8; VALUE_SIZE];
    for i in 0..RECORD_COUNT {
        db.put(&WriteOptions::default(), &make_key(i), &value).unwrap();
    }
    (dir, db)
}

fn run_mixed_workload(db: &DB, read_fraction: f64, rng: &mut impl Rng) {
    let read = ReadOptions::default();
    let value = vec![0x5Au8; VALUE_SIZE];
    for _ in 0..OPS_PER_RUN {
        let key = make_key(rng.random_range(0..RECORD_COUNT));
        if rng.random_bool(read_fraction) {
            black_box(db.get(&read, &key).unwrap());
        } else {
            db.put(&WriteOptions::default(), &key, black_box(&value)).unwrap();
        }
    }
}

fn bench_load_phase(c: &mut Criterion) {
    c.bench_function("ycsb/load", |b| {
        b.iter(|| {
            let dir = TempDir::new().unwrap();
            let db = DB::open(dir.path(), Options::default()).unwrap();
            let value = vec![0x5Au8; VALUE_SIZE];
            for i in 0..RECORD_COUNT {
                db.put(&WriteOptions::default(), &make_key(i), &value).unwrap();
            }
        });
    });
}

fn bench_workload_a_update_heavy(c: &mut Criterion) {
    let (_dir, db) = loaded_db();
    let mut rng = rand::rng();
    c.bench_function("ycsb/A_update_heavy", |b| {
        b.iter(|| run_mixed_workload(&db, 0.5, &mut rng));
    });
}

fn bench_workload_b_read_mostly(c: &mut Criterion) {
    let (_dir, db) = loaded_db();
    let mut rng = rand::rng();
    c.bench_function("ycsb/B_read_mostly", |b| {
        b.iter(|| run_mixed_workload(&db, 0.95, &mut rng));
    });
}

fn bench_workload_c_read_only(c: &mut Criterion) {
    let (_dir, db) = loaded_db();
    let mut rng = rand::rng();
    let read = ReadOptions::default();
    c.bench_function("ycsb/C_read_only", |b| {
        b.iter(|| {
            for _ in 0..OPS_PER_RUN {
                let key = make_key(rng.random_range(0..RECORD_COUNT));
                black_box(db.get(&read, &key).unwrap());
            }
        });
    });
}

fn bench_workload_d_read_latest(c: &mut Criterion) {
    let (_dir, db) = loaded_db();
    let mut rng = rand::rng();
    let read = ReadOptions::default();
    let mut next = RECORD_COUNT;
    c.bench_function("ycsb/D_read_latest", |b| {
        b.iter(|| {
            for _ in 0..OPS_PER_RUN {
                if rng.random_bool(0.95) {
                    let key = make_key(next.saturating_sub(1));
                    black_box(db.get(&read, &key).unwrap());
                } else {
                    db.put(&WriteOptions::default(), &make_key(next), &[0x5Au8; VALUE_SIZE]).unwrap();
                    next += 1;
                }
            }
        });
    });
}

fn bench_workload_e_short_scans(c: &mut Criterion) {
    let (_dir, db) = loaded_db();
    let mut rng = rand::rng();
    c.bench_function("ycsb/E_short_scans", |b| {
        b.iter(|| {
            for _ in 0..(OPS_PER_RUN / 10).max(1) {
                let start = rng.random_range(0..RECORD_COUNT.saturating_sub(SCAN_LENGTH).max(1));
                let mut it = db.new_iterator(&ReadOptions::default());
                it.seek(&make_key(start));
                let mut scanned = 0u64;
                while it.valid() && scanned < SCAN_LENGTH {
                    black_box(it.value());
                    it.next();
                    scanned += 1;
                }
            }
        });
    });
}

fn bench_compact_range(c: &mut Criterion) {
    c.bench_function("ycsb/compact_range", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let options = Options { write_buffer_size: 64 * 1024, ..Options::default() };
                let db = DB::open(dir.path(), options).unwrap();
                let value = vec![0x5Au8; VALUE_SIZE];
                for i in 0..RECORD_COUNT {
                    db.put(&WriteOptions::default(), &make_key(i), &value).unwrap();
                }
                (dir, db)
            },
            |(_dir, db)| {
                db.compact_range(None, None).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_record_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("ycsb/scaling");
    for count in [1_000u64, 10_000u64] {
        group.bench_with_input(BenchmarkId::new("get", count), &count, |b, &count| {
            let dir = TempDir::new().unwrap();
            let db = DB::open(dir.path(), Options::default()).unwrap();
            let value = vec![0x5Au8; VALUE_SIZE];
            for i in 0..count {
                db.put(&WriteOptions::default(), &make_key(i), &value).unwrap();
            }
            let read = ReadOptions::default();
            let mut i = 0u64;
            b.iter(|| {
                black_box(db.get(&read, &make_key(i % count)).unwrap());
                i += 1;
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_load_phase,
    bench_workload_a_update_heavy,
    bench_workload_b_read_mostly,
    bench_workload_c_read_only,
    bench_workload_d_read_latest,
    bench_workload_e_short_scans,
    bench_compact_range,
    bench_record_count,
);
criterion_main!(benches);

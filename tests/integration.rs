//! Integration tests for the public `DB` API.
//!
//! These tests exercise the full storage stack (WAL -> memtable -> SSTable
//! -> compaction) through the public `ordoledb::db::{DB, Options,
//! ReadOptions, WriteOptions, WriteBatch}` surface only. No internal
//! modules are referenced.
//!
//! ## Coverage areas
//! - **Lifecycle**: open, reopen, recovery across a drop
//! - **CRUD**: put, get, delete, overwrite, nonexistent keys, batches
//! - **Scan**: forward/backward iteration, seek, tombstone filtering
//! - **Snapshots**: isolation from later writes
//! - **Persistence**: data and sequence numbers survive close -> reopen
//! - **Compaction**: manual `compact_range` preserves data
//! - **Maintenance**: `get_property`, `get_approximate_sizes`, `destroy_db`
//! - **Concurrency**: multiple threads writing through one `DB` handle
//!
//! ## See also
//! - [`db::tests`](ordoledb::db) — internal db-level unit tests
//! - [`sstable::tests`](ordoledb::sstable) — SSTable read/write unit tests
//! - [`memtable::tests`](ordoledb::memtable) — memtable unit tests

use ordoledb::db::{DB, Options, ReadOptions, WriteBatch, WriteOptions, destroy_db};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Small write buffer to trigger frequent freezes and background flushes.
fn small_buffer_options() -> Options {
    Options { write_buffer_size: 1024, ..Options::default() }
}

/// Reopen a database at the same path with default options.
fn reopen(path: &std::path::Path) -> DB {
    DB::open(path, Options::default()).expect("reopen")
}

// ================================================================================================
// Lifecycle
// ================================================================================================

/// # Scenario
/// Open a fresh database and immediately drop it.
#[test]
fn open_and_drop_empty() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    drop(db);
}

/// # Scenario
/// Dropping the handle without any explicit shutdown call must still
/// persist prior writes, since every write is WAL-durable before `put`
/// returns.
#[test]
fn drop_without_explicit_close_still_persists_writes() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    db.put(&WriteOptions::default(), b"key", b"value").unwrap();
    drop(db);

    let db = reopen(dir.path());
    assert_eq!(db.get(&ReadOptions::default(), b"key").unwrap(), Some(b"value".to_vec()));
}

// ================================================================================================
// Basic CRUD
// ================================================================================================

/// # Scenario
/// Basic put/get round-trip for a single key.
#[test]
fn put_get_single() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"hello", b"world").unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"hello").unwrap(), Some(b"world".to_vec()));
}

/// # Scenario
/// Overwriting a key must return the latest value.
#[test]
fn put_overwrite() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"key", b"v1").unwrap();
    db.put(&WriteOptions::default(), b"key", b"v2").unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"key").unwrap(), Some(b"v2".to_vec()));
}

/// # Scenario
/// Deleting a key makes it invisible to subsequent reads.
#[test]
fn delete_key() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"key", b"value").unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"key").unwrap(), Some(b"value".to_vec()));

    db.delete(&WriteOptions::default(), b"key").unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"key").unwrap(), None);
}

/// # Scenario
/// Reading a key that was never written returns `None`, not an error.
#[test]
fn get_missing_key_returns_none() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"nope").unwrap(), None);
}

/// # Scenario
/// Deleting a key that was never written is not an error, and still
/// leaves the key absent.
#[test]
fn delete_missing_key_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    db.delete(&WriteOptions::default(), b"nope").unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"nope").unwrap(), None);
}

/// # Scenario
/// A `WriteBatch` mixing puts and deletes applies as a single atomic unit.
#[test]
fn write_batch_applies_atomically() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"stale", b"old").unwrap();

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.put(b"b", b"2");
    batch.delete(b"stale");
    db.write(&WriteOptions::default(), batch).unwrap();

    let read = ReadOptions::default();
    assert_eq!(db.get(&read, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&read, b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&read, b"stale").unwrap(), None);
}

// ================================================================================================
// Scan
// ================================================================================================

/// # Scenario
/// A full forward scan visits every live key in ascending order and
/// skips deleted ones.
#[test]
fn forward_scan_is_sorted_and_skips_tombstones() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    for k in [b"d".as_slice(), b"b".as_slice(), b"a".as_slice(), b"c".as_slice()] {
        db.put(&WriteOptions::default(), k, k).unwrap();
    }
    db.delete(&WriteOptions::default(), b"b").unwrap();

    let mut it = db.new_iterator(&ReadOptions::default());
    it.seek_to_first();
    let mut seen = Vec::new();
    while it.valid() {
        seen.push(it.key().to_vec());
        it.next();
    }
    assert_eq!(seen, vec![b"a".to_vec(), b"c".to_vec(), b"d".to_vec()]);
}

/// # Scenario
/// Seeking positions the cursor at the first key not less than the
/// target, even when that exact key is absent.
#[test]
fn seek_lands_on_the_successor_of_a_missing_key() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    for k in [b"a".as_slice(), b"m".as_slice(), b"z".as_slice()] {
        db.put(&WriteOptions::default(), k, k).unwrap();
    }

    let mut it = db.new_iterator(&ReadOptions::default());
    it.seek(b"g");
    assert!(it.valid());
    assert_eq!(it.key(), b"m");
}

// ================================================================================================
// Snapshots
// ================================================================================================

/// # Scenario
/// A snapshot taken before an overwrite keeps observing the old value,
/// while a fresh read observes the new one.
#[test]
fn snapshot_isolates_from_later_writes() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"k", b"before").unwrap();
    let snapshot = db.get_snapshot();
    db.put(&WriteOptions::default(), b"k", b"after").unwrap();

    let pinned = ReadOptions { snapshot: Some(snapshot), ..Default::default() };
    assert_eq!(db.get(&pinned, b"k").unwrap(), Some(b"before".to_vec()));
    assert_eq!(db.get(&ReadOptions::default(), b"k").unwrap(), Some(b"after".to_vec()));

    db.release_snapshot(snapshot);
}

// ================================================================================================
// Persistence
// ================================================================================================

/// # Scenario
/// Data and tombstones both survive a close and reopen of the same
/// directory.
#[test]
fn data_and_deletes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = DB::open(dir.path(), Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"keep", b"v").unwrap();
        db.put(&WriteOptions::default(), b"drop", b"v").unwrap();
        db.delete(&WriteOptions::default(), b"drop").unwrap();
    }

    let db = reopen(dir.path());
    let read = ReadOptions::default();
    assert_eq!(db.get(&read, b"keep").unwrap(), Some(b"v".to_vec()));
    assert_eq!(db.get(&read, b"drop").unwrap(), None);
}

/// # Scenario
/// Recovery through a small write buffer forces WAL replay to flush
/// intermediate memtables into level-0 tables; every key must still be
/// readable afterward.
#[test]
fn recovery_survives_frequent_memtable_rotation() {
    let dir = TempDir::new().unwrap();
    let options = small_buffer_options();

    {
        let db = DB::open(dir.path(), options.clone()).unwrap();
        for i in 0..300u32 {
            let key = format!("k{i:05}");
            db.put(&WriteOptions::default(), key.as_bytes(), key.as_bytes()).unwrap();
        }
    }

    let db = DB::open(dir.path(), options).unwrap();
    for i in 0..300u32 {
        let key = format!("k{i:05}");
        assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), Some(key.clone().into_bytes()));
    }
}

// ================================================================================================
// Compaction
// ================================================================================================

/// # Scenario
/// A manual full-range compaction preserves every live key and still
/// hides deleted ones.
#[test]
fn manual_compaction_preserves_data() {
    let dir = TempDir::new().unwrap();
    let options = small_buffer_options();
    let db = DB::open(dir.path(), options).unwrap();

    for i in 0..200u32 {
        let key = format!("k{i:05}");
        db.put(&WriteOptions::default(), key.as_bytes(), b"v").unwrap();
    }
    for i in (0..200u32).step_by(3) {
        let key = format!("k{i:05}");
        db.delete(&WriteOptions::default(), key.as_bytes()).unwrap();
    }

    db.compact_range(None, None).unwrap();

    for i in 0..200u32 {
        let key = format!("k{i:05}");
        let expected = if i % 3 == 0 { None } else { Some(b"v".to_vec()) };
        assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), expected);
    }
}

// ================================================================================================
// Maintenance
// ================================================================================================

/// # Scenario
/// `get_property` reports level-0 file counts and rejects unknown
/// properties and out-of-range levels.
#[test]
fn get_property_reports_known_properties_only() {
    let dir = TempDir::new().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert_eq!(db.get_property("ordoledb.num-files-at-level0").unwrap(), "0");
    assert!(db.get_property("ordoledb.num-files-at-level999").is_none());
    assert!(db.get_property("unknown.property").is_none());
}

/// # Scenario
/// `destroy_db` removes every file belonging to a closed database.
#[test]
fn destroy_db_removes_the_whole_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("to-destroy");
    {
        let db = DB::open(&path, Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"k", b"v").unwrap();
    }
    assert!(path.exists());

    destroy_db(&path, &Options::default()).unwrap();
    assert!(!path.exists());
}

// ================================================================================================
// Concurrency
// ================================================================================================

/// # Scenario
/// Several threads writing disjoint keys through one cloned `DB` handle
/// all land successfully, with no write silently dropped.
#[test]
fn concurrent_writers_all_succeed() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(DB::open(dir.path(), small_buffer_options()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || {
                for i in 0..100u32 {
                    let key = format!("t{t}-k{i:04}");
                    db.put(&WriteOptions::default(), key.as_bytes(), b"v").unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for t in 0..4u32 {
        for i in 0..100u32 {
            let key = format!("t{t}-k{i:04}");
            assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), Some(b"v".to_vec()));
        }
    }
}

/// # Scenario
/// A reader running concurrently with writers never observes a torn or
/// partially-applied batch: it sees either the whole batch or none of
/// it.
#[test]
fn concurrent_readers_never_see_a_torn_batch() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(DB::open(dir.path(), Options::default()).unwrap());

    let writer_db = db.clone();
    let writer = thread::spawn(move || {
        for round in 0..200u32 {
            let mut batch = WriteBatch::new();
            batch.put(b"a", &round.to_le_bytes());
            batch.put(b"b", &round.to_le_bytes());
            writer_db.write(&WriteOptions::default(), batch).unwrap();
        }
    });

    let reader_db = db.clone();
    let reader = thread::spawn(move || {
        let read = ReadOptions::default();
        for _ in 0..200 {
            let a = reader_db.get(&read, b"a").unwrap();
            let b = reader_db.get(&read, b"b").unwrap();
            assert_eq!(a, b, "a and b must always advance together");
        }
    });

    writer.join().unwrap();
    reader.join().unwrap();
}

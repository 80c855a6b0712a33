use crate::db::{DB, Options, ReadOptions, WriteOptions};
use std::time::{Duration, Instant};

fn wait_until(mut check: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}

#[test]
fn writing_past_the_buffer_size_produces_level_zero_files() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options { write_buffer_size: 256, ..Options::default() };
    let db = DB::open(dir.path(), options).unwrap();

    for i in 0..200u32 {
        let key = format!("key-{i:05}");
        db.put(&WriteOptions::default(), key.as_bytes(), b"value").unwrap();
    }

    let produced_output =
        wait_until(|| db.get_property("ordoledb.num-files-at-level0").unwrap().parse::<u64>().unwrap_or(0) > 0, Duration::from_secs(5));
    assert!(produced_output, "expected at least one level-0 file after exceeding the write buffer repeatedly");

    for i in 0..200u32 {
        let key = format!("key-{i:05}");
        assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), Some(b"value".to_vec()));
    }
}

#[test]
fn compact_range_does_not_lose_or_corrupt_data() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options { write_buffer_size: 256, ..Options::default() };
    let db = DB::open(dir.path(), options).unwrap();

    for i in 0..100u32 {
        let key = format!("key-{i:05}");
        db.put(&WriteOptions::default(), key.as_bytes(), b"value").unwrap();
    }

    db.compact_range(None, None).unwrap();

    for i in 0..100u32 {
        let key = format!("key-{i:05}");
        assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), Some(b"value".to_vec()));
    }
}

#[test]
fn get_property_reports_stats_for_a_known_level() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert_eq!(db.get_property("ordoledb.num-files-at-level0").unwrap(), "0");
    assert!(db.get_property("ordoledb.num-files-at-level99").is_none());
    assert!(db.get_property("not-a-real-property").is_none());
}

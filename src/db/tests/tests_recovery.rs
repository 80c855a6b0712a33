use crate::db::{DB, Options, ReadOptions, WriteOptions};

#[test]
fn data_survives_a_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();

    {
        let db = DB::open(&path, Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"a", b"1").unwrap();
        db.put(&WriteOptions::default(), b"b", b"2").unwrap();
        db.delete(&WriteOptions::default(), b"a").unwrap();
    }

    let db = DB::open(&path, Options::default()).unwrap();
    let read = ReadOptions::default();
    assert_eq!(db.get(&read, b"a").unwrap(), None);
    assert_eq!(db.get(&read, b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn recovery_flushes_a_wal_that_overflows_the_write_buffer_into_a_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();
    let options = Options { write_buffer_size: 64, ..Options::default() };

    {
        let db = DB::open(&path, options.clone()).unwrap();
        for i in 0..50u32 {
            let key = format!("key-{i:04}");
            let value = format!("value-{i:04}");
            db.put(&WriteOptions::default(), key.as_bytes(), value.as_bytes()).unwrap();
        }
    }

    let db = DB::open(&path, options).unwrap();
    for i in 0..50u32 {
        let key = format!("key-{i:04}");
        let value = format!("value-{i:04}");
        assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), Some(value.into_bytes()));
    }
}

#[test]
fn sequence_numbers_keep_increasing_across_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();

    {
        let db = DB::open(&path, Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"a", b"1").unwrap();
        db.put(&WriteOptions::default(), b"a", b"2").unwrap();
    }

    let db = DB::open(&path, Options::default()).unwrap();
    let before = db.get_snapshot();
    db.put(&WriteOptions::default(), b"a", b"3").unwrap();
    let after = db.get_snapshot();
    assert!(after.sequence() > before.sequence());
}

#[test]
fn opening_a_missing_directory_without_create_if_missing_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist-yet");
    let options = Options { create_if_missing: false, ..Options::default() };
    assert!(DB::open(&path, options).is_err());
}

use crate::db::{DB, Options, ReadOptions, WriteOptions, destroy_db, repair_db};

#[test]
fn approximate_sizes_grow_with_more_data_in_the_range() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options { write_buffer_size: 256, ..Options::default() };
    let db = DB::open(dir.path(), options).unwrap();

    for i in 0..100u32 {
        let key = format!("key-{i:05}");
        db.put(&WriteOptions::default(), key.as_bytes(), &vec![b'x'; 100]).unwrap();
    }
    db.compact_range(None, None).unwrap();

    let small = db.get_approximate_sizes(&[(b"key-00000".to_vec(), b"key-00010".to_vec())]).unwrap();
    let large = db.get_approximate_sizes(&[(b"key-00000".to_vec(), b"key-00090".to_vec())]).unwrap();
    assert!(large[0] >= small[0]);
}

#[test]
fn destroy_db_removes_every_file_belonging_to_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("victim");
    {
        let db = DB::open(&path, Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"k", b"v").unwrap();
    }
    assert!(path.exists());

    destroy_db(&path, &Options::default()).unwrap();
    assert!(!path.exists());
}

#[test]
fn destroy_db_on_a_missing_path_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never-existed");
    assert!(destroy_db(&path, &Options::default()).is_ok());
}

#[test]
fn repair_db_rebuilds_a_usable_manifest_from_wal_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("to-repair");

    {
        let db = DB::open(&path, Options::default()).unwrap();
        db.put(&WriteOptions::default(), b"a", b"1").unwrap();
        db.put(&WriteOptions::default(), b"b", b"2").unwrap();
    }

    std::fs::remove_file(path.join("CURRENT")).unwrap();
    repair_db(&path, &Options::default()).unwrap();

    let db = DB::open(&path, Options::default()).unwrap();
    let read = ReadOptions::default();
    assert_eq!(db.get(&read, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&read, b"b").unwrap(), Some(b"2".to_vec()));
}

use crate::db::{DB, Options, ReadOptions, WriteOptions};

#[test]
fn a_snapshot_keeps_seeing_the_value_as_of_its_creation() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"k", b"before").unwrap();
    let snap = db.get_snapshot();
    db.put(&WriteOptions::default(), b"k", b"after").unwrap();

    let pinned = ReadOptions { snapshot: Some(snap), ..Default::default() };
    assert_eq!(db.get(&pinned, b"k").unwrap(), Some(b"before".to_vec()));
    assert_eq!(db.get(&ReadOptions::default(), b"k").unwrap(), Some(b"after".to_vec()));

    db.release_snapshot(snap);
}

#[test]
fn a_snapshot_does_not_see_keys_written_after_it_was_taken() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    let snap = db.get_snapshot();
    db.put(&WriteOptions::default(), b"new", b"v").unwrap();

    let pinned = ReadOptions { snapshot: Some(snap), ..Default::default() };
    assert_eq!(db.get(&pinned, b"new").unwrap(), None);
    db.release_snapshot(snap);
}

#[test]
fn an_iterator_built_against_a_snapshot_is_unaffected_by_later_writes() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"a", b"1").unwrap();
    let snap = db.get_snapshot();
    db.put(&WriteOptions::default(), b"b", b"2").unwrap();

    let pinned = ReadOptions { snapshot: Some(snap), ..Default::default() };
    let mut it = db.new_iterator(&pinned);
    it.seek_to_first();
    let mut seen = Vec::new();
    while it.valid() {
        seen.push(it.key().to_vec());
        it.next();
    }
    assert_eq!(seen, vec![b"a".to_vec()]);
    db.release_snapshot(snap);
}

use crate::db::{DB, Options, ReadOptions, WriteBatch, WriteOptions};

#[test]
fn a_batch_applies_every_operation_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    db.put(&WriteOptions::default(), b"existing", b"old").unwrap();

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.put(b"b", b"2");
    batch.delete(b"existing");
    db.write(&WriteOptions::default(), batch).unwrap();

    let read = ReadOptions::default();
    assert_eq!(db.get(&read, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&read, b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&read, b"existing").unwrap(), None);
}

#[test]
fn a_later_put_in_the_same_batch_wins_over_an_earlier_one() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();

    let mut batch = WriteBatch::new();
    batch.put(b"k", b"first");
    batch.put(b"k", b"second");
    db.write(&WriteOptions::default(), batch).unwrap();

    assert_eq!(db.get(&ReadOptions::default(), b"k").unwrap(), Some(b"second".to_vec()));
}

#[test]
fn batch_wire_format_round_trips_through_encode_and_decode() {
    let mut batch = WriteBatch::new();
    batch.put(b"k1", b"v1");
    batch.delete(b"k2");
    assert_eq!(batch.count(), 2);

    let mut encoded = Vec::new();
    batch.encode_to(100, &mut encoded);

    let (seq, decoded) = WriteBatch::decode_from(&encoded).unwrap();
    assert_eq!(seq, 100);
    assert_eq!(decoded.count(), 2);
}

#[test]
fn an_empty_batch_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let db = DB::open(dir.path(), Options::default()).unwrap();
    assert!(db.write(&WriteOptions::default(), WriteBatch::new()).is_ok());
}

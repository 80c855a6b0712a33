use crate::wal::{Writer, read_all};
use tempfile::tempdir;

#[test]
fn roundtrips_small_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000001.log");

    {
        let mut w = Writer::create(&path).unwrap();
        w.add_record(b"hello").unwrap();
        w.add_record(b"world").unwrap();
        w.add_record(b"").unwrap();
    }

    let records = read_all(&path, false).unwrap();
    assert_eq!(records, vec![b"hello".to_vec(), b"world".to_vec(), Vec::new()]);
}

#[test]
fn appends_survive_writer_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000001.log");

    {
        let mut w = Writer::create(&path).unwrap();
        w.add_record(b"first").unwrap();
    }
    {
        let mut w = Writer::create(&path).unwrap();
        w.add_record(b"second").unwrap();
    }

    let records = read_all(&path, false).unwrap();
    assert_eq!(records, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[test]
fn empty_log_yields_no_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000001.log");
    Writer::create(&path).unwrap();
    assert!(read_all(&path, false).unwrap().is_empty());
}

use crate::dbformat::{InternalKey, ValueType};
use crate::version::VersionEdit;

#[test]
fn encode_decode_round_trips_every_field() {
    let mut edit = VersionEdit::new();
    edit.comparator = Some("leveldb.BytewiseComparator".to_string());
    edit.log_number = Some(5);
    edit.prev_log_number = Some(4);
    edit.next_file_number = Some(10);
    edit.last_sequence = Some(100);
    edit.set_compact_pointer(1, InternalKey::new(b"m", 7, ValueType::Value));
    edit.add_file(2, 11, 4096, InternalKey::new(b"a", 1, ValueType::Value), InternalKey::new(b"z", 1, ValueType::Value));
    edit.delete_file(0, 3);

    let mut buf = Vec::new();
    edit.encode_to(&mut buf);
    let decoded = VersionEdit::decode_from(&buf).unwrap();

    assert_eq!(decoded.comparator, edit.comparator);
    assert_eq!(decoded.log_number, Some(5));
    assert_eq!(decoded.prev_log_number, Some(4));
    assert_eq!(decoded.next_file_number, Some(10));
    assert_eq!(decoded.last_sequence, Some(100));
    assert_eq!(decoded.compact_pointers.len(), 1);
    assert_eq!(decoded.compact_pointers[0].0, 1);
    assert_eq!(decoded.compact_pointers[0].1.as_bytes(), edit.compact_pointers[0].1.as_bytes());
    assert_eq!(decoded.deleted_files, vec![(0, 3)]);
    assert_eq!(decoded.new_files.len(), 1);
    assert_eq!(decoded.new_files[0].0, 2);
    assert_eq!(decoded.new_files[0].1.number, 11);
    assert_eq!(decoded.new_files[0].1.file_size, 4096);
}

#[test]
fn decode_rejects_unknown_tag() {
    let mut buf = Vec::new();
    crate::encoding::put_varint32(&mut buf, 255);
    assert!(VersionEdit::decode_from(&buf).is_err());
}

#[test]
fn empty_edit_round_trips_to_all_none() {
    let edit = VersionEdit::new();
    let mut buf = Vec::new();
    edit.encode_to(&mut buf);
    assert!(buf.is_empty());
    let decoded = VersionEdit::decode_from(&buf).unwrap();
    assert!(decoded.comparator.is_none());
    assert!(decoded.new_files.is_empty());
}

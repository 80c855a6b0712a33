use crate::comparator::bytewise;
use crate::dbformat::{ValueType, extract_user_key};
use crate::memtable::MemTable;

#[test]
fn iterator_visits_same_user_key_newest_sequence_first() {
    let mt = MemTable::new(bytewise());
    mt.add(1, ValueType::Value, b"k", b"v1");
    mt.add(2, ValueType::Value, b"k", b"v2");
    mt.add(3, ValueType::Deletion, b"k", b"");

    let mut it = mt.iter();
    it.seek_to_first();
    assert!(it.valid());
    assert_eq!(extract_user_key(it.key()), b"k");
    // Newest entry (seq 3) is the tombstone just added.
    assert_eq!(it.value(), b"".as_slice());

    // Confirm it really is ordered seq desc by walking all three entries.
    let mut seqs = Vec::new();
    it.seek_to_first();
    while it.valid() {
        let parsed = crate::dbformat::parse_internal_key(it.key()).unwrap();
        seqs.push(parsed.sequence);
        it.next();
    }
    assert_eq!(seqs, vec![3, 2, 1]);
}

#[test]
fn iterator_orders_distinct_user_keys_lexicographically() {
    let mt = MemTable::new(bytewise());
    for k in [b"banana".as_slice(), b"apple", b"cherry"] {
        mt.add(1, ValueType::Value, k, b"v");
    }
    let mut it = mt.iter();
    it.seek_to_first();
    let mut keys = Vec::new();
    while it.valid() {
        keys.push(extract_user_key(it.key()).to_vec());
        it.next();
    }
    assert_eq!(keys, vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]);
}

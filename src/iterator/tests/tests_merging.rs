use super::common::VecIter;
use crate::comparator::bytewise;
use crate::iterator::{Iter, MergingIterator};

fn entries(pairs: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    pairs.iter().map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec())).collect()
}

#[test]
fn merges_disjoint_children_in_order() {
    let a = Box::new(VecIter::new(entries(&[("a", "1"), ("c", "3")])));
    let b = Box::new(VecIter::new(entries(&[("b", "2"), ("d", "4")])));
    let mut it = MergingIterator::new(bytewise(), vec![a, b]);
    it.seek_to_first();

    let mut seen = Vec::new();
    while it.valid() {
        seen.push((it.key().to_vec(), it.value().to_vec()));
        it.next();
    }
    assert_eq!(seen, entries(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]));
}

#[test]
fn earlier_child_wins_on_equal_keys() {
    // Child 0 represents the newer source (e.g. the active memtable);
    // child 1 the older one. Both have an entry for "k".
    let newer = Box::new(VecIter::new(entries(&[("k", "new")])));
    let older = Box::new(VecIter::new(entries(&[("k", "old")])));
    let mut it = MergingIterator::new(bytewise(), vec![newer, older]);
    it.seek_to_first();
    assert!(it.valid());
    assert_eq!(it.key(), b"k");
    assert_eq!(it.value(), b"new");
    it.next();
    assert!(it.valid());
    assert_eq!(it.value(), b"old");
}

#[test]
fn seek_positions_at_first_key_at_or_after_target() {
    let a = Box::new(VecIter::new(entries(&[("a", "1"), ("m", "2")])));
    let b = Box::new(VecIter::new(entries(&[("z", "3")])));
    let mut it = MergingIterator::new(bytewise(), vec![a, b]);
    it.seek(b"f");
    assert!(it.valid());
    assert_eq!(it.key(), b"m");
}

#[test]
fn reversing_direction_mid_scan_yields_the_correct_predecessor() {
    let a = Box::new(VecIter::new(entries(&[("a", "1"), ("c", "3")])));
    let b = Box::new(VecIter::new(entries(&[("b", "2")])));
    let mut it = MergingIterator::new(bytewise(), vec![a, b]);
    it.seek_to_first();
    assert_eq!(it.key(), b"a");
    it.next();
    assert_eq!(it.key(), b"b");
    it.next();
    assert_eq!(it.key(), b"c");
    it.prev();
    assert_eq!(it.key(), b"b");
    it.prev();
    assert_eq!(it.key(), b"a");
    assert!(it.valid());
}

#[test]
fn empty_children_leave_the_iterator_invalid() {
    let a = Box::new(VecIter::new(Vec::new()));
    let b = Box::new(VecIter::new(Vec::new()));
    let mut it = MergingIterator::new(bytewise(), vec![a, b]);
    it.seek_to_first();
    assert!(!it.valid());
}

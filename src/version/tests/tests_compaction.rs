use crate::comparator::bytewise;
use crate::dbformat::{InternalKey, InternalKeyComparator, ValueType};
use crate::version::{FileMetaData, Version};
use std::sync::Arc;

fn file(number: u64, smallest: &[u8], largest: &[u8], size: u64) -> Arc<FileMetaData> {
    Arc::new(FileMetaData::new(
        number,
        size,
        InternalKey::new(smallest, 1, ValueType::Value),
        InternalKey::new(largest, 1, ValueType::Value),
    ))
}

#[test]
fn get_overlapping_inputs_restarts_expansion_on_level_zero() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut v = Version::empty();
    // Three overlapping L0 files: querying [c, d] should pull in the
    // second file (which overlaps [c, d]), which then widens the range
    // enough to also catch the third, even though the third didn't
    // overlap the original [c, d] query.
    v.files[0].push(file(1, b"a", b"e", 10));
    v.files[0].push(file(2, b"d", b"h", 10));
    v.files[0].push(file(3, b"g", b"k", 10));

    let begin = InternalKey::new(b"c", 1, ValueType::Value);
    let end = InternalKey::new(b"d", 1, ValueType::Value);
    let inputs = v.get_overlapping_inputs(&icmp, 0, Some(&begin), Some(&end));

    let mut numbers: Vec<u64> = inputs.iter().map(|f| f.number).collect();
    numbers.sort();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn get_overlapping_inputs_on_level_one_plus_does_not_expand() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut v = Version::empty();
    v.files[1].push(file(1, b"a", b"c", 10));
    v.files[1].push(file(2, b"d", b"f", 10));

    let begin = InternalKey::new(b"a", 1, ValueType::Value);
    let end = InternalKey::new(b"a", 1, ValueType::Value);
    let inputs = v.get_overlapping_inputs(&icmp, 1, Some(&begin), Some(&end));
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].number, 1);
}

#[test]
fn pick_level_for_memtable_output_stays_at_zero_on_l0_overlap() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut v = Version::empty();
    v.files[0].push(file(1, b"a", b"m", 10));

    let level = v.pick_level_for_memtable_output(&icmp, b"a", b"m");
    assert_eq!(level, 0);
}

#[test]
fn pick_level_for_memtable_output_skips_past_an_empty_level_one() {
    let icmp = InternalKeyComparator::new(bytewise());
    let v = Version::empty();
    let level = v.pick_level_for_memtable_output(&icmp, b"a", b"m");
    assert!(level >= 1);
}

#[test]
fn pick_level_for_memtable_output_stops_below_a_level_one_overlap() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut v = Version::empty();
    v.files[1].push(file(1, b"a", b"z", 10));

    let level = v.pick_level_for_memtable_output(&icmp, b"a", b"m");
    assert_eq!(level, 0);
}

#[test]
fn should_stop_before_fires_once_grandparent_overlap_exceeds_budget() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut c = super::super::Compaction::new(1);
    let huge = crate::version::MAX_GRAND_PARENT_OVERLAP_BYTES + 1;
    c.grandparents.push(file(1, b"a", b"m", huge));

    let within = InternalKey::new(b"b", 1, ValueType::Value);
    assert!(!c.should_stop_before(&icmp, within.as_bytes()));

    let past = InternalKey::new(b"z", 1, ValueType::Value);
    assert!(c.should_stop_before(&icmp, past.as_bytes()));
}

#[test]
fn is_base_level_for_key_is_false_when_a_deeper_level_still_holds_the_key() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut v = Version::empty();
    v.files[3].push(file(1, b"a", b"z", 10));

    let mut c = super::super::Compaction::new(1);
    assert!(!c.is_base_level_for_key(&v, &icmp, b"m"));
}

#[test]
fn is_base_level_for_key_is_true_when_no_deeper_level_overlaps() {
    let icmp = InternalKeyComparator::new(bytewise());
    let v = Version::empty();
    let mut c = super::super::Compaction::new(1);
    assert!(c.is_base_level_for_key(&v, &icmp, b"m"));
}

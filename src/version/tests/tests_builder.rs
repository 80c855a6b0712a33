use crate::comparator::bytewise;
use crate::dbformat::{InternalKey, InternalKeyComparator, ValueType};
use crate::version::{Version, VersionEdit};
use std::sync::Arc;

fn file(number: u64, smallest: &[u8], largest: &[u8]) -> Arc<crate::version::FileMetaData> {
    Arc::new(crate::version::FileMetaData::new(
        number,
        4096,
        InternalKey::new(smallest, 1, ValueType::Value),
        InternalKey::new(largest, 1, ValueType::Value),
    ))
}

#[test]
fn finalize_scores_l0_by_file_count() {
    let icmp = InternalKeyComparator::new(bytewise());
    let mut edit = VersionEdit::new();
    for i in 0..super::super::L0_COMPACTION_TRIGGER {
        edit.new_files.push((0, file(i as u64, b"a", b"z")));
    }

    let base = Version::empty();
    let mut builder = super::super::Builder::new(&icmp, &base);
    builder.apply(&edit);
    let v = builder.save_to();

    assert_eq!(v.num_files(0), super::super::L0_COMPACTION_TRIGGER);
    assert_eq!(v.compaction_level(), 0);
    assert!(v.compaction_score() >= 1.0);
}

#[test]
fn apply_then_save_merges_additions_and_removes_deletions() {
    let icmp = InternalKeyComparator::new(bytewise());
    let base = Version::empty();

    let mut add_edit = VersionEdit::new();
    add_edit.new_files.push((1, file(1, b"a", b"c")));
    add_edit.new_files.push((1, file(2, b"d", b"f")));
    let mut builder = super::super::Builder::new(&icmp, &base);
    builder.apply(&add_edit);
    let v1 = builder.save_to();
    assert_eq!(v1.num_files(1), 2);

    let mut del_edit = VersionEdit::new();
    del_edit.delete_file(1, 1);
    let mut builder2 = super::super::Builder::new(&icmp, &v1);
    builder2.apply(&del_edit);
    let v2 = builder2.save_to();

    assert_eq!(v2.num_files(1), 1);
    assert_eq!(v2.files[1][0].number, 2);
}

#[test]
fn save_to_keeps_level_sorted_by_smallest_key() {
    let icmp = InternalKeyComparator::new(bytewise());
    let base = Version::empty();

    let mut edit = VersionEdit::new();
    edit.new_files.push((1, file(1, b"m", b"p")));
    edit.new_files.push((1, file(2, b"a", b"c")));
    let mut builder = super::super::Builder::new(&icmp, &base);
    builder.apply(&edit);
    let v = builder.save_to();

    assert_eq!(v.files[1][0].number, 2);
    assert_eq!(v.files[1][1].number, 1);
}

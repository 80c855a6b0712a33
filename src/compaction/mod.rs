//! Executes a [`Compaction`] chosen by [`crate::version::VersionSet`]:
//! either a trivial move (relink a single file into the next level) or
//! a full merge of its two input levels into a run of new, rolled-over
//! output files, followed by installing the resulting edit via
//! [`VersionSet::log_and_apply`].
//!
//! Picking *which* compaction to run, and all of the per-level
//! overlap/scoring bookkeeping, lives in [`crate::version`] — this
//! module only knows how to carry one out once chosen.

use crate::cache::TableCache;
use crate::dbformat::{InternalKey, InternalKeyComparator, ParsedInternalKey, SequenceNumber, ValueType, parse_internal_key};
use crate::filename::table_file_name;
use crate::iterator::{Iter, MergingIterator};
use crate::sstable::{BuilderError, TableBuilder};
use crate::version::{Compaction, TARGET_FILE_SIZE, Version, VersionEdit, VersionError, VersionSet, concatenating_iterator_over_files};
use std::cmp::Ordering;
use std::fs::File;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("version error: {0}")]
    Version(#[from] VersionError),
    #[error("sstable builder error: {0}")]
    Builder(#[from] BuilderError),
    #[error("table cache error: {0}")]
    TableCache(#[from] crate::cache::TableCacheError),
}

/// One freshly-written compaction output file, recorded so the
/// completion edit can `add_file` it once every output has been
/// flushed and verified.
struct OutputFile {
    number: u64,
    file_size: u64,
    smallest: InternalKey,
    largest: InternalKey,
}

/// Runs `compaction` to completion and installs the result.
/// `smallest_snapshot` is the lowest sequence number any live snapshot
/// can still observe — entries above it are never dropped, matching
/// the rule that a snapshot's view must never change out from under
/// it. `base_version` is the version `compaction` was computed
/// against, consulted by the tombstone-GC rule to check whether a
/// deeper level still holds a key a higher level wants to drop.
///
/// A trivial move never opens a merging iterator at all: the single
/// input file is just relinked into the next level by edit alone.
/// Otherwise every input is merged into a run of new level+1 output
/// files, rolling over at [`TARGET_FILE_SIZE`] or whenever
/// [`Compaction::should_stop_before`] reports too much accumulated
/// grandparent overlap.
pub fn compact(
    versions: &mut VersionSet,
    table_cache: &TableCache,
    icmp: &Arc<InternalKeyComparator>,
    base_version: &Version,
    mut compaction: Compaction,
    smallest_snapshot: SequenceNumber,
) -> Result<(), CompactionError> {
    if compaction.is_trivial_move() {
        let f = compaction.input(0, 0).clone();
        let mut edit = VersionEdit::new();
        compaction.add_input_deletions(&mut edit);
        edit.add_file(compaction.level + 1, f.number, f.file_size, f.smallest.clone(), f.largest.clone());
        info!(level = compaction.level, file = f.number, "compaction: trivial move");
        return Ok(versions.log_and_apply(edit)?);
    }

    let outputs = merge_compaction(versions, table_cache, icmp, base_version, &mut compaction, smallest_snapshot)?;

    let mut edit = VersionEdit::new();
    compaction.add_input_deletions(&mut edit);
    for out in &outputs {
        edit.add_file(compaction.level + 1, out.number, out.file_size, out.smallest.clone(), out.largest.clone());
    }
    if let Some(pointer) = compaction.next_compact_pointer.take() {
        edit.set_compact_pointer(compaction.level, pointer);
    }

    info!(
        level = compaction.level,
        inputs0 = compaction.num_input_files(0),
        inputs1 = compaction.num_input_files(1),
        outputs = outputs.len(),
        "compaction: merge complete"
    );
    Ok(versions.log_and_apply(edit)?)
}

/// Tracks, across the whole merge, which user key is currently being
/// emitted and the sequence number of the last (newest) version of it
/// already seen — the state [`should_drop`] needs to recognize a
/// strictly older duplicate.
struct DropState {
    has_current_user_key: bool,
    current_user_key: Vec<u8>,
    last_sequence_for_key: SequenceNumber,
}

impl DropState {
    fn new() -> Self {
        DropState {
            has_current_user_key: false,
            current_user_key: Vec::new(),
            last_sequence_for_key: SequenceNumber::MAX,
        }
    }
}

fn merge_compaction<'a>(
    versions: &mut VersionSet,
    table_cache: &'a TableCache,
    icmp: &Arc<InternalKeyComparator>,
    base_version: &Version,
    compaction: &mut Compaction,
    smallest_snapshot: SequenceNumber,
) -> Result<Vec<OutputFile>, CompactionError> {
    let mut children: Vec<Box<dyn Iter + 'a>> = Vec::new();
    if compaction.level == 0 {
        for i in 0..compaction.num_input_files(0) {
            let f = compaction.input(0, i);
            children.push(Box::new(table_cache.iter(f.number, f.file_size)?));
        }
    } else {
        let files: Vec<_> = (0..compaction.num_input_files(0)).map(|i| compaction.input(0, i).clone()).collect();
        children.push(Box::new(concatenating_iterator_over_files(icmp.clone(), table_cache, files)));
    }
    let files1: Vec<_> = (0..compaction.num_input_files(1)).map(|i| compaction.input(1, i).clone()).collect();
    if !files1.is_empty() {
        children.push(Box::new(concatenating_iterator_over_files(icmp.clone(), table_cache, files1)));
    }

    let mut merged = MergingIterator::new(icmp.clone() as Arc<dyn crate::comparator::Comparator>, children);
    merged.seek_to_first();

    let mut outputs = Vec::new();
    let mut builder: Option<(u64, TableBuilder<File>)> = None;
    let mut current_smallest: Option<InternalKey> = None;
    let mut current_largest: Option<InternalKey> = None;
    let mut drop_state = DropState::new();

    while merged.valid() {
        let internal_key = merged.key().to_vec();
        let value = merged.value().to_vec();

        if compaction.should_stop_before(icmp, &internal_key) {
            if let Some((number, table_builder)) = builder.take() {
                outputs.push(finish_output(
                    table_cache,
                    number,
                    table_builder,
                    current_smallest.take().expect("output had at least one entry"),
                    current_largest.take().expect("output had at least one entry"),
                )?);
            }
        }

        let Some(parsed) = parse_internal_key(&internal_key) else {
            merged.next();
            continue;
        };
        let drop = should_drop(compaction, base_version, icmp, &parsed, smallest_snapshot, &mut drop_state);

        if !drop {
            if builder.is_none() {
                let number = versions.new_file_number();
                let path = table_file_name(versions.db_path(), number);
                let file = File::create(&path)?;
                builder = Some((number, TableBuilder::new(file, icmp.clone(), None)));
                current_smallest = None;
                current_largest = None;
            }
            let (_, table_builder) = builder.as_mut().expect("just ensured present");
            if current_smallest.is_none() {
                current_smallest = Some(InternalKey::from_encoded(internal_key.clone()));
            }
            current_largest = Some(InternalKey::from_encoded(internal_key.clone()));
            table_builder.add(&internal_key, &value)?;

            if table_builder.file_size() >= TARGET_FILE_SIZE {
                let (number, table_builder) = builder.take().expect("just added to it");
                outputs.push(finish_output(
                    table_cache,
                    number,
                    table_builder,
                    current_smallest.take().expect("just added an entry"),
                    current_largest.take().expect("just added an entry"),
                )?);
            }
        }

        merged.next();
    }

    if let Some((number, table_builder)) = builder.take() {
        outputs.push(finish_output(
            table_cache,
            number,
            table_builder,
            current_smallest.take().expect("output had at least one entry"),
            current_largest.take().expect("output had at least one entry"),
        )?);
    }

    Ok(outputs)
}

/// The per-emitted-key drop rule: suppress a key this compaction has
/// already emitted a newer version of (once that newer version is at
/// or below the smallest live snapshot, an older one can never be
/// observed again), and garbage-collect a tombstone once no deeper
/// level could still hold the value it would otherwise shadow.
fn should_drop(
    compaction: &mut Compaction,
    base_version: &Version,
    icmp: &InternalKeyComparator,
    parsed: &ParsedInternalKey<'_>,
    smallest_snapshot: SequenceNumber,
    state: &mut DropState,
) -> bool {
    let ucmp = icmp.user_comparator();
    let is_first_occurrence =
        !state.has_current_user_key || ucmp.compare(parsed.user_key, &state.current_user_key) != Ordering::Equal;
    if is_first_occurrence {
        state.current_user_key.clear();
        state.current_user_key.extend_from_slice(parsed.user_key);
        state.has_current_user_key = true;
        state.last_sequence_for_key = SequenceNumber::MAX;
    }

    let drop = if !is_first_occurrence && state.last_sequence_for_key <= smallest_snapshot {
        // A strictly older version of a user key no live snapshot can
        // reach behind a newer one: superseded, never visible again.
        true
    } else {
        parsed.value_type == ValueType::Deletion
            && parsed.sequence <= smallest_snapshot
            && compaction.is_base_level_for_key(base_version, icmp, parsed.user_key)
    };

    state.last_sequence_for_key = parsed.sequence;
    drop
}

fn finish_output(
    table_cache: &TableCache,
    number: u64,
    table_builder: TableBuilder<File>,
    smallest: InternalKey,
    largest: InternalKey,
) -> Result<OutputFile, CompactionError> {
    let file_size = table_builder.finish()?;
    // Re-open through the cache to verify the file just written is
    // actually readable before it's installed into the version.
    table_cache.evict(number);
    table_cache.find_table(number, file_size)?;
    Ok(OutputFile {
        number,
        file_size,
        smallest,
        largest,
    })
}

#[cfg(test)]
mod tests;

//! Per-level file metadata, compaction scoring, and version chaining.
//!
//! A [`Version`] is an immutable snapshot of "which SSTs exist, at
//! which level" — readers hold an `Arc<Version>` for the duration of
//! a call so that a concurrent compaction installing a new version
//! never invalidates a read in flight. [`VersionSet`] is the mutable
//! side: it owns the current `Version`, the log of
//! [`VersionEdit`]s that produced it (persisted via
//! [`crate::manifest`]), and the counters (`next_file_number`,
//! `last_sequence`, ...) that span the whole database's lifetime.
//!
//! Installing a new version is always `old state ++ one edit`, done
//! through [`VersionSet::log_and_apply`]: fold the edit onto a
//! [`Builder`] seeded from the current version, materialize the
//! result as a new `Version`, append the edit to the MANIFEST, then
//! swap it in. [`VersionSet::recover`] rebuilds that state at startup
//! by replaying every edit in the active MANIFEST through the same
//! `Builder`.

#[cfg(test)]
mod tests;

use crate::cache::TableCache;
use crate::comparator::Comparator;
use crate::dbformat::{InternalKey, InternalKeyComparator, LookupKey, SequenceNumber, parse_internal_key};
use crate::encoding::{
    EncodingError, get_length_prefixed_slice, get_varint32, get_varint64, put_length_prefixed_slice, put_varint32,
    put_varint64,
};
use crate::iterator::{Iter, TwoLevelIterator};
use crate::manifest::{self, ManifestError};
use crate::sstable::TableGetResult;
use crate::wal::{self, WalError};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Levels 0..6; level 0 is the only one whose files may overlap each
/// other (they're flushed straight from the memtable, each one
/// spanning whatever key range happened to be resident).
pub const NUM_LEVELS: usize = 7;

/// L0 -> L1 compaction triggers once level 0 holds this many files,
/// independent of their total size (L0 files can be small, so a
/// pure size trigger would let reads degrade into scanning dozens of
/// them before a byte-size threshold ever tripped).
pub const L0_COMPACTION_TRIGGER: usize = 4;

/// Target size for one compaction output file.
pub const TARGET_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// A single compaction won't absorb more than this many grandparent
/// (level+2) bytes of overlap before rolling to a new output file —
/// otherwise one compaction could produce an output file whose future
/// compaction into the grandparent level reads far more data than
/// `TARGET_FILE_SIZE` would suggest.
pub const MAX_GRAND_PARENT_OVERLAP_BYTES: u64 = 10 * TARGET_FILE_SIZE;

/// A level-0 compaction's input set won't expand to pull in more than
/// this many additional bytes from overlapping neighbors.
pub const EXPANDED_COMPACTION_BYTE_SIZE_LIMIT: u64 = 25 * TARGET_FILE_SIZE;

/// `PickLevelForMemTableOutput` never pushes a flushed memtable past
/// this level, even if every overlap/size check would allow it —
/// deeper levels are for compaction to fill gradually, not for a
/// single flush to jump into.
const MAX_MEM_COMPACT_LEVEL: usize = 2;

/// A read that misses this many times against a file before another
/// file also overlapping the same key is found earns that first file
/// a compaction nudge; see [`Version::record_read_sample`].
const READ_BYTES_PERIOD: u64 = 1024 * 1024;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VersionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("table cache error: {0}")]
    TableCache(#[from] crate::cache::TableCacheError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("wal error: {0}")]
    Wal(#[from] WalError),

    #[error("corrupted MANIFEST: {0}")]
    Corruption(String),

    #[error("database was created with comparator '{found}', but is being opened with '{expected}'")]
    ComparatorMismatch { expected: String, found: String },
}

// ---------------------------------------------------------------------------
// FileMetaData
// ---------------------------------------------------------------------------

/// One SST's identity within a `Version`: which file, its key range,
/// and the seek-compaction budget `Version::get` decrements every time
/// this file is consulted and doesn't immediately resolve the lookup.
///
/// `allowed_seeks` is the one field a `Version` mutates after
/// construction (every other field is fixed at file-creation time), so
/// it alone needs interior mutability — files are shared by `Arc`
/// across every `Version` that still references them.
#[derive(Debug)]
pub struct FileMetaData {
    pub number: u64,
    pub file_size: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
    pub allowed_seeks: AtomicI64,
}

impl FileMetaData {
    pub fn new(number: u64, file_size: u64, smallest: InternalKey, largest: InternalKey) -> Self {
        let allowed_seeks = (file_size / 16384).max(100) as i64;
        FileMetaData {
            number,
            file_size,
            smallest,
            largest,
            allowed_seeks: AtomicI64::new(allowed_seeks),
        }
    }
}

fn total_file_size(files: &[Arc<FileMetaData>]) -> u64 {
    files.iter().map(|f| f.file_size).sum()
}

/// Classic per-level size budget: 10 MiB at level 1, x10 per level
/// after that. Level 0 is scored by file count, not bytes, so this is
/// never consulted for level 0.
fn max_bytes_for_level(level: usize) -> f64 {
    let mut result = 10.0 * 1024.0 * 1024.0;
    let mut level = level;
    while level > 1 {
        result *= 10.0;
        level -= 1;
    }
    result
}

fn find_file(icmp: &InternalKeyComparator, files: &[Arc<FileMetaData>], key: &[u8]) -> usize {
    files.partition_point(|f| icmp.compare(f.largest.as_bytes(), key) == Ordering::Less)
}

/// True if every file in `files` (assumed internally non-overlapping
/// and increasing) that overlaps `[smallest_user_key, largest_user_key]`
/// is empty, i.e. there is no overlap at all.
fn some_file_overlaps_range(
    icmp: &InternalKeyComparator,
    disjoint_sorted: bool,
    files: &[Arc<FileMetaData>],
    smallest_user_key: Option<&[u8]>,
    largest_user_key: Option<&[u8]>,
) -> bool {
    let ucmp = icmp.user_comparator();
    if !disjoint_sorted {
        for f in files {
            if after_file(ucmp.as_ref(), smallest_user_key, f) || before_file(ucmp.as_ref(), largest_user_key, f) {
                continue;
            }
            return true;
        }
        return false;
    }

    let index = match smallest_user_key {
        Some(key) => {
            let small_key = InternalKey::new(key, crate::dbformat::MAX_SEQUENCE_NUMBER, crate::dbformat::ValueType::FOR_SEEK);
            find_file(icmp, files, small_key.as_bytes())
        }
        None => 0,
    };

    if index >= files.len() {
        return false;
    }
    !before_file(ucmp.as_ref(), largest_user_key, &files[index])
}

fn after_file(ucmp: &dyn Comparator, user_key: Option<&[u8]>, f: &FileMetaData) -> bool {
    match user_key {
        Some(key) => ucmp.compare(key, f.largest.user_key()) == Ordering::Greater,
        None => false,
    }
}

fn before_file(ucmp: &dyn Comparator, user_key: Option<&[u8]>, f: &FileMetaData) -> bool {
    match user_key {
        Some(key) => ucmp.compare(key, f.smallest.user_key()) == Ordering::Less,
        None => false,
    }
}

// ---------------------------------------------------------------------------
// VersionEdit
// ---------------------------------------------------------------------------

const TAG_COMPARATOR: u32 = 1;
const TAG_LOG_NUMBER: u32 = 2;
const TAG_NEXT_FILE_NUMBER: u32 = 3;
const TAG_LAST_SEQUENCE: u32 = 4;
const TAG_COMPACT_POINTER: u32 = 5;
const TAG_DELETED_FILE: u32 = 6;
const TAG_NEW_FILE: u32 = 7;
const TAG_PREV_LOG_NUMBER: u32 = 9;

/// A delta against a `Version`: the unit of change the MANIFEST
/// persists and [`Builder`] folds onto a base version.
#[derive(Debug, Clone, Default)]
pub struct VersionEdit {
    pub comparator: Option<String>,
    pub log_number: Option<u64>,
    pub prev_log_number: Option<u64>,
    pub next_file_number: Option<u64>,
    pub last_sequence: Option<SequenceNumber>,
    pub compact_pointers: Vec<(usize, InternalKey)>,
    pub deleted_files: Vec<(usize, u64)>,
    pub new_files: Vec<(usize, Arc<FileMetaData>)>,
}

impl VersionEdit {
    pub fn new() -> Self {
        VersionEdit::default()
    }

    pub fn add_file(&mut self, level: usize, number: u64, file_size: u64, smallest: InternalKey, largest: InternalKey) {
        self.new_files
            .push((level, Arc::new(FileMetaData::new(number, file_size, smallest, largest))));
    }

    pub fn delete_file(&mut self, level: usize, number: u64) {
        self.deleted_files.push((level, number));
    }

    pub fn set_compact_pointer(&mut self, level: usize, key: InternalKey) {
        self.compact_pointers.push((level, key));
    }

    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        if let Some(cmp) = &self.comparator {
            put_varint32(buf, TAG_COMPARATOR);
            put_length_prefixed_slice(buf, cmp.as_bytes());
        }
        if let Some(n) = self.log_number {
            put_varint32(buf, TAG_LOG_NUMBER);
            put_varint64(buf, n);
        }
        if let Some(n) = self.prev_log_number {
            put_varint32(buf, TAG_PREV_LOG_NUMBER);
            put_varint64(buf, n);
        }
        if let Some(n) = self.next_file_number {
            put_varint32(buf, TAG_NEXT_FILE_NUMBER);
            put_varint64(buf, n);
        }
        if let Some(s) = self.last_sequence {
            put_varint32(buf, TAG_LAST_SEQUENCE);
            put_varint64(buf, s);
        }
        for (level, key) in &self.compact_pointers {
            put_varint32(buf, TAG_COMPACT_POINTER);
            put_varint32(buf, *level as u32);
            put_length_prefixed_slice(buf, key.as_bytes());
        }
        for (level, number) in &self.deleted_files {
            put_varint32(buf, TAG_DELETED_FILE);
            put_varint32(buf, *level as u32);
            put_varint64(buf, *number);
        }
        for (level, f) in &self.new_files {
            put_varint32(buf, TAG_NEW_FILE);
            put_varint32(buf, *level as u32);
            put_varint64(buf, f.number);
            put_varint64(buf, f.file_size);
            put_length_prefixed_slice(buf, f.smallest.as_bytes());
            put_length_prefixed_slice(buf, f.largest.as_bytes());
        }
    }

    pub fn decode_from(data: &[u8]) -> Result<VersionEdit, VersionError> {
        let mut edit = VersionEdit::new();
        let mut pos = 0usize;
        while pos < data.len() {
            let (tag, n) = get_varint32(&data[pos..])?;
            pos += n;
            match tag {
                TAG_COMPARATOR => {
                    let (name, n) = get_length_prefixed_slice(&data[pos..])?;
                    pos += n;
                    edit.comparator = Some(String::from_utf8(name).map_err(EncodingError::InvalidUtf8)?);
                }
                TAG_LOG_NUMBER => {
                    let (v, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    edit.log_number = Some(v);
                }
                TAG_PREV_LOG_NUMBER => {
                    let (v, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    edit.prev_log_number = Some(v);
                }
                TAG_NEXT_FILE_NUMBER => {
                    let (v, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    edit.next_file_number = Some(v);
                }
                TAG_LAST_SEQUENCE => {
                    let (v, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    edit.last_sequence = Some(v);
                }
                TAG_COMPACT_POINTER => {
                    let (level, n) = get_varint32(&data[pos..])?;
                    pos += n;
                    let (key, n) = get_length_prefixed_slice(&data[pos..])?;
                    pos += n;
                    edit.compact_pointers.push((level as usize, InternalKey::from_encoded(key)));
                }
                TAG_DELETED_FILE => {
                    let (level, n) = get_varint32(&data[pos..])?;
                    pos += n;
                    let (number, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    edit.deleted_files.push((level as usize, number));
                }
                TAG_NEW_FILE => {
                    let (level, n) = get_varint32(&data[pos..])?;
                    pos += n;
                    let (number, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    let (file_size, n) = get_varint64(&data[pos..])?;
                    pos += n;
                    let (smallest, n) = get_length_prefixed_slice(&data[pos..])?;
                    pos += n;
                    let (largest, n) = get_length_prefixed_slice(&data[pos..])?;
                    pos += n;
                    edit.new_files.push((
                        level as usize,
                        Arc::new(FileMetaData::new(
                            number,
                            file_size,
                            InternalKey::from_encoded(smallest),
                            InternalKey::from_encoded(largest),
                        )),
                    ));
                }
                other => return Err(VersionError::Corruption(format!("unknown VersionEdit tag {other}"))),
            }
        }
        Ok(edit)
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Outcome of [`Version::get`].
#[derive(Debug, PartialEq, Eq)]
pub enum VersionGetResult {
    Found(Vec<u8>),
    Deleted,
    NotFound,
}

/// An immutable point-in-time view of "which SSTs exist, at which
/// level". Shared by `Arc` between every reader and the `VersionSet`
/// that produced it; a compaction never mutates one in place, it
/// builds the next `Version` and swaps it in.
pub struct Version {
    pub files: [Vec<Arc<FileMetaData>>; NUM_LEVELS],
    compaction_score: f64,
    compaction_level: usize,
    file_to_compact: Mutex<Option<(Arc<FileMetaData>, usize)>>,
}

impl Version {
    fn empty() -> Self {
        Version {
            files: std::array::from_fn(|_| Vec::new()),
            compaction_score: -1.0,
            compaction_level: 0,
            file_to_compact: Mutex::new(None),
        }
    }

    pub fn num_files(&self, level: usize) -> usize {
        self.files[level].len()
    }

    pub fn compaction_score(&self) -> f64 {
        self.compaction_score
    }

    pub fn compaction_level(&self) -> usize {
        self.compaction_level
    }

    /// A file (and the level it lives in) that has earned a seek-driven
    /// compaction, if any read has exhausted its `allowed_seeks` budget.
    pub fn file_to_compact(&self) -> Option<(Arc<FileMetaData>, usize)> {
        self.file_to_compact.lock().expect("file_to_compact mutex poisoned").clone()
    }

    /// True if any file in `level` overlaps `[smallest_user_key,
    /// largest_user_key]` (either bound `None` meaning unbounded).
    pub fn overlap_in_level(
        &self,
        icmp: &InternalKeyComparator,
        level: usize,
        smallest_user_key: Option<&[u8]>,
        largest_user_key: Option<&[u8]>,
    ) -> bool {
        some_file_overlaps_range(icmp, level > 0, &self.files[level], smallest_user_key, largest_user_key)
    }

    /// The level a freshly flushed memtable's output file should land
    /// at: level 0 if it overlaps level 0, otherwise the deepest level
    /// (up to [`MAX_MEM_COMPACT_LEVEL`]) it can sit at without
    /// overlapping level+1 or reading too much grandparent data on a
    /// future compaction.
    pub fn pick_level_for_memtable_output(
        &self,
        icmp: &InternalKeyComparator,
        smallest_user_key: &[u8],
        largest_user_key: &[u8],
    ) -> usize {
        let mut level = 0;
        if !self.overlap_in_level(icmp, 0, Some(smallest_user_key), Some(largest_user_key)) {
            let start = InternalKey::new(smallest_user_key, crate::dbformat::MAX_SEQUENCE_NUMBER, crate::dbformat::ValueType::FOR_SEEK);
            let limit = InternalKey::new(largest_user_key, 0, crate::dbformat::ValueType::Deletion);
            while level < MAX_MEM_COMPACT_LEVEL {
                if self.overlap_in_level(icmp, level + 1, Some(smallest_user_key), Some(largest_user_key)) {
                    break;
                }
                if level + 2 < NUM_LEVELS {
                    let overlaps = self.get_overlapping_inputs(icmp, level + 2, Some(&start), Some(&limit));
                    if total_file_size(&overlaps) > MAX_GRAND_PARENT_OVERLAP_BYTES {
                        break;
                    }
                }
                level += 1;
            }
        }
        level
    }

    /// Every file in `level` overlapping `[begin, end]` (either bound
    /// `None` meaning unbounded), expanded the same way
    /// `GetOverlappingInputs` does for level 0: because level-0 files
    /// can themselves overlap each other, pulling in one file whose
    /// range is wider than originally requested can newly overlap
    /// another level-0 file, so the scan restarts from the top of the
    /// (widened) range until a pass adds nothing new.
    pub fn get_overlapping_inputs(
        &self,
        icmp: &InternalKeyComparator,
        level: usize,
        begin: Option<&InternalKey>,
        end: Option<&InternalKey>,
    ) -> Vec<Arc<FileMetaData>> {
        let ucmp = icmp.user_comparator();
        let mut user_begin = begin.map(|k| k.user_key().to_vec());
        let mut user_end = end.map(|k| k.user_key().to_vec());
        let mut inputs = Vec::new();

        let mut i = 0;
        while i < self.files[level].len() {
            let f = &self.files[level][i];
            i += 1;
            let file_start = f.smallest.user_key();
            let file_limit = f.largest.user_key();
            if let Some(b) = &user_begin {
                if ucmp.compare(file_limit, b) == Ordering::Less {
                    continue;
                }
            }
            if let Some(e) = &user_end {
                if ucmp.compare(file_start, e) == Ordering::Greater {
                    continue;
                }
            }

            inputs.push(f.clone());
            if level == 0 {
                let mut expanded = false;
                if let Some(b) = &user_begin {
                    if ucmp.compare(file_start, b) == Ordering::Less {
                        user_begin = Some(file_start.to_vec());
                        expanded = true;
                    }
                }
                if let Some(e) = &user_end {
                    if ucmp.compare(file_limit, e) == Ordering::Greater {
                        user_end = Some(file_limit.to_vec());
                        expanded = true;
                    }
                }
                if expanded {
                    inputs.clear();
                    i = 0;
                }
            }
        }
        inputs
    }

    fn update_stats(&self, file: Arc<FileMetaData>, level: usize) -> bool {
        let remaining = file.allowed_seeks.fetch_sub(1, AtomicOrdering::Relaxed) - 1;
        if remaining <= 0 {
            let mut slot = self.file_to_compact.lock().expect("file_to_compact mutex poisoned");
            if slot.is_none() {
                *slot = Some((file, level));
                return true;
            }
        }
        false
    }

    /// Records that a scan (forward or backward, via [`crate::db`]'s
    /// iterator) passed over `internal_key`. If a second file at a
    /// deeper level also covers this key, the first file examined
    /// takes a seek-compaction charge — a single file overlapping a
    /// key costs nothing, but a key resolvable from more than one file
    /// is exactly the read-amplification case leveled compaction
    /// exists to bound.
    pub fn record_read_sample(&self, icmp: &InternalKeyComparator, internal_key: &[u8]) -> bool {
        let Some(parsed) = parse_internal_key(internal_key) else {
            return false;
        };
        let mut matches = 0;
        let mut last: Option<(Arc<FileMetaData>, usize)> = None;

        'levels: for level in 0..NUM_LEVELS {
            let count = self.files[level].len();
            if count == 0 {
                continue;
            }
            if level == 0 {
                for f in &self.files[level] {
                    if icmp.user_comparator().compare(parsed.user_key, f.smallest.user_key()) != Ordering::Less
                        && icmp.user_comparator().compare(parsed.user_key, f.largest.user_key()) != Ordering::Greater
                    {
                        matches += 1;
                        if matches == 1 {
                            last = Some((f.clone(), level));
                        } else {
                            break 'levels;
                        }
                    }
                }
            } else {
                let idx = find_file(icmp, &self.files[level], internal_key);
                if idx < count {
                    let f = &self.files[level][idx];
                    if icmp.user_comparator().compare(parsed.user_key, f.smallest.user_key()) != Ordering::Less {
                        matches += 1;
                        if matches == 1 {
                            last = Some((f.clone(), level));
                        } else {
                            break 'levels;
                        }
                    }
                }
            }
        }

        if matches >= 2 {
            if let Some((file, level)) = last {
                return self.update_stats(file, level);
            }
        }
        false
    }

    /// The MVCC-correct point lookup: probes level 0 newest-file-first,
    /// then each level 1..N's single overlapping candidate, stopping at
    /// the first result that isn't `NotFound`. Mirrors the classic
    /// `Saver`/`Version::Get` shape — level 0's files aren't sorted
    /// relative to each other, so every overlapping one must be tried
    /// in recency order, while levels 1+ are disjoint and sorted, so a
    /// binary search finds the single file that could possibly contain
    /// the key.
    pub fn get(
        &self,
        table_cache: &TableCache,
        icmp: &InternalKeyComparator,
        lookup: &LookupKey,
    ) -> Result<VersionGetResult, VersionError> {
        // Only the very first file actually consulted earns a seek
        // charge, no matter how many more are tried afterward — trying
        // a second file at all is the signal that the first one is
        // costing reads it shouldn't, not every subsequent miss.
        let mut last_file_read: Option<(Arc<FileMetaData>, usize)> = None;
        let mut seek_charge: Option<(Arc<FileMetaData>, usize)> = None;
        let mut result = VersionGetResult::NotFound;

        'search: for level in 0..NUM_LEVELS {
            if self.files[level].is_empty() {
                continue;
            }

            let mut candidates: Vec<&Arc<FileMetaData>> = Vec::new();
            if level == 0 {
                for f in &self.files[level] {
                    if icmp.user_comparator().compare(lookup.user_key(), f.smallest.user_key()) != Ordering::Less
                        && icmp.user_comparator().compare(lookup.user_key(), f.largest.user_key()) != Ordering::Greater
                    {
                        candidates.push(f);
                    }
                }
                candidates.sort_by(|a, b| b.number.cmp(&a.number));
            } else {
                let idx = find_file(icmp, &self.files[level], lookup.internal_key());
                if idx < self.files[level].len() {
                    let f = &self.files[level][idx];
                    if icmp.user_comparator().compare(lookup.user_key(), f.smallest.user_key()) != Ordering::Less {
                        candidates.push(f);
                    }
                }
            }

            for f in candidates {
                if let Some(prev) = last_file_read.take() {
                    if seek_charge.is_none() {
                        seek_charge = Some(prev);
                    }
                }
                last_file_read = Some((f.clone(), level));

                match table_cache.get(f.number, f.file_size, lookup)? {
                    TableGetResult::Found(value) => {
                        result = VersionGetResult::Found(value);
                        break 'search;
                    }
                    TableGetResult::Deleted => {
                        result = VersionGetResult::Deleted;
                        break 'search;
                    }
                    TableGetResult::NotFound => continue,
                }
            }
        }

        if let Some((file, level)) = seek_charge {
            self.update_stats(file, level);
        }
        Ok(result)
    }

    /// A concatenating iterator over every file in `level`: for level
    /// 0 this only makes sense file-by-file (callers add one iterator
    /// per L0 file instead), but every level 1+ is internally
    /// non-overlapping and sorted, so its files can be treated as one
    /// long logical run via [`TwoLevelIterator`].
    pub fn new_concatenating_iterator<'a>(
        &self,
        icmp: Arc<InternalKeyComparator>,
        table_cache: &'a TableCache,
        level: usize,
    ) -> TwoLevelIterator<'a> {
        concatenating_iterator_over_files(icmp, table_cache, self.files[level].clone())
    }

    /// One iterator per L0 file plus one concatenating iterator per
    /// level above it, the set [`crate::db`] merges alongside the
    /// memtable iterators to serve a full-database scan.
    pub fn add_iterators<'a>(&self, icmp: &Arc<InternalKeyComparator>, table_cache: &'a TableCache) -> Vec<Box<dyn Iter + 'a>> {
        let mut iters: Vec<Box<dyn Iter + 'a>> = Vec::new();
        for f in &self.files[0] {
            if let Ok(it) = table_cache.iter(f.number, f.file_size) {
                iters.push(Box::new(it));
            }
        }
        for level in 1..NUM_LEVELS {
            if !self.files[level].is_empty() {
                iters.push(Box::new(self.new_concatenating_iterator(icmp.clone(), table_cache, level)));
            }
        }
        iters
    }
}

/// Builds a [`TwoLevelIterator`] that walks `files` in order, opening
/// each one through `table_cache` on demand. `files` must already be
/// internally non-overlapping and sorted (every level 1+ within a
/// `Version`, and a [`Compaction`]'s own input lists) — callers with
/// level-0's possibly-overlapping files add one iterator per file
/// instead of using this.
pub fn concatenating_iterator_over_files<'a>(
    icmp: Arc<InternalKeyComparator>,
    table_cache: &'a TableCache,
    files: Vec<Arc<FileMetaData>>,
) -> TwoLevelIterator<'a> {
    let outer = Box::new(FileListIter::new(files, icmp));
    let block_function: crate::iterator::BlockFunction<'a> = Box::new(move |value: &[u8]| {
        let (number, file_size) = decode_file_handle(value);
        match table_cache.iter(number, file_size) {
            Ok(it) => Box::new(it) as Box<dyn Iter + 'a>,
            Err(e) => {
                warn!(error = %e, number, "version: failed to open table for concatenating iterator");
                Box::new(crate::iterator::EmptyIter) as Box<dyn Iter + 'a>
            }
        }
    });
    TwoLevelIterator::new(outer, block_function)
}

/// 16-byte `{file_number: u64 LE}{file_size: u64 LE}` handle, the value
/// [`FileListIter`] hands to a [`crate::iterator::BlockFunction`] for
/// it to open the actual file.
fn decode_file_handle(value: &[u8]) -> (u64, u64) {
    let number = u64::from_le_bytes(value[0..8].try_into().expect("file handle value is 16 bytes"));
    let file_size = u64::from_le_bytes(value[8..16].try_into().expect("file handle value is 16 bytes"));
    (number, file_size)
}

/// The outer iterator of a level's concatenating iterator: walks a
/// sorted file list, `key()` = the file's largest internal key,
/// `value()` = the 16-byte handle [`decode_file_handle`] reads back.
struct FileListIter {
    files: Vec<Arc<FileMetaData>>,
    icmp: Arc<InternalKeyComparator>,
    index: Option<usize>,
    value_buf: [u8; 16],
}

impl FileListIter {
    fn new(files: Vec<Arc<FileMetaData>>, icmp: Arc<InternalKeyComparator>) -> Self {
        FileListIter {
            files,
            icmp,
            index: None,
            value_buf: [0u8; 16],
        }
    }

    fn refresh_value(&mut self) {
        if let Some(i) = self.index {
            if i < self.files.len() {
                let f = &self.files[i];
                self.value_buf[0..8].copy_from_slice(&f.number.to_le_bytes());
                self.value_buf[8..16].copy_from_slice(&f.file_size.to_le_bytes());
            }
        }
    }
}

impl Iter for FileListIter {
    fn valid(&self) -> bool {
        self.index.is_some_and(|i| i < self.files.len())
    }

    fn seek_to_first(&mut self) {
        self.index = if self.files.is_empty() { None } else { Some(0) };
        self.refresh_value();
    }

    fn seek_to_last(&mut self) {
        self.index = if self.files.is_empty() { None } else { Some(self.files.len() - 1) };
        self.refresh_value();
    }

    fn seek(&mut self, target: &[u8]) {
        let pos = self.files.partition_point(|f| self.icmp.compare(f.largest.as_bytes(), target) == Ordering::Less);
        self.index = Some(pos);
        self.refresh_value();
    }

    fn next(&mut self) {
        let i = self.index.expect("next on invalid iterator");
        self.index = Some(i + 1);
        self.refresh_value();
    }

    fn prev(&mut self) {
        let i = self.index.expect("prev on invalid iterator");
        if i == 0 {
            self.index = Some(self.files.len());
        } else {
            self.index = Some(i - 1);
        }
        self.refresh_value();
    }

    fn key(&self) -> &[u8] {
        self.files[self.index.expect("key on invalid iterator")].largest.as_bytes()
    }

    fn value(&self) -> &[u8] {
        &self.value_buf
    }
}

fn finalize(version: &mut Version) {
    let mut best_level = 0usize;
    let mut best_score = -1.0f64;

    for level in 0..NUM_LEVELS - 1 {
        let score = if level == 0 {
            version.files[0].len() as f64 / L0_COMPACTION_TRIGGER as f64
        } else {
            total_file_size(&version.files[level]) as f64 / max_bytes_for_level(level)
        };
        if score > best_score {
            best_score = score;
            best_level = level;
        }
    }

    version.compaction_level = best_level;
    version.compaction_score = best_score;
}

// ---------------------------------------------------------------------------
// Compaction
// ---------------------------------------------------------------------------

/// A planned merge of `inputs[0]` (the compacting level) with
/// `inputs[1]` (the overlapping files one level down), plus enough
/// bookkeeping to execute and then install it.
pub struct Compaction {
    pub level: usize,
    pub inputs: [Vec<Arc<FileMetaData>>; 2],
    pub grandparents: Vec<Arc<FileMetaData>>,
    pub is_manual: bool,
    /// The new per-level compaction pointer this compaction's
    /// completion edit should record, so the next size-triggered pick
    /// at this level picks up where this one left off instead of
    /// starting from the front every time.
    pub next_compact_pointer: Option<InternalKey>,
    grandparent_index: usize,
    seen_key: bool,
    overlapped_bytes: u64,
    level_ptrs: [usize; NUM_LEVELS],
}

impl Compaction {
    fn new(level: usize) -> Self {
        Compaction {
            level,
            inputs: [Vec::new(), Vec::new()],
            grandparents: Vec::new(),
            is_manual: false,
            next_compact_pointer: None,
            grandparent_index: 0,
            seen_key: false,
            overlapped_bytes: 0,
            level_ptrs: [0; NUM_LEVELS],
        }
    }

    pub fn num_input_files(&self, which: usize) -> usize {
        self.inputs[which].len()
    }

    pub fn input(&self, which: usize, i: usize) -> &Arc<FileMetaData> {
        &self.inputs[which][i]
    }

    /// A single level-L file with no level-L+1 overlap and low
    /// grandparent overlap can just be relinked to level L+1 instead of
    /// rewritten.
    pub fn is_trivial_move(&self) -> bool {
        self.inputs[0].len() == 1
            && self.inputs[1].is_empty()
            && total_file_size(&self.grandparents) <= MAX_GRAND_PARENT_OVERLAP_BYTES
    }

    pub fn add_input_deletions(&self, edit: &mut VersionEdit) {
        for which in 0..2 {
            for f in &self.inputs[which] {
                edit.delete_file(self.level + which, f.number);
            }
        }
    }

    /// True if no level below `level+1` holds `user_key`, meaning a
    /// tombstone for it can be dropped outright instead of carried
    /// forward. Assumes callers probe keys in increasing order within
    /// one compaction, so the per-level scan position in `level_ptrs`
    /// only ever needs to move forward.
    pub fn is_base_level_for_key(&mut self, version: &Version, icmp: &InternalKeyComparator, user_key: &[u8]) -> bool {
        let ucmp = icmp.user_comparator();
        for level in (self.level + 2)..NUM_LEVELS {
            let files = &version.files[level];
            while self.level_ptrs[level] < files.len() {
                let f = &files[self.level_ptrs[level]];
                if ucmp.compare(user_key, f.largest.user_key()) != Ordering::Greater {
                    if ucmp.compare(user_key, f.smallest.user_key()) != Ordering::Less {
                        return false;
                    }
                    break;
                }
                self.level_ptrs[level] += 1;
            }
        }
        true
    }

    /// True once accumulated grandparent overlap since the last output
    /// file crosses [`MAX_GRAND_PARENT_OVERLAP_BYTES`] — the signal to
    /// roll to a new output file mid-merge rather than let one output
    /// file's future re-compaction read unboundedly much grandparent
    /// data.
    pub fn should_stop_before(&mut self, icmp: &InternalKeyComparator, internal_key: &[u8]) -> bool {
        while self.grandparent_index < self.grandparents.len()
            && icmp.compare(internal_key, self.grandparents[self.grandparent_index].largest.as_bytes()) == Ordering::Greater
        {
            if self.seen_key {
                self.overlapped_bytes += self.grandparents[self.grandparent_index].file_size;
            }
            self.grandparent_index += 1;
        }
        self.seen_key = true;

        if self.overlapped_bytes > MAX_GRAND_PARENT_OVERLAP_BYTES {
            self.overlapped_bytes = 0;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Builder: folds a VersionEdit onto a base Version
// ---------------------------------------------------------------------------

struct LevelState {
    deleted_files: std::collections::HashSet<u64>,
    added_files: Vec<Arc<FileMetaData>>,
}

struct Builder<'a> {
    icmp: &'a InternalKeyComparator,
    base: &'a Version,
    levels: [LevelState; NUM_LEVELS],
}

impl<'a> Builder<'a> {
    fn new(icmp: &'a InternalKeyComparator, base: &'a Version) -> Self {
        Builder {
            icmp,
            base,
            levels: std::array::from_fn(|_| LevelState {
                deleted_files: std::collections::HashSet::new(),
                added_files: Vec::new(),
            }),
        }
    }

    fn apply(&mut self, edit: &VersionEdit) {
        for (level, number) in &edit.deleted_files {
            self.levels[*level].deleted_files.insert(*number);
        }
        for (level, file) in &edit.new_files {
            // Files live for a while before their first compaction; give
            // them a couple of extra seeks' grace so a cold new file
            // doesn't immediately eat a seek-compaction charge.
            file.allowed_seeks.store((file.file_size / 16384).max(100) as i64, AtomicOrdering::Relaxed);
            self.levels[*level].deleted_files.remove(&file.number);
            self.levels[*level].added_files.push(file.clone());
        }
    }

    /// Merges the base version's surviving files with this edit's
    /// additions, level by level, keeping each level's files sorted (by
    /// internal key for 1+, by file number for level 0, mirroring
    /// classic LevelDB's `NewestFirstBySeqNo`-agnostic level-0 ordering
    /// convention of "sorted however they were added").
    fn save_to(self) -> Version {
        let mut out = Version::empty();
        for level in 0..NUM_LEVELS {
            let mut added = self.levels[level].added_files.clone();
            added.sort_by(|a, b| self.icmp.compare(a.smallest.as_bytes(), b.smallest.as_bytes()));

            let mut merged = Vec::with_capacity(self.base.files[level].len() + added.len());
            let mut base_iter = self.base.files[level].iter().peekable();
            let mut added_iter = added.into_iter().peekable();

            loop {
                match (base_iter.peek(), added_iter.peek()) {
                    (Some(b), Some(a)) => {
                        if self.icmp.compare(b.smallest.as_bytes(), a.smallest.as_bytes()) == Ordering::Less {
                            let b = base_iter.next().unwrap();
                            if !self.levels[level].deleted_files.contains(&b.number) {
                                merged.push(b.clone());
                            }
                        } else {
                            merged.push(added_iter.next().unwrap());
                        }
                    }
                    (Some(_), None) => {
                        let b = base_iter.next().unwrap();
                        if !self.levels[level].deleted_files.contains(&b.number) {
                            merged.push(b.clone());
                        }
                    }
                    (None, Some(_)) => {
                        merged.push(added_iter.next().unwrap());
                    }
                    (None, None) => break,
                }
            }
            out.files[level] = merged;
        }
        finalize(&mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// VersionSet
// ---------------------------------------------------------------------------

/// The database's durable metadata authority: the current `Version`,
/// the file-number/sequence-number counters that span its whole
/// lifetime, and the MANIFEST log that makes all of it crash-durable.
///
/// Not internally locked — exactly one DB-wide mutex (owned by
/// [`crate::db`]) serializes every call here, matching the rest of
/// this engine's single-writer concurrency model.
pub struct VersionSet {
    db_path: std::path::PathBuf,
    icmp: Arc<InternalKeyComparator>,
    current: Arc<Version>,
    next_file_number: u64,
    manifest_file_number: u64,
    last_sequence: SequenceNumber,
    log_number: u64,
    prev_log_number: u64,
    compact_pointer: [Option<InternalKey>; NUM_LEVELS],
    descriptor_log: Option<wal::Writer>,
}

impl VersionSet {
    pub fn new(db_path: std::path::PathBuf, icmp: Arc<InternalKeyComparator>) -> Self {
        let mut empty = Version::empty();
        finalize(&mut empty);
        VersionSet {
            db_path,
            icmp,
            current: Arc::new(empty),
            next_file_number: 2,
            manifest_file_number: 0,
            last_sequence: 0,
            log_number: 0,
            prev_log_number: 0,
            compact_pointer: std::array::from_fn(|_| None),
            descriptor_log: None,
        }
    }

    pub fn current(&self) -> Arc<Version> {
        self.current.clone()
    }

    pub fn icmp(&self) -> &Arc<InternalKeyComparator> {
        &self.icmp
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn new_file_number(&mut self) -> u64 {
        let n = self.next_file_number;
        self.next_file_number += 1;
        n
    }

    /// Gives back a file number that turned out unused (e.g. a log
    /// file whose creation failed), but only if it's the very last one
    /// handed out — otherwise some other, later number may already
    /// reference it indirectly, so it's simplest and safest to just
    /// let it go unused forever.
    pub fn reuse_file_number(&mut self, file_number: u64) {
        if self.next_file_number == file_number + 1 {
            self.next_file_number = file_number;
        }
    }

    pub fn mark_file_number_used(&mut self, number: u64) {
        if self.next_file_number <= number {
            self.next_file_number = number + 1;
        }
    }

    pub fn manifest_file_number(&self) -> u64 {
        self.manifest_file_number
    }

    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence
    }

    pub fn set_last_sequence(&mut self, seq: SequenceNumber) {
        debug_assert!(seq >= self.last_sequence);
        self.last_sequence = seq;
    }

    pub fn log_number(&self) -> u64 {
        self.log_number
    }

    pub fn prev_log_number(&self) -> u64 {
        self.prev_log_number
    }

    pub fn num_level_files(&self, level: usize) -> usize {
        self.current.num_files(level)
    }

    pub fn needs_compaction(&self) -> bool {
        self.current.compaction_score() >= 1.0 || self.current.file_to_compact().is_some()
    }

    fn write_snapshot(&self, log: &mut wal::Writer) -> Result<(), VersionError> {
        let mut edit = VersionEdit::new();
        edit.comparator = Some(self.icmp.user_comparator().name().to_string());
        for (level, pointer) in self.compact_pointer.iter().enumerate() {
            if let Some(key) = pointer {
                edit.set_compact_pointer(level, key.clone());
            }
        }
        for level in 0..NUM_LEVELS {
            for f in &self.current.files[level] {
                edit.new_files.push((level, f.clone()));
            }
        }
        let mut buf = Vec::new();
        edit.encode_to(&mut buf);
        log.add_record(&buf)?;
        Ok(())
    }

    /// Folds `edit` onto the current version, persists it to the
    /// MANIFEST, and swaps it in as `self.current`. Creates a brand new
    /// MANIFEST file (and points `CURRENT` at it) the first time this
    /// is called; every subsequent call just appends one record to the
    /// existing descriptor log.
    pub fn log_and_apply(&mut self, mut edit: VersionEdit) -> Result<(), VersionError> {
        if edit.log_number.is_none() {
            edit.log_number = Some(self.log_number);
        }
        if edit.prev_log_number.is_none() {
            edit.prev_log_number = Some(self.prev_log_number);
        }
        edit.next_file_number = Some(self.next_file_number);
        edit.last_sequence = Some(self.last_sequence);

        for (level, pointer) in &edit.compact_pointers {
            self.compact_pointer[*level] = Some(pointer.clone());
        }

        let mut builder = Builder::new(&self.icmp, &self.current);
        builder.apply(&edit);
        let new_version = builder.save_to();

        let mut created_manifest = false;
        if self.descriptor_log.is_none() {
            self.manifest_file_number = self.new_file_number();
            let path = crate::filename::descriptor_file_name(&self.db_path, self.manifest_file_number);
            let mut log = wal::Writer::create(&path)?;
            self.write_snapshot(&mut log)?;
            self.descriptor_log = Some(log);
            created_manifest = true;
        }

        let append_result = {
            let mut buf = Vec::new();
            edit.encode_to(&mut buf);
            self.descriptor_log.as_mut().expect("just created or already open").add_record(&buf)
        };

        if let Err(e) = append_result {
            warn!(error = %e, "version_set: failed to append edit to MANIFEST");
            if created_manifest {
                self.descriptor_log = None;
                let _ = std::fs::remove_file(crate::filename::descriptor_file_name(&self.db_path, self.manifest_file_number));
            }
            return Err(e.into());
        }

        if created_manifest {
            manifest::set_current_file(&self.db_path, self.manifest_file_number)?;
        }

        self.log_number = edit.log_number.unwrap();
        self.prev_log_number = edit.prev_log_number.unwrap();
        self.current = Arc::new(new_version);
        info!(
            log_number = self.log_number,
            manifest_file_number = self.manifest_file_number,
            "version_set: installed new version"
        );
        Ok(())
    }

    /// Rebuilds `self.current` and every counter by replaying the
    /// active MANIFEST (found via `CURRENT`) from the beginning. Called
    /// once, at `DB::open`.
    pub fn recover(&mut self) -> Result<(), VersionError> {
        let manifest_path = manifest::current_manifest_path(&self.db_path)?;
        let records = wal::read_all(&manifest_path, false)?;

        let mut builder = Builder::new(&self.icmp, &self.current);
        let mut have_log_number = false;
        let mut have_prev_log_number = false;
        let mut have_next_file_number = false;
        let mut have_last_sequence = false;
        let mut log_number = 0u64;
        let mut prev_log_number = 0u64;
        let mut next_file_number = 0u64;
        let mut last_sequence = 0u64;

        for record in &records {
            let edit = VersionEdit::decode_from(record)?;
            if let Some(name) = &edit.comparator {
                if name != self.icmp.user_comparator().name() {
                    return Err(VersionError::ComparatorMismatch {
                        expected: self.icmp.user_comparator().name().to_string(),
                        found: name.clone(),
                    });
                }
            }
            if let Some(n) = edit.log_number {
                log_number = n;
                have_log_number = true;
            }
            if let Some(n) = edit.prev_log_number {
                prev_log_number = n;
                have_prev_log_number = true;
            }
            if let Some(n) = edit.next_file_number {
                next_file_number = n;
                have_next_file_number = true;
            }
            if let Some(s) = edit.last_sequence {
                last_sequence = s;
                have_last_sequence = true;
            }
            for (level, pointer) in &edit.compact_pointers {
                self.compact_pointer[*level] = Some(pointer.clone());
            }
            builder.apply(&edit);
        }

        if !have_next_file_number {
            return Err(VersionError::Corruption("MANIFEST has no NextFileNumber".into()));
        }
        if !have_log_number {
            return Err(VersionError::Corruption("MANIFEST has no LogNumber".into()));
        }
        if !have_last_sequence {
            return Err(VersionError::Corruption("MANIFEST has no LastSequence".into()));
        }
        if !have_prev_log_number {
            prev_log_number = 0;
        }

        self.mark_file_number_used(log_number);
        self.mark_file_number_used(prev_log_number);

        let new_version = builder.save_to();
        for level in 0..NUM_LEVELS {
            for f in &new_version.files[level] {
                self.mark_file_number_used(f.number);
            }
        }

        self.next_file_number = next_file_number.max(self.next_file_number);
        self.last_sequence = last_sequence;
        self.log_number = log_number;
        self.prev_log_number = prev_log_number;
        self.current = Arc::new(new_version);

        let manifest_number = manifest_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| crate::filename::parse_file_name(n))
            .map(|(_, number)| number)
            .unwrap_or(0);
        self.manifest_file_number = manifest_number;
        self.mark_file_number_used(manifest_number);

        debug!(
            log_number = self.log_number,
            last_sequence = self.last_sequence,
            next_file_number = self.next_file_number,
            "version_set: recovered"
        );
        Ok(())
    }

    /// The compaction the background worker should run next, following
    /// whichever of the two triggers fired: a level whose size/count
    /// score is >= 1.0, or a file that exhausted its seek budget.
    /// Size-triggered compactions win ties, matching the reference
    /// design's preference order.
    pub fn pick_compaction(&self) -> Option<Compaction> {
        let size_triggered = self.current.compaction_score() >= 1.0;
        let level = self.current.compaction_level();

        let mut c = if size_triggered {
            let mut c = Compaction::new(level);
            let files = &self.current.files[level];
            let start_file = match &self.compact_pointer[level] {
                Some(pointer) => {
                    let idx = files.partition_point(|f| self.icmp.compare(f.largest.as_bytes(), pointer.as_bytes()) == Ordering::Less);
                    if idx < files.len() { idx } else { 0 }
                }
                None => 0,
            };
            c.inputs[0].push(files[start_file].clone());
            c
        } else if let Some((file, level)) = self.current.file_to_compact() {
            let mut c = Compaction::new(level);
            c.inputs[0].push(file);
            c
        } else {
            return None;
        };

        if c.level == 0 {
            let (smallest, largest) = key_range(&self.icmp, &c.inputs[0]);
            c.inputs[0] = self.current.get_overlapping_inputs(&self.icmp, 0, Some(&smallest), Some(&largest));
            debug_assert!(!c.inputs[0].is_empty());
        }

        self.setup_other_inputs(&mut c);
        Some(c)
    }

    /// Builds a compaction covering every file in `level` that
    /// overlaps `[begin, end]`, for an explicit range compaction
    /// request rather than one `pick_compaction` chose automatically.
    pub fn compact_range(&self, level: usize, begin: Option<&InternalKey>, end: Option<&InternalKey>) -> Option<Compaction> {
        let mut inputs = self.current.get_overlapping_inputs(&self.icmp, level, begin, end);
        if inputs.is_empty() {
            return None;
        }

        // A manual compaction caps how much level-0 input it pulls in
        // per call, the same way a size-triggered one does, so one
        // call can't attempt to rewrite an unbounded amount of data.
        if level > 0 {
            let mut total = 0u64;
            for (i, f) in inputs.iter().enumerate() {
                total += f.file_size;
                if total >= EXPANDED_COMPACTION_BYTE_SIZE_LIMIT {
                    inputs.truncate(i + 1);
                    break;
                }
            }
        }

        let mut c = Compaction::new(level);
        c.inputs[0] = inputs;
        c.is_manual = true;
        self.setup_other_inputs(&mut c);
        Some(c)
    }

    /// Fills in `inputs[1]` (the overlapping level+1 files), tries to
    /// expand `inputs[0]` further without pulling in a new level+1
    /// file, and records the grandparent (level+2) file list used for
    /// `should_stop_before`'s output-rollover decision.
    fn setup_other_inputs(&self, c: &mut Compaction) {
        let (mut smallest, mut largest) = key_range(&self.icmp, &c.inputs[0]);

        c.inputs[1] = self.current.get_overlapping_inputs(&self.icmp, c.level + 1, Some(&smallest), Some(&largest));

        let (all_start, all_limit) = key_range(&self.icmp, &[c.inputs[0].clone(), c.inputs[1].clone()].concat());

        if !c.inputs[1].is_empty() {
            let expanded0 = self.current.get_overlapping_inputs(&self.icmp, c.level, Some(&all_start), Some(&all_limit));
            if expanded0.len() > c.inputs[0].len() {
                let expanded0_size = total_file_size(&expanded0);
                let inputs1_size = total_file_size(&c.inputs[1]);
                if expanded0_size + inputs1_size < EXPANDED_COMPACTION_BYTE_SIZE_LIMIT {
                    let (new_start, new_limit) = key_range(&self.icmp, &expanded0);
                    let expanded1 = self
                        .current
                        .get_overlapping_inputs(&self.icmp, c.level + 1, Some(&new_start), Some(&new_limit));
                    if expanded1.len() == c.inputs[1].len() {
                        info!(
                            level = c.level,
                            old_files = c.inputs[0].len(),
                            new_files = expanded0.len(),
                            "version_set: expanded compaction input set"
                        );
                        smallest = new_start;
                        largest = new_limit;
                        c.inputs[0] = expanded0;
                        c.inputs[1] = expanded1;
                    }
                }
            }
        }

        if c.level + 2 < NUM_LEVELS {
            let (all_start, all_limit) = key_range(&self.icmp, &[c.inputs[0].clone(), c.inputs[1].clone()].concat());
            let _ = &smallest;
            c.grandparents = self
                .current
                .get_overlapping_inputs(&self.icmp, c.level + 2, Some(&all_start), Some(&all_limit));
        }

        c.next_compact_pointer = Some(largest);
    }
}

fn key_range(icmp: &InternalKeyComparator, files: &[Arc<FileMetaData>]) -> (InternalKey, InternalKey) {
    debug_assert!(!files.is_empty());
    let mut smallest = files[0].smallest.as_bytes().to_vec();
    let mut largest = files[0].largest.as_bytes().to_vec();
    for f in &files[1..] {
        if icmp.compare(f.smallest.as_bytes(), &smallest) == Ordering::Less {
            smallest = f.smallest.as_bytes().to_vec();
        }
        if icmp.compare(f.largest.as_bytes(), &largest) == Ordering::Greater {
            largest = f.largest.as_bytes().to_vec();
        }
    }
    (InternalKey::from_encoded(smallest), InternalKey::from_encoded(largest))
}

/// Loads the active manifest's comparator name without a full recover,
/// used by `DB::open` to fail fast before attempting a mismatched
/// recovery.
pub fn peek_comparator_name(db_path: &Path) -> Result<Option<String>, VersionError> {
    let manifest_path = match manifest::current_manifest_path(db_path) {
        Ok(p) => p,
        Err(_) => return Ok(None),
    };
    let records = wal::read_all(&manifest_path, false)?;
    for record in &records {
        let edit = VersionEdit::decode_from(record)?;
        if let Some(name) = edit.comparator {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

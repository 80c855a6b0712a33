//! # Memtable Module
//!
//! The mutable, in-memory write buffer sitting in front of the WAL and
//! the on-disk levels. Internally a [`crate::skiplist::SkipList`] over
//! arena-allocated entries, ordered by [`crate::dbformat::InternalKeyComparator`]
//! so that, for a given user key, the newest write always sorts first.
//!
//! ## Design Invariants
//!
//! - Every entry durably exists in the WAL before it is visible here.
//! - A key may have many versions; `Get` resolves to the first entry at
//!   or before the requested sequence number.
//! - Deletes are tombstones (`ValueType::Deletion`), never physical
//!   removal — removal only happens when a later compaction drops the
//!   tombstone once no live snapshot can observe it.
//! - Reads never block writes and vice versa: the skip list's
//!   concurrency contract (see [`crate::skiplist`]) is what the memtable
//!   rests on; the only lock here serializes concurrent writers, not
//!   writers against readers.

#[cfg(test)]
mod tests;

use crate::arena::Arena;
use crate::comparator::Comparator;
use crate::dbformat::{
    InternalKeyComparator, LookupKey, SequenceNumber, ValueType, extract_user_key,
    pack_sequence_and_type, parse_internal_key,
};
use crate::encoding::{get_varint32, put_length_prefixed_slice, put_varint32};
use crate::skiplist::{KeyComparator, SkipList};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// An entry as stored in the skip list: `internal_key_size(varint32) ++
/// internal_key ++ value_size(varint32) ++ value`. This is the classic
/// memtable wire format — packing key and value into one contiguous
/// arena allocation means a single skip-list node gets a single
/// allocation rather than two, and the memtable's own comparator only
/// ever touches the internal-key span.
pub type MemTableEntry = Vec<u8>;

fn encode_entry(internal_key: &[u8], value: &[u8]) -> MemTableEntry {
    let mut buf = Vec::with_capacity(5 + internal_key.len() + 5 + value.len());
    put_varint32(&mut buf, internal_key.len() as u32);
    buf.extend_from_slice(internal_key);
    put_length_prefixed_slice(&mut buf, value);
    buf
}

fn decode_internal_key(entry: &[u8]) -> &[u8] {
    let (klen, consumed) = get_varint32(entry).expect("well-formed memtable entry");
    &entry[consumed..consumed + klen as usize]
}

fn decode_value(entry: &[u8]) -> &[u8] {
    let (klen, consumed) = get_varint32(entry).expect("well-formed memtable entry");
    let after_key = &entry[consumed + klen as usize..];
    let (vlen, vconsumed) = get_varint32(after_key).expect("well-formed memtable entry");
    &after_key[vconsumed..vconsumed + vlen as usize]
}

struct MemTableKeyComparator {
    internal: InternalKeyComparator,
}

impl KeyComparator<MemTableEntry> for MemTableKeyComparator {
    fn compare_keys(&self, a: &MemTableEntry, b: &MemTableEntry) -> Ordering {
        self.internal.compare(decode_internal_key(a), decode_internal_key(b))
    }
}

/// Outcome of a point lookup against a single memtable.
pub enum MemTableLookup {
    /// The newest visible entry at or before the requested sequence is a
    /// live value.
    Found(Vec<u8>),
    /// The newest visible entry at or before the requested sequence is a
    /// tombstone.
    Deleted,
    /// No entry for this user key exists in this memtable at all.
    NotFound,
}

/// A skip-list-backed, append-only table of internal-key-ordered
/// entries. One is active at a time per database (accepting writes);
/// older ones become immutable and queue for flush to an SST while the
/// next one takes over writes.
pub struct MemTable {
    arena: Box<Arena>,
    table: SkipList<MemTableEntry, MemTableKeyComparator>,
    memory_usage: AtomicUsize,
}

impl MemTable {
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        let mut arena = Box::new(Arena::new());
        let arena_ptr: *mut Arena = &mut *arena;
        let comparator = MemTableKeyComparator {
            internal: InternalKeyComparator::new(user_comparator),
        };
        MemTable {
            arena,
            table: SkipList::new(comparator, arena_ptr),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Adds `(key, seq, type, value)` as a new entry. Never overwrites:
    /// every call creates a fresh skip-list node, relying on internal-key
    /// ordering (sequence descending) to make the newest entry the one
    /// `get` and iteration see first.
    pub fn add(&self, seq: SequenceNumber, value_type: ValueType, key: &[u8], value: &[u8]) {
        let tag = pack_sequence_and_type(seq, value_type);
        let mut internal_key = Vec::with_capacity(key.len() + 8);
        internal_key.extend_from_slice(key);
        internal_key.extend_from_slice(&tag.to_le_bytes());

        let entry = encode_entry(&internal_key, value);
        self.memory_usage.fetch_add(entry.len(), AtomicOrdering::Relaxed);
        self.table.insert(entry);
    }

    /// Looks up `key.user_key()` as of `key.internal_key()`'s embedded
    /// sequence number. The caller (usually [`crate::db`]) probes the
    /// active memtable, then the immutable one, then each level in turn,
    /// stopping at the first `Found`/`Deleted` result.
    pub fn get(&self, key: &LookupKey) -> MemTableLookup {
        let probe = encode_entry(key.internal_key(), b"");
        let mut it = self.table.iter();
        it.seek(&probe);
        if !it.valid() {
            return MemTableLookup::NotFound;
        }
        let entry_internal_key = decode_internal_key(it.key());
        let Some(parsed) = parse_internal_key(entry_internal_key) else {
            return MemTableLookup::NotFound;
        };
        if parsed.user_key != key.user_key() {
            return MemTableLookup::NotFound;
        }
        match parsed.value_type {
            ValueType::Value => MemTableLookup::Found(decode_value(it.key()).to_vec()),
            ValueType::Deletion => MemTableLookup::Deleted,
        }
    }

    /// Approximate bytes of encoded entries held by this memtable, used
    /// to decide when to freeze the active memtable and start a new one.
    /// Tracked separately from `arena.memory_usage()`, which only counts
    /// skip-list node overhead: entries themselves are heap-allocated
    /// `Vec`s, so the arena total alone would undercount every value
    /// payload.
    pub fn approximate_memory_usage(&self) -> usize {
        self.memory_usage.load(AtomicOrdering::Relaxed)
    }

    /// A bidirectional cursor over internal keys in ascending order
    /// (i.e. per user key, newest-first). Composed into the merging
    /// iterator alongside immutable-memtable and SST iterators to serve
    /// `Get` and range scans.
    pub fn iter(&self) -> MemTableIterator<'_> {
        MemTableIterator { inner: self.table.iter() }
    }

    /// Like [`MemTable::iter`], but keeps its own `Arc` clone alive
    /// instead of borrowing `self`, so it can be composed into
    /// [`crate::db::iterator::DBIterator`]'s whole-database merging
    /// iterator after the state lock that handed out the memtable has
    /// already been released.
    pub fn iter_owned(self: &Arc<Self>) -> OwnedMemTableIterator {
        let mem = self.clone();
        // SAFETY: `inner` borrows `mem`'s skip list for `'static`, but
        // `mem` is kept alongside it for exactly as long as this struct
        // exists, so the borrow is valid for the iterator's real
        // lifetime regardless of what the type says.
        let inner: MemTableIterator<'static> = unsafe { std::mem::transmute(mem.iter()) };
        OwnedMemTableIterator { inner, _mem: mem }
    }
}

/// Iterates a memtable's entries as internal keys paired with values.
pub struct MemTableIterator<'a> {
    inner: crate::skiplist::SkipListIter<'a, MemTableEntry, MemTableKeyComparator>,
}

impl<'a> MemTableIterator<'a> {
    pub fn valid(&self) -> bool {
        self.inner.valid()
    }

    pub fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    pub fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    /// Positions at the first entry whose internal key is >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.inner.seek(&encode_entry(target, b""));
    }

    pub fn next(&mut self) {
        self.inner.next();
    }

    pub fn prev(&mut self) {
        self.inner.prev();
    }

    pub fn key(&self) -> &[u8] {
        decode_internal_key(self.inner.key())
    }

    pub fn value(&self) -> &[u8] {
        decode_value(self.inner.key())
    }
}

impl crate::iterator::Iter for MemTableIterator<'_> {
    fn valid(&self) -> bool {
        MemTableIterator::valid(self)
    }

    fn seek_to_first(&mut self) {
        MemTableIterator::seek_to_first(self)
    }

    fn seek_to_last(&mut self) {
        MemTableIterator::seek_to_last(self)
    }

    fn seek(&mut self, target: &[u8]) {
        MemTableIterator::seek(self, target)
    }

    fn next(&mut self) {
        MemTableIterator::next(self)
    }

    fn prev(&mut self) {
        MemTableIterator::prev(self)
    }

    fn key(&self) -> &[u8] {
        MemTableIterator::key(self)
    }

    fn value(&self) -> &[u8] {
        MemTableIterator::value(self)
    }
}

/// An [`Iter`](crate::iterator::Iter) over a memtable that owns an
/// `Arc` clone of it rather than borrowing, so it has no lifetime tied
/// to the caller. Needed wherever a scan's iterators must outlive the
/// lock that handed out the memtable in the first place.
pub struct OwnedMemTableIterator {
    inner: MemTableIterator<'static>,
    _mem: Arc<MemTable>,
}

impl crate::iterator::Iter for OwnedMemTableIterator {
    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn prev(&mut self) {
        self.inner.prev();
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }
}

/// Drops the user-key portion of an internal key pair, used by tests and
/// by scan-path callers that only want the raw user key back.
pub fn user_key_of(internal_key: &[u8]) -> &[u8] {
    extract_user_key(internal_key)
}

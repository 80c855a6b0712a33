//! The user-facing cursor returned by [`super::DB::new_iterator`]:
//! wraps a [`MergingIterator`] over internal keys (active memtable,
//! immutable memtable, and every level) and presents only live user
//! keys and values, transparently skipping deletions, superseded
//! versions, and anything written after the iterator's snapshot
//! sequence.

use crate::comparator::Comparator;
use crate::dbformat::{InternalKeyComparator, LookupKey, SequenceNumber, ValueType, extract_user_key, parse_internal_key};
use crate::iterator::{Iter, MergingIterator};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// A bidirectional cursor over the whole database as of a fixed
/// sequence number. Forward iteration reads straight through the
/// merged child iterators; reverse iteration has to buffer the
/// current entry (`saved_key`/`saved_value`) because the merge's
/// child iterators may hold several stale versions of the same user
/// key behind the one actually visible.
pub struct DBIterator<'a> {
    icmp: Arc<InternalKeyComparator>,
    iter: MergingIterator<'a>,
    sequence: SequenceNumber,
    direction: Direction,
    valid: bool,
    saved_key: Vec<u8>,
    saved_value: Vec<u8>,
}

impl<'a> DBIterator<'a> {
    pub(crate) fn new(icmp: Arc<InternalKeyComparator>, iter: MergingIterator<'a>, sequence: SequenceNumber) -> Self {
        DBIterator {
            icmp,
            iter,
            sequence,
            direction: Direction::Forward,
            valid: false,
            saved_key: Vec::new(),
            saved_value: Vec::new(),
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn key(&self) -> &[u8] {
        assert!(self.valid, "key() called on an invalid iterator");
        match self.direction {
            Direction::Forward => extract_user_key(self.iter.key()),
            Direction::Reverse => &self.saved_key,
        }
    }

    pub fn value(&self) -> &[u8] {
        assert!(self.valid, "value() called on an invalid iterator");
        match self.direction {
            Direction::Forward => self.iter.value(),
            Direction::Reverse => &self.saved_value,
        }
    }

    pub fn seek_to_first(&mut self) {
        self.direction = Direction::Forward;
        self.saved_key.clear();
        self.saved_value.clear();
        self.iter.seek_to_first();
        if self.iter.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    pub fn seek_to_last(&mut self) {
        self.direction = Direction::Reverse;
        self.saved_key.clear();
        self.saved_value.clear();
        self.iter.seek_to_last();
        self.find_prev_user_entry();
    }

    /// Positions at the first entry whose user key is >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.direction = Direction::Forward;
        self.saved_key.clear();
        self.saved_value.clear();
        let lookup = LookupKey::new(target, self.sequence);
        self.iter.seek(lookup.internal_key());
        if self.iter.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    pub fn next(&mut self) {
        assert!(self.valid, "next() called on an invalid iterator");
        if self.direction == Direction::Reverse {
            // Switching directions: the child iterator sits just
            // before this key's run of entries, so advance into it
            // first and fall through to the usual forward skip.
            self.direction = Direction::Forward;
            if !self.iter.valid() {
                self.iter.seek_to_first();
            } else {
                self.iter.next();
            }
            if !self.iter.valid() {
                self.valid = false;
                self.saved_key.clear();
                return;
            }
        } else {
            self.saved_key = extract_user_key(self.iter.key()).to_vec();
        }
        self.find_next_user_entry(true);
    }

    pub fn prev(&mut self) {
        assert!(self.valid, "prev() called on an invalid iterator");
        if self.direction == Direction::Forward {
            // Switching directions: scan backward past every entry for
            // the current user key so the reverse scan starts clean of
            // it, then hand off to the usual backward skip.
            self.saved_key = extract_user_key(self.iter.key()).to_vec();
            loop {
                self.iter.prev();
                if !self.iter.valid() {
                    self.valid = false;
                    self.saved_key.clear();
                    self.saved_value.clear();
                    return;
                }
                if self.user_compare(extract_user_key(self.iter.key()), &self.saved_key) == Ordering::Less {
                    break;
                }
            }
        }
        self.direction = Direction::Reverse;
        self.find_prev_user_entry();
    }

    fn user_compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.icmp.user_comparator().compare(a, b)
    }

    /// Scans forward until it lands on a live value visible at
    /// `self.sequence`, skipping every tombstone and every older
    /// version of a key a tombstone or newer value already shadowed.
    /// `skipping` starts true when called from `next()` (the entry the
    /// iterator is already sitting on must itself be skipped).
    fn find_next_user_entry(&mut self, mut skipping: bool) {
        loop {
            if let Some(parsed) = parse_internal_key(self.iter.key()) {
                if parsed.sequence <= self.sequence {
                    match parsed.value_type {
                        ValueType::Deletion => {
                            self.saved_key = parsed.user_key.to_vec();
                            skipping = true;
                        }
                        ValueType::Value => {
                            if skipping && self.user_compare(parsed.user_key, &self.saved_key) != Ordering::Greater {
                                // Shadowed by the tombstone/newer version just recorded.
                            } else {
                                self.valid = true;
                                self.saved_key.clear();
                                return;
                            }
                        }
                    }
                }
            }
            self.iter.next();
            if !self.iter.valid() {
                break;
            }
        }
        self.saved_key.clear();
        self.valid = false;
    }

    /// Scans backward, buffering the newest not-yet-superseded entry
    /// seen so far into `saved_key`/`saved_value`, until it reaches an
    /// older user key — at which point the buffered entry is the
    /// answer — or runs out of input.
    fn find_prev_user_entry(&mut self) {
        let mut value_type = ValueType::Deletion;
        if self.iter.valid() {
            loop {
                if let Some(parsed) = parse_internal_key(self.iter.key()) {
                    if parsed.sequence <= self.sequence {
                        if value_type != ValueType::Deletion
                            && self.user_compare(parsed.user_key, &self.saved_key) == Ordering::Less
                        {
                            break;
                        }
                        value_type = parsed.value_type;
                        if value_type == ValueType::Deletion {
                            self.saved_key.clear();
                            self.saved_value.clear();
                        } else {
                            self.saved_key = parsed.user_key.to_vec();
                            self.saved_value = self.iter.value().to_vec();
                        }
                    }
                }
                self.iter.prev();
                if !self.iter.valid() {
                    break;
                }
            }
        }

        if value_type == ValueType::Deletion {
            self.valid = false;
            self.saved_key.clear();
            self.saved_value.clear();
            self.direction = Direction::Forward;
        } else {
            self.valid = true;
        }
    }
}

impl<'a> Iter for DBIterator<'a> {
    fn valid(&self) -> bool {
        DBIterator::valid(self)
    }

    fn seek_to_first(&mut self) {
        DBIterator::seek_to_first(self)
    }

    fn seek_to_last(&mut self) {
        DBIterator::seek_to_last(self)
    }

    fn seek(&mut self, target: &[u8]) {
        DBIterator::seek(self, target)
    }

    fn next(&mut self) {
        DBIterator::next(self)
    }

    fn prev(&mut self) {
        DBIterator::prev(self)
    }

    fn key(&self) -> &[u8] {
        DBIterator::key(self)
    }

    fn value(&self) -> &[u8] {
        DBIterator::value(self)
    }
}

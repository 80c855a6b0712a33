//! Composable cursor abstractions over ordered byte-string data:
//! [`Iter`] is the capability every positionable cursor in the read
//! path implements (memtables, blocks, tables, and the structures in
//! this module itself), [`MergingIterator`] fans a set of them out
//! into one ordered stream, and [`TwoLevelIterator`] builds an
//! iterator lazily from an outer iterator of opaque handles — the same
//! shape [`crate::sstable::table::TableIterator`] uses internally for
//! index→data, reused here so [`crate::version`] can concatenate
//! per-file iterators within a level without holding every file open
//! at once.

use crate::comparator::Comparator;
use std::sync::Arc;

/// The read cursor every composable iterator in this engine
/// implements. Mirrors the small set of operations the merging and
/// two-level iterators need: position at an end, seek, step, and read
/// the entry under the cursor.
pub trait Iter {
    fn valid(&self) -> bool;
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    fn seek(&mut self, target: &[u8]);
    fn next(&mut self);
    fn prev(&mut self);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Merges `n` already-sorted child iterators into a single ordered
/// stream. Children are expected to be ordered so that, among entries
/// comparing equal, an earlier child is the one whose value should
/// win — callers order children newest-first for that reason (e.g.
/// active memtable, then immutable memtable, then levels 0..N).
///
/// Switching scan direction is the subtle part: `Next`/`Prev` only
/// step the currently-selected child, so reversing direction first
/// re-seeks every *other* child to the current key and nudges it onto
/// the correct side, exactly as the single-writer reference design
/// does, before resuming the step.
pub struct MergingIterator<'a> {
    comparator: Arc<dyn Comparator>,
    children: Vec<Box<dyn Iter + 'a>>,
    current: Option<usize>,
    direction: Direction,
}

impl<'a> MergingIterator<'a> {
    pub fn new(comparator: Arc<dyn Comparator>, children: Vec<Box<dyn Iter + 'a>>) -> Self {
        MergingIterator {
            comparator,
            children,
            current: None,
            direction: Direction::Forward,
        }
    }

    fn find_smallest(&mut self) {
        let mut smallest: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.valid() {
                continue;
            }
            smallest = match smallest {
                None => Some(i),
                Some(s) if self.comparator.compare(child.key(), self.children[s].key()) == std::cmp::Ordering::Less => {
                    Some(i)
                }
                Some(s) => Some(s),
            };
        }
        self.current = smallest;
    }

    fn find_largest(&mut self) {
        let mut largest: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.valid() {
                continue;
            }
            largest = match largest {
                None => Some(i),
                Some(l) if self.comparator.compare(child.key(), self.children[l].key()) == std::cmp::Ordering::Greater => {
                    Some(i)
                }
                Some(l) => Some(l),
            };
        }
        self.current = largest;
    }
}

impl Iter for MergingIterator<'_> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        for child in self.children.iter_mut() {
            child.seek_to_first();
        }
        self.find_smallest();
        self.direction = Direction::Forward;
    }

    fn seek_to_last(&mut self) {
        for child in self.children.iter_mut() {
            child.seek_to_last();
        }
        self.find_largest();
        self.direction = Direction::Reverse;
    }

    fn seek(&mut self, target: &[u8]) {
        for child in self.children.iter_mut() {
            child.seek(target);
        }
        self.find_smallest();
        self.direction = Direction::Forward;
    }

    fn next(&mut self) {
        let current = self.current.expect("next on invalid iterator");

        if self.direction != Direction::Forward {
            // Every other child is currently positioned at or before
            // the key we just emitted (reverse-scan invariant); bring
            // each one forward past it so resuming forward emits the
            // next distinct key, not a repeat.
            let key = self.children[current].key().to_vec();
            for i in 0..self.children.len() {
                if i == current {
                    continue;
                }
                let child = &mut self.children[i];
                child.seek(&key);
                if child.valid() && self.comparator.compare(child.key(), &key) == std::cmp::Ordering::Equal {
                    child.next();
                }
            }
            self.direction = Direction::Forward;
        }

        self.children[current].next();
        self.find_smallest();
    }

    fn prev(&mut self) {
        let current = self.current.expect("prev on invalid iterator");

        if self.direction != Direction::Reverse {
            let key = self.children[current].key().to_vec();
            for i in 0..self.children.len() {
                if i == current {
                    continue;
                }
                let child = &mut self.children[i];
                child.seek(&key);
                if child.valid() {
                    child.prev();
                } else {
                    child.seek_to_last();
                }
            }
            self.direction = Direction::Reverse;
        }

        self.children[current].prev();
        self.find_largest();
    }

    fn key(&self) -> &[u8] {
        self.children[self.current.expect("key on invalid iterator")].key()
    }

    fn value(&self) -> &[u8] {
        self.children[self.current.expect("value on invalid iterator")].value()
    }
}

/// Builds an inner iterator from the current outer entry, lazily and
/// on demand. Modeled on the reference design's `BlockFunction`: the
/// outer iterator's value is opaque (a block handle, a file metadata
/// blob, whatever the caller's encoding is) and this closure is the
/// only thing that knows how to turn it into a cursor.
pub type BlockFunction<'a> = Box<dyn Fn(&[u8]) -> Box<dyn Iter + 'a> + 'a>;

/// An iterator over an outer sequence of opaque handles, where each
/// handle expands (via [`BlockFunction`]) into its own inner iterator.
/// [`crate::sstable::table::TableIterator`] implements this same shape
/// ad hoc for index→data; this generic version is what
/// [`crate::version`] uses to concatenate the SST files within one
/// level, since a level's file list and an SST's index block are both,
/// structurally, "ordered handles that each expand into more entries".
pub struct TwoLevelIterator<'a> {
    outer: Box<dyn Iter + 'a>,
    block_function: BlockFunction<'a>,
    inner: Option<Box<dyn Iter + 'a>>,
}

impl<'a> TwoLevelIterator<'a> {
    pub fn new(outer: Box<dyn Iter + 'a>, block_function: BlockFunction<'a>) -> Self {
        TwoLevelIterator { outer, block_function, inner: None }
    }

    fn set_inner_for_current_outer(&mut self) {
        if !self.outer.valid() {
            self.inner = None;
            return;
        }
        self.inner = Some((self.block_function)(self.outer.value()));
    }

    fn skip_empty_inner_forward(&mut self) {
        while self.inner.as_ref().map(|it| !it.valid()).unwrap_or(true) {
            self.outer.next();
            if !self.outer.valid() {
                self.inner = None;
                return;
            }
            self.set_inner_for_current_outer();
            if let Some(it) = self.inner.as_mut() {
                it.seek_to_first();
            }
        }
    }

    fn skip_empty_inner_backward(&mut self) {
        while self.inner.as_ref().map(|it| !it.valid()).unwrap_or(true) {
            self.outer.prev();
            if !self.outer.valid() {
                self.inner = None;
                return;
            }
            self.set_inner_for_current_outer();
            if let Some(it) = self.inner.as_mut() {
                it.seek_to_last();
            }
        }
    }
}

impl Iter for TwoLevelIterator<'_> {
    fn valid(&self) -> bool {
        self.inner.as_ref().is_some_and(|it| it.valid())
    }

    fn seek_to_first(&mut self) {
        self.outer.seek_to_first();
        self.set_inner_for_current_outer();
        if let Some(it) = self.inner.as_mut() {
            it.seek_to_first();
        }
        self.skip_empty_inner_forward();
    }

    fn seek_to_last(&mut self) {
        self.outer.seek_to_last();
        self.set_inner_for_current_outer();
        if let Some(it) = self.inner.as_mut() {
            it.seek_to_last();
        }
        self.skip_empty_inner_backward();
    }

    fn seek(&mut self, target: &[u8]) {
        self.outer.seek(target);
        self.set_inner_for_current_outer();
        if let Some(it) = self.inner.as_mut() {
            it.seek(target);
        }
        self.skip_empty_inner_forward();
    }

    fn next(&mut self) {
        if let Some(it) = self.inner.as_mut() {
            it.next();
        }
        self.skip_empty_inner_forward();
    }

    fn prev(&mut self) {
        if let Some(it) = self.inner.as_mut() {
            it.prev();
        }
        self.skip_empty_inner_backward();
    }

    fn key(&self) -> &[u8] {
        self.inner.as_ref().expect("valid iterator").key()
    }

    fn value(&self) -> &[u8] {
        self.inner.as_ref().expect("valid iterator").value()
    }
}

/// An iterator with no entries, always invalid. Used as a fallback
/// child (e.g. when a `BlockFunction` fails to open the file it was
/// asked to expand) so a composing iterator can degrade to "this
/// source is empty" rather than propagate the error through every
/// `Iter` method.
pub struct EmptyIter;

impl Iter for EmptyIter {
    fn valid(&self) -> bool {
        false
    }
    fn seek_to_first(&mut self) {}
    fn seek_to_last(&mut self) {}
    fn seek(&mut self, _target: &[u8]) {}
    fn next(&mut self) {
        panic!("next on invalid iterator");
    }
    fn prev(&mut self) {
        panic!("prev on invalid iterator");
    }
    fn key(&self) -> &[u8] {
        panic!("key on invalid iterator");
    }
    fn value(&self) -> &[u8] {
        panic!("value on invalid iterator");
    }
}

#[cfg(test)]
mod tests;

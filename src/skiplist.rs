//! Lock-free-read, single-writer skip list backing [`crate::memtable::MemTable`].
//!
//! Readers never take a lock: they walk `next` pointers loaded with
//! `Acquire` ordering, which pairs with the `Release` store a writer
//! does after fully initializing a new node. That ordering is the entire
//! concurrency contract — a reader that observes a node at all observes
//! a fully-constructed one. Only one writer is permitted at a time
//! (enforced by the caller, normally a single `Mutex<()>` guarding
//! inserts); readers may run concurrently with that writer and with each
//! other.
//!
//! Nodes are allocated out of an [`Arena`] and never individually freed;
//! the whole structure is reclaimed when the arena (and the memtable
//! that owns it) is dropped.

use crate::arena::Arena;
use rand::Rng;
use std::cmp::Ordering;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering as AtomicOrdering};

const MAX_HEIGHT: usize = 12;
const BRANCHING: u32 = 4;

/// Three-way ordering over keys stored in the skip list. Kept separate
/// from [`crate::comparator::Comparator`] (which orders raw byte
/// slices) so the skip list can be instantiated over whatever key
/// representation the memtable chooses, while internally a
/// `Vec<u8>`-keyed list wrapping an `InternalKeyComparator` is the only
/// instantiation in use.
pub trait KeyComparator<K>: Send + Sync {
    fn compare_keys(&self, a: &K, b: &K) -> Ordering;
}

struct Node<K> {
    /// `None` only for the list's head sentinel, which is never
    /// compared against and whose key is never read.
    key: Option<K>,
    height: usize,
    /// Arena-allocated array of `height` atomic forward pointers, index
    /// 0 is the bottom (densest) level.
    next: *mut AtomicPtr<Node<K>>,
}

impl<K> Node<K> {
    fn key(&self) -> &K {
        self.key.as_ref().expect("head sentinel key read")
    }
}

impl<K> Node<K> {
    fn next(&self, level: usize) -> *mut Node<K> {
        debug_assert!(level < self.height);
        unsafe { (*self.next.add(level)).load(AtomicOrdering::Acquire) }
    }

    fn set_next(&self, level: usize, node: *mut Node<K>) {
        debug_assert!(level < self.height);
        unsafe {
            (*self.next.add(level)).store(node, AtomicOrdering::Release);
        }
    }

    fn no_barrier_next(&self, level: usize) -> *mut Node<K> {
        debug_assert!(level < self.height);
        unsafe { (*self.next.add(level)).load(AtomicOrdering::Relaxed) }
    }

    fn no_barrier_set_next(&self, level: usize, node: *mut Node<K>) {
        debug_assert!(level < self.height);
        unsafe {
            (*self.next.add(level)).store(node, AtomicOrdering::Relaxed);
        }
    }
}

/// An intrusive, arena-backed skip list ordered by `C::compare_keys`.
///
/// `K` must be `Clone` because [`SkipList::iter`] hands out owned copies
/// of stored keys rather than borrowing into the arena (the arena's
/// lifetime is tied to the memtable, not to any individual iterator).
pub struct SkipList<K, C> {
    comparator: C,
    arena: *mut Arena,
    head: *mut Node<K>,
    max_height: AtomicUsize,
}

// Safety: mirrors Arena's contract — single writer, many concurrent
// readers, synchronized via the Acquire/Release pointer protocol above.
unsafe impl<K: Send, C: Send> Send for SkipList<K, C> {}
unsafe impl<K: Sync, C: Sync> Sync for SkipList<K, C> {}

impl<K, C: KeyComparator<K>> SkipList<K, C> {
    /// Builds an empty list. `arena` must outlive the list; callers
    /// typically own both inside the same struct (see `MemTable`).
    pub fn new(comparator: C, arena: *mut Arena) -> Self {
        let head = Self::new_node_raw(arena, MAX_HEIGHT, None);
        SkipList {
            comparator,
            arena,
            head,
            max_height: AtomicUsize::new(1),
        }
    }

    fn new_node_raw(arena: *mut Arena, height: usize, key: Option<K>) -> *mut Node<K> {
        unsafe {
            let arena_ref = &mut *arena;
            let node_ptr = arena_ref.allocate_aligned(mem::size_of::<Node<K>>()) as *mut Node<K>;
            let next_ptr = arena_ref
                .allocate_aligned(height * mem::size_of::<AtomicPtr<Node<K>>>())
                as *mut AtomicPtr<Node<K>>;
            for i in 0..height {
                ptr::write(next_ptr.add(i), AtomicPtr::new(ptr::null_mut()));
            }
            ptr::write(
                node_ptr,
                Node {
                    key,
                    height,
                    next: next_ptr,
                },
            );
            node_ptr
        }
    }

    fn random_height() -> usize {
        let mut height = 1;
        let mut rng = rand::rng();
        while height < MAX_HEIGHT && rng.random_ratio(1, BRANCHING) {
            height += 1;
        }
        height
    }

    fn get_max_height(&self) -> usize {
        self.max_height.load(AtomicOrdering::Relaxed)
    }

    fn key_is_after_node(&self, key: &K, n: *mut Node<K>) -> bool {
        if n.is_null() {
            return false;
        }
        let node = unsafe { &*n };
        self.comparator.compare_keys(node.key(), key) == Ordering::Less
    }

    /// Returns the last node with key < `key` at level 0, recording in
    /// `prev` (if non-null) the predecessor at each level — the standard
    /// skip-list search used both for lookups and to splice in a new
    /// node.
    fn find_greater_or_equal(&self, key: &K, mut prev: Option<&mut [*mut Node<K>; MAX_HEIGHT]>) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.get_max_height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(p) = prev.as_deref_mut() {
                    p[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    fn find_less_than(&self, key: &K) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.get_max_height() - 1;
        loop {
            debug_assert!(x == self.head || unsafe { self.comparator.compare_keys((*x).key(), key) } == Ordering::Less);
            let next = unsafe { (*x).next(level) };
            if !next.is_null() && unsafe { self.comparator.compare_keys((*next).key(), key) } == Ordering::Less {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }

    fn find_last(&self) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.get_max_height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if !next.is_null() {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }

    /// Inserts `key`. The caller must ensure no concurrent `insert` call
    /// is in flight and, per the list's ordering, that `key` does not
    /// already compare equal to an existing entry (duplicate user keys
    /// are distinguished upstream by sequence number, so true equality
    /// here would indicate a bug).
    pub fn insert(&self, key: K) {
        let mut prev: [*mut Node<K>; MAX_HEIGHT] = [self.head; MAX_HEIGHT];
        let x = self.find_greater_or_equal(&key, Some(&mut prev));
        debug_assert!(x.is_null() || self.comparator.compare_keys(unsafe { (*x).key() }, &key) != Ordering::Equal);

        let height = Self::random_height();
        if height > self.get_max_height() {
            for slot in prev.iter_mut().take(height).skip(self.get_max_height()) {
                *slot = self.head;
            }
            self.max_height.store(height, AtomicOrdering::Relaxed);
        }

        let new_node = unsafe {
            let arena_ref = &mut *self.arena;
            let node_ptr = arena_ref.allocate_aligned(mem::size_of::<Node<K>>()) as *mut Node<K>;
            let next_ptr = arena_ref
                .allocate_aligned(height * mem::size_of::<AtomicPtr<Node<K>>>())
                as *mut AtomicPtr<Node<K>>;
            for i in 0..height {
                ptr::write(next_ptr.add(i), AtomicPtr::new(ptr::null_mut()));
            }
            ptr::write(
                node_ptr,
                Node {
                    key: Some(key),
                    height,
                    next: next_ptr,
                },
            );
            node_ptr
        };

        for level in 0..height {
            unsafe {
                (*new_node).no_barrier_set_next(level, (*prev[level]).no_barrier_next(level));
                (*prev[level]).set_next(level, new_node);
            }
        }
    }

    /// Returns `true` if an entry comparing equal to `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        let x = self.find_greater_or_equal(key, None);
        !x.is_null() && unsafe { self.comparator.compare_keys((*x).key(), key) } == Ordering::Equal
    }

    /// A forward-only cursor over the list, positioned with `seek*` and
    /// advanced with `next`. Mirrors the table/block iterators in
    /// [`crate::iterator`] but is kept distinct since the skip list has
    /// no `prev` pointers at the node level — `seek_to_last` has to
    /// re-walk from the head.
    pub fn iter(&self) -> SkipListIter<'_, K, C> {
        SkipListIter {
            list: self,
            node: ptr::null_mut(),
        }
    }
}

impl<K, C> Drop for SkipList<K, C> {
    fn drop(&mut self) {
        // Nodes' backing bytes live in the arena and are reclaimed when
        // it is dropped; here we only need to run each stored `K`'s own
        // Drop so keys with heap allocations (e.g. `Vec<u8>`) don't leak.
        // The head sentinel holds `None` and needs no drop glue beyond
        // what dropping an `Option<K>` already does.
        let mut x = unsafe { (*self.head).next(0) };
        unsafe {
            ptr::drop_in_place(&mut (*self.head).key);
        }
        while !x.is_null() {
            let next = unsafe { (*x).next(0) };
            unsafe {
                ptr::drop_in_place(&mut (*x).key);
            }
            x = next;
        }
    }
}

/// A snapshot-free forward iterator. Valid only while no insert races
/// with it from another thread; concurrent inserts that happen-before
/// the positioning `seek` are visible, later ones may or may not be.
pub struct SkipListIter<'a, K, C> {
    list: &'a SkipList<K, C>,
    node: *mut Node<K>,
}

impl<'a, K, C: KeyComparator<K>> SkipListIter<'a, K, C> {
    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }

    pub fn key(&self) -> &K {
        debug_assert!(self.valid());
        unsafe { (*self.node).key() }
    }

    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.node = unsafe { (*self.node).next(0) };
    }

    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        let key = unsafe { (*self.node).key() } as *const K;
        let pred = self.list.find_less_than(unsafe { &*key });
        self.node = if pred == self.list.head { ptr::null_mut() } else { pred };
    }

    pub fn seek(&mut self, target: &K) {
        self.node = self.list.find_greater_or_equal(target, None);
    }

    pub fn seek_to_first(&mut self) {
        self.node = unsafe { (*self.list.head).next(0) };
    }

    pub fn seek_to_last(&mut self) {
        let last = self.list.find_last();
        self.node = if last == self.list.head { ptr::null_mut() } else { last };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct U64Cmp;
    impl KeyComparator<u64> for U64Cmp {
        fn compare_keys(&self, a: &u64, b: &u64) -> Ordering {
            a.cmp(b)
        }
    }

    fn new_list() -> (Box<Arena>, SkipList<u64, U64Cmp>) {
        let mut arena = Box::new(Arena::new());
        let arena_ptr: *mut Arena = &mut *arena;
        let list = SkipList::new(U64Cmp, arena_ptr);
        (arena, list)
    }

    #[test]
    fn insert_and_contains() {
        let (_arena, list) = new_list();
        for i in (0..2000u64).step_by(3) {
            list.insert(i);
        }
        for i in (0..2000u64).step_by(3) {
            assert!(list.contains(&i));
        }
        assert!(!list.contains(&1));
    }

    #[test]
    fn iterates_in_sorted_order() {
        let (_arena, list) = new_list();
        let mut expected: BTreeSet<u64> = BTreeSet::new();
        for i in [500u64, 10, 2000, 1, 999, 42] {
            list.insert(i);
            expected.insert(i);
        }
        let mut it = list.iter();
        it.seek_to_first();
        let mut seen = Vec::new();
        while it.valid() {
            seen.push(*it.key());
            it.next();
        }
        let expected: Vec<u64> = expected.into_iter().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn seek_to_last_and_prev_walk_backwards() {
        let (_arena, list) = new_list();
        for i in 0..100u64 {
            list.insert(i);
        }
        let mut it = list.iter();
        it.seek_to_last();
        assert_eq!(*it.key(), 99);
        it.prev();
        assert_eq!(*it.key(), 98);
    }

    #[test]
    fn seek_positions_at_first_key_greater_or_equal() {
        let (_arena, list) = new_list();
        for i in (0..100u64).step_by(2) {
            list.insert(i);
        }
        let mut it = list.iter();
        it.seek(&51);
        assert!(it.valid());
        assert_eq!(*it.key(), 52);
    }
}

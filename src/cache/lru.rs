//! A sharded LRU cache of reference-counted handles, keyed by opaque
//! byte strings.
//!
//! Mirrors the on-disk engine's classic design: a hash table plus an
//! intrusive recency list per shard, 16 shards selected by the high
//! bits of the key's hash so that concurrent access from different
//! keys rarely contends on the same mutex. Unlike the handle-based C
//! original, callers here get back a cloned `Arc<V>` rather than a
//! pinned handle that must be explicitly released — Rust's own
//! reference counting already does that bookkeeping, so eviction only
//! ever drops the cache's own `Arc`, never a value a caller is still
//! holding.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const NUM_SHARD_BITS: u32 = 4;
const NUM_SHARDS: usize = 1 << NUM_SHARD_BITS;

/// A slot in a shard's entry table. `prev`/`next` are indices into the
/// same shard's `entries` vec, forming a circular doubly-linked list
/// anchored at the shard's sentinel (index `0`, which never holds a
/// value).
struct Slot<V> {
    key: Vec<u8>,
    value: Option<V>,
    charge: usize,
    prev: usize,
    next: usize,
}

struct Shard<V> {
    capacity: usize,
    usage: usize,
    index: HashMap<Vec<u8>, usize>,
    entries: Vec<Slot<V>>,
    free: Vec<usize>,
}

const SENTINEL: usize = 0;

impl<V> Shard<V> {
    fn new(capacity: usize) -> Self {
        let sentinel = Slot {
            key: Vec::new(),
            value: None,
            charge: 0,
            prev: SENTINEL,
            next: SENTINEL,
        };
        Shard {
            capacity,
            usage: 0,
            index: HashMap::new(),
            entries: vec![sentinel],
            free: Vec::new(),
        }
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.entries[i].prev, self.entries[i].next);
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    /// Splices `i` in just before the sentinel, making it the
    /// most-recently-used entry.
    fn push_front(&mut self, i: usize) {
        let old_front = self.entries[SENTINEL].next;
        self.entries[i].prev = SENTINEL;
        self.entries[i].next = old_front;
        self.entries[old_front].prev = i;
        self.entries[SENTINEL].next = i;
    }

    fn touch(&mut self, i: usize) {
        self.unlink(i);
        self.push_front(i);
    }

    fn evict_one(&mut self) -> Option<(Vec<u8>, V)> {
        let lru = self.entries[SENTINEL].prev;
        if lru == SENTINEL {
            return None;
        }
        self.unlink(lru);
        self.index.remove(&self.entries[lru].key);
        self.usage -= self.entries[lru].charge;
        let slot = &mut self.entries[lru];
        let key = std::mem::take(&mut slot.key);
        let value = slot.value.take().expect("live slot always holds a value");
        self.free.push(lru);
        Some((key, value))
    }

    fn insert(&mut self, key: Vec<u8>, value: V, charge: usize) {
        if let Some(&i) = self.index.get(&key) {
            self.usage -= self.entries[i].charge;
            self.usage += charge;
            self.entries[i].value = Some(value);
            self.entries[i].charge = charge;
            self.touch(i);
        } else {
            let slot = Slot {
                key: key.clone(),
                value: Some(value),
                charge,
                prev: SENTINEL,
                next: SENTINEL,
            };
            let i = if let Some(free) = self.free.pop() {
                self.entries[free] = slot;
                free
            } else {
                self.entries.push(slot);
                self.entries.len() - 1
            };
            self.index.insert(key, i);
            self.push_front(i);
            self.usage += charge;
        }
        while self.usage > self.capacity {
            if self.evict_one().is_none() {
                break;
            }
        }
    }

    fn erase(&mut self, key: &[u8]) {
        if let Some(i) = self.index.remove(key) {
            self.unlink(i);
            self.usage -= self.entries[i].charge;
            self.entries[i].value = None;
            self.free.push(i);
        }
    }
}

impl<V: Clone> Shard<V> {
    fn lookup(&mut self, key: &[u8]) -> Option<V> {
        let i = *self.index.get(key)?;
        self.touch(i);
        self.entries[i].value.clone()
    }
}

fn shard_index(key: &[u8]) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish() as u32;
    (hash >> (32 - NUM_SHARD_BITS)) as usize
}

/// A sharded, charge-aware LRU cache. `V` is typically an `Arc<T>` so
/// that cloning out of the cache is cheap and eviction never has to
/// synchronously drop a large value while a shard lock is held longer
/// than necessary.
pub struct Cache<V> {
    shards: Vec<Mutex<Shard<V>>>,
}

impl<V: Clone> Cache<V> {
    /// `capacity` is the total charge budget across all shards, split
    /// evenly (rounded up) the way the reference design divides it.
    pub fn with_capacity(capacity: usize) -> Self {
        let per_shard = capacity.div_ceil(NUM_SHARDS);
        let shards = (0..NUM_SHARDS).map(|_| Mutex::new(Shard::new(per_shard))).collect();
        Cache { shards }
    }

    pub fn insert(&self, key: &[u8], value: V, charge: usize) {
        let shard = &self.shards[shard_index(key)];
        shard.lock().unwrap().insert(key.to_vec(), value, charge);
    }

    pub fn get(&self, key: &[u8]) -> Option<V> {
        let shard = &self.shards[shard_index(key)];
        shard.lock().unwrap().lookup(key)
    }

    pub fn erase(&self, key: &[u8]) {
        let shard = &self.shards[shard_index(key)];
        shard.lock().unwrap().erase(key);
    }

    /// Sum of every shard's resident charge, for diagnostics.
    pub fn total_charge(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().usage).sum()
    }
}

//! Restart-prefix-compressed data and index blocks.
//!
//! Within a block, keys are added in increasing order and each entry
//! stores only the bytes that differ from the previous key (a shared
//! prefix length plus the unshared suffix). Every `restart_interval`
//! entries a full key is written again — a "restart point" — so a
//! binary search over the restart array can jump into the middle of a
//! block without replaying prefix compression from the start.
//!
//! # Entry format
//!
//! ```text
//! [shared_bytes: varint32][unshared_bytes: varint32][value_len: varint32]
//! [key_delta: unshared_bytes][value: value_len bytes]
//! ```
//!
//! followed, at the end of the block, by the restart point offsets
//! (`u32` each) and a trailing `u32` count of restarts.

use crate::comparator::Comparator;
use crate::encoding::{get_varint32, put_varint32};
use std::sync::Arc;

pub const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Builds one block's worth of restart-compressed entries.
pub struct BlockBuilder {
    restart_interval: usize,
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    last_key: Vec<u8>,
    finished: bool,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize) -> Self {
        BlockBuilder {
            restart_interval,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            finished: false,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
        self.finished = false;
    }

    pub fn empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// Appends `(key, value)`. Keys must be added in strictly increasing
    /// order per the block's comparator; callers (the table builder)
    /// are responsible for that invariant.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished);
        assert!(self.counter <= self.restart_interval);

        let shared = if self.counter < self.restart_interval {
            let min_len = self.last_key.len().min(key.len());
            let mut n = 0;
            while n < min_len && self.last_key[n] == key[n] {
                n += 1;
            }
            n
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };

        let unshared = key.len() - shared;
        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, unshared as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
    }

    /// Finalizes the block, appending the restart array and count, and
    /// returns the complete (trailer-free) block contents.
    pub fn finish(mut self) -> Vec<u8> {
        for &restart in &self.restarts {
            self.buffer.extend_from_slice(&restart.to_le_bytes());
        }
        self.buffer
            .extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        self.finished = true;
        self.buffer
    }
}

/// A parsed, read-only block: raw bytes plus the restart array's
/// location, ready to be iterated.
pub struct Block {
    data: Arc<[u8]>,
    restart_offset: usize,
    num_restarts: usize,
}

impl Block {
    /// `data` must be the block's contents without its 5-byte trailer.
    pub fn new(data: Arc<[u8]>) -> Self {
        let size = data.len();
        assert!(size >= 4, "block too small to contain a restart count");
        let num_restarts = u32::from_le_bytes(data[size - 4..].try_into().unwrap()) as usize;
        let restart_offset = size - 4 - num_restarts * 4;
        assert!(restart_offset <= size - 4);
        Block {
            data,
            restart_offset,
            num_restarts,
        }
    }

    fn restart_point(&self, index: usize) -> u32 {
        let off = self.restart_offset + index * 4;
        u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap())
    }

    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIterator {
        BlockIterator {
            data: self.data.clone(),
            restart_offset: self.restart_offset,
            num_restarts: self.num_restarts,
            comparator,
            current: self.restart_offset,
            entry_offset: self.restart_offset,
            restart_index: self.num_restarts,
            key: Vec::new(),
            value_range: 0..0,
            valid: false,
        }
    }
}

fn decode_entry(data: &[u8], offset: usize) -> Option<(usize, usize, usize, usize)> {
    let (shared, n1) = get_varint32(&data[offset..]).ok()?;
    let (unshared, n2) = get_varint32(&data[offset + n1..]).ok()?;
    let (value_len, n3) = get_varint32(&data[offset + n1 + n2..]).ok()?;
    let header_len = n1 + n2 + n3;
    Some((shared as usize, unshared as usize, value_len as usize, header_len))
}

/// A cursor over a [`Block`]'s entries, supporting binary-searched seeks
/// via the restart array.
pub struct BlockIterator {
    data: Arc<[u8]>,
    restart_offset: usize,
    num_restarts: usize,
    comparator: Arc<dyn Comparator>,
    current: usize,
    /// Start offset of the entry `key`/`value` currently refer to, so
    /// `prev` can find the restart point strictly before it.
    entry_offset: usize,
    restart_index: usize,
    key: Vec<u8>,
    value_range: std::ops::Range<usize>,
    valid: bool,
}

impl BlockIterator {
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn key(&self) -> &[u8] {
        debug_assert!(self.valid);
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        debug_assert!(self.valid);
        &self.data[self.value_range.clone()]
    }

    fn restart_point_offset(&self, index: usize) -> u32 {
        let off = self.restart_offset + index * 4;
        u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap())
    }

    fn parse_next_entry(&mut self) -> bool {
        if self.current >= self.restart_offset {
            self.valid = false;
            return false;
        }
        let entry_start = self.current;
        let Some((shared, unshared, value_len, header_len)) = decode_entry(&self.data, self.current) else {
            self.valid = false;
            return false;
        };
        self.entry_offset = entry_start;
        self.key.truncate(shared);
        let key_start = self.current + header_len;
        self.key.extend_from_slice(&self.data[key_start..key_start + unshared]);
        let value_start = key_start + unshared;
        self.value_range = value_start..value_start + value_len;
        self.current = value_start + value_len;

        while self.restart_index + 1 < self.num_restarts
            && self.restart_point_offset(self.restart_index + 1) as usize <= self.current.saturating_sub(1)
        {
            self.restart_index += 1;
        }
        self.valid = true;
        true
    }

    pub fn seek_to_first(&mut self) {
        if self.num_restarts == 0 {
            self.valid = false;
            return;
        }
        self.seek_to_restart_point(0);
        self.parse_next_entry();
    }

    fn seek_to_restart_point(&mut self, index: usize) {
        self.key.clear();
        self.restart_index = index;
        self.current = self.restart_point_offset(index) as usize;
    }

    pub fn next(&mut self) {
        self.parse_next_entry();
    }

    /// Scans backward restart-by-restart to the entry immediately
    /// before the current one, re-parsing forward from the chosen
    /// restart point since shared-prefix compression means an entry
    /// can't be decoded without its restart anchor.
    pub fn prev(&mut self) {
        debug_assert!(self.valid);
        let original = self.entry_offset;

        while self.restart_point_offset(self.restart_index) as usize >= original {
            if self.restart_index == 0 {
                // No entry precedes this one.
                self.current = self.restart_offset;
                self.restart_index = self.num_restarts;
                self.valid = false;
                return;
            }
            self.restart_index -= 1;
        }

        self.seek_to_restart_point(self.restart_index);
        loop {
            if !self.parse_next_entry() {
                break;
            }
            if self.current >= original {
                break;
            }
        }
    }

    pub fn seek_to_last(&mut self) {
        if self.num_restarts == 0 {
            self.valid = false;
            return;
        }
        self.seek_to_restart_point(self.num_restarts - 1);
        while self.parse_next_entry() && self.current < self.restart_offset {
            // Keep consuming entries in the final restart segment until
            // there's nothing left, landing on the last one.
        }
    }

    /// Binary-searches the restart array for the last restart point
    /// whose key is <= `target`, then scans forward from there.
    pub fn seek(&mut self, target: &[u8]) {
        if self.num_restarts == 0 {
            self.valid = false;
            return;
        }
        let mut left = 0usize;
        let mut right = self.num_restarts.saturating_sub(1);
        while left < right {
            let mid = left + (right - left + 1) / 2;
            let offset = self.restart_point_offset(mid) as usize;
            let Some((_, unshared, _, header_len)) = decode_entry(&self.data, offset) else {
                right = mid - 1;
                continue;
            };
            let key_start = offset + header_len;
            let mid_key = &self.data[key_start..key_start + unshared];
            if self.comparator.compare(mid_key, target) == std::cmp::Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_entry() {
                return;
            }
            if self.comparator.compare(&self.key, target) != std::cmp::Ordering::Less {
                return;
            }
        }
    }
}

impl crate::iterator::Iter for BlockIterator {
    fn valid(&self) -> bool {
        BlockIterator::valid(self)
    }

    fn seek_to_first(&mut self) {
        BlockIterator::seek_to_first(self)
    }

    fn seek_to_last(&mut self) {
        BlockIterator::seek_to_last(self)
    }

    fn seek(&mut self, target: &[u8]) {
        BlockIterator::seek(self, target)
    }

    fn next(&mut self) {
        BlockIterator::next(self)
    }

    fn prev(&mut self) {
        BlockIterator::prev(self)
    }

    fn key(&self) -> &[u8] {
        BlockIterator::key(self)
    }

    fn value(&self) -> &[u8] {
        BlockIterator::value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::bytewise;

    fn build_block(entries: &[(&[u8], &[u8])], restart_interval: usize) -> Block {
        let mut builder = BlockBuilder::new(restart_interval);
        for (k, v) in entries {
            builder.add(k, v);
        }
        Block::new(builder.finish().into())
    }

    #[test]
    fn iterates_all_entries_in_order() {
        let entries: Vec<(&[u8], &[u8])> = vec![
            (b"apple", b"1"),
            (b"apricot", b"2"),
            (b"banana", b"3"),
            (b"cherry", b"4"),
        ];
        let block = build_block(&entries, 2);
        let mut it = block.iter(bytewise());
        it.seek_to_first();
        let mut seen = Vec::new();
        while it.valid() {
            seen.push((it.key().to_vec(), it.value().to_vec()));
            it.next();
        }
        let expected: Vec<(Vec<u8>, Vec<u8>)> =
            entries.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn seek_lands_on_first_key_greater_or_equal() {
        let entries: Vec<(&[u8], &[u8])> = vec![
            (b"a", b"1"),
            (b"c", b"2"),
            (b"e", b"3"),
            (b"g", b"4"),
            (b"i", b"5"),
        ];
        let block = build_block(&entries, 2);
        let mut it = block.iter(bytewise());
        it.seek(b"d");
        assert!(it.valid());
        assert_eq!(it.key(), b"e");
    }

    #[test]
    fn seek_past_end_is_invalid() {
        let entries: Vec<(&[u8], &[u8])> = vec![(b"a", b"1"), (b"b", b"2")];
        let block = build_block(&entries, 4);
        let mut it = block.iter(bytewise());
        it.seek(b"z");
        assert!(!it.valid());
    }

    #[test]
    fn single_restart_point_still_works() {
        let entries: Vec<(&[u8], &[u8])> = vec![(b"a", b"1"), (b"b", b"2"), (b"c", b"3")];
        let block = build_block(&entries, 1000);
        let mut it = block.iter(bytewise());
        it.seek(b"b");
        assert!(it.valid());
        assert_eq!(it.key(), b"b");
    }

    #[test]
    fn seek_to_last_lands_on_the_final_entry() {
        let entries: Vec<(&[u8], &[u8])> =
            vec![(b"apple", b"1"), (b"banana", b"2"), (b"cherry", b"3")];
        let block = build_block(&entries, 2);
        let mut it = block.iter(bytewise());
        it.seek_to_last();
        assert!(it.valid());
        assert_eq!(it.key(), b"cherry");
        assert_eq!(it.value(), b"3");
    }

    #[test]
    fn prev_walks_backward_across_restart_boundaries() {
        let entries: Vec<(&[u8], &[u8])> = vec![
            (b"apple", b"1"),
            (b"apricot", b"2"),
            (b"banana", b"3"),
            (b"cherry", b"4"),
        ];
        let block = build_block(&entries, 2);
        let mut it = block.iter(bytewise());
        it.seek_to_last();
        let mut seen = Vec::new();
        while it.valid() {
            seen.push(it.key().to_vec());
            it.prev();
        }
        let mut expected: Vec<Vec<u8>> = entries.iter().map(|(k, _)| k.to_vec()).collect();
        expected.reverse();
        assert_eq!(seen, expected);
    }

    #[test]
    fn prev_from_first_entry_becomes_invalid() {
        let entries: Vec<(&[u8], &[u8])> = vec![(b"a", b"1"), (b"b", b"2")];
        let block = build_block(&entries, 2);
        let mut it = block.iter(bytewise());
        it.seek_to_first();
        it.prev();
        assert!(!it.valid());
    }

    #[test]
    fn empty_block_yields_an_empty_iterator() {
        let block = build_block(&[], 16);
        let mut it = block.iter(bytewise());
        it.seek_to_first();
        assert!(!it.valid());
        it.seek_to_last();
        assert!(!it.valid());
        it.seek(b"anything");
        assert!(!it.valid());
    }
}

//! Per-SST filter block: a bloom filter computed separately for every
//! 2 KiB span of data-block offsets, so a point lookup only has to
//! evaluate the one filter covering the data block it's about to read
//! rather than a single filter for the whole file.

use crate::filter_policy::FilterPolicy;
use std::sync::Arc;

/// `2^BASE_LG` bytes of data per filter chunk (2 KiB).
const FILTER_BASE_LG: u32 = 11;
const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    keys: Vec<u8>,
    key_offsets: Vec<usize>,
    result: Vec<u8>,
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        FilterBlockBuilder {
            policy,
            keys: Vec::new(),
            key_offsets: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset / FILTER_BASE;
        while (filter_index as usize) > self.filter_offsets.len() {
            self.generate_filter();
        }
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.key_offsets.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    fn generate_filter(&mut self) {
        let num_keys = self.key_offsets.len();
        self.filter_offsets.push(self.result.len() as u32);
        if num_keys == 0 {
            return;
        }
        self.key_offsets.push(self.keys.len());
        let key_slices: Vec<&[u8]> = (0..num_keys)
            .map(|i| &self.keys[self.key_offsets[i]..self.key_offsets[i + 1]])
            .collect();
        self.policy.create_filter(&key_slices, &mut self.result);
        self.keys.clear();
        self.key_offsets.clear();
    }

    /// Finishes the block: flushes the in-progress filter, appends the
    /// filter offset array and its own base-offset trailer, and returns
    /// the completed contents.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.key_offsets.is_empty() {
            self.generate_filter();
        }
        let array_offset = self.result.len() as u32;
        for offset in &self.filter_offsets {
            self.result.extend_from_slice(&offset.to_le_bytes());
        }
        self.result.extend_from_slice(&array_offset.to_le_bytes());
        self.result.push(FILTER_BASE_LG as u8);
        self.result
    }
}

/// Reads a filter block built by [`FilterBlockBuilder`] back, resolving
/// `block_offset -> KeyMayMatch` without decompressing the whole block.
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    data: Arc<[u8]>,
    offset_array_start: usize,
    num_filters: usize,
    base_lg: u32,
}

impl FilterBlockReader {
    pub fn new(policy: Arc<dyn FilterPolicy>, data: Arc<[u8]>) -> Option<Self> {
        let n = data.len();
        if n < 5 {
            return None;
        }
        let base_lg = data[n - 1] as u32;
        let array_offset = u32::from_le_bytes(data[n - 5..n - 1].try_into().ok()?) as usize;
        if array_offset > n - 5 {
            return None;
        }
        let num_filters = (n - 5 - array_offset) / 4;
        Some(FilterBlockReader {
            policy,
            data,
            offset_array_start: array_offset,
            num_filters,
            base_lg,
        })
    }

    fn offset_at(&self, index: usize) -> usize {
        let off = self.offset_array_start + index * 4;
        u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap()) as usize
    }

    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let index = (block_offset >> self.base_lg) as usize;
        if index >= self.num_filters {
            // No filter recorded for this offset range: conservative yes.
            return true;
        }
        let start = self.offset_at(index);
        let limit = self.offset_at(index + 1);
        if start > limit || limit > self.offset_array_start {
            return true;
        }
        let filter = &self.data[start..limit];
        if filter.is_empty() {
            return false;
        }
        self.policy.key_may_match(key, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_policy::BloomFilterPolicy;

    #[test]
    fn single_chunk_round_trip() {
        let policy: Arc<dyn FilterPolicy> = Arc::new(BloomFilterPolicy::new(10));
        let mut builder = FilterBlockBuilder::new(policy.clone());
        builder.start_block(0);
        builder.add_key(b"foo");
        builder.add_key(b"bar");
        let data: Arc<[u8]> = builder.finish().into();

        let reader = FilterBlockReader::new(policy, data).unwrap();
        assert!(reader.key_may_match(0, b"foo"));
        assert!(reader.key_may_match(0, b"bar"));
    }

    #[test]
    fn separate_chunks_get_separate_filters() {
        let policy: Arc<dyn FilterPolicy> = Arc::new(BloomFilterPolicy::new(10));
        let mut builder = FilterBlockBuilder::new(policy.clone());

        builder.start_block(0);
        builder.add_key(b"chunk-one-key");

        builder.start_block(FILTER_BASE * 3);
        builder.add_key(b"chunk-two-key");

        let data: Arc<[u8]> = builder.finish().into();
        let reader = FilterBlockReader::new(policy, data).unwrap();

        assert!(reader.key_may_match(0, b"chunk-one-key"));
        assert!(reader.key_may_match(FILTER_BASE * 3, b"chunk-two-key"));
        // Offset range with no keys ever added: empty filter, no match.
        assert!(!reader.key_may_match(FILTER_BASE * 3, b"chunk-one-key"));
    }
}

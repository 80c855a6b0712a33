//! Sharded LRU caching for two distinct resources: decoded data blocks
//! ([`lru::Cache`] keyed by `(table id, block offset)`) and open SST
//! handles ([`table_cache::TableCache`] keyed by file number).
//!
//! Block cache keys combine a table's cache ID — minted once, the
//! first time [`table_cache::TableCache`] opens that file — with the
//! block's offset within it, rather than the file number directly.
//! That's what lets a table's block-cache entries become unreachable
//! garbage as soon as the table itself is evicted, without this module
//! having to walk the block cache and proactively remove them.

pub mod lru;
pub mod table_cache;

pub use lru::Cache;
pub use table_cache::{TableCache, TableCacheError};

use std::sync::Arc;

/// A decoded data block, cached by `(table_id, block_offset)` so that
/// popular blocks survive even as tables themselves cycle in and out
/// of the table cache.
pub type BlockCache = Cache<Arc<crate::sstable::block::Block>>;

pub fn block_cache_key(table_id: u64, block_offset: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&table_id.to_le_bytes());
    key[8..].copy_from_slice(&block_offset.to_le_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_cache_keys_differ_by_table_or_offset() {
        assert_ne!(block_cache_key(1, 0), block_cache_key(2, 0));
        assert_ne!(block_cache_key(1, 0), block_cache_key(1, 4096));
        assert_eq!(block_cache_key(1, 0), block_cache_key(1, 0));
    }
}

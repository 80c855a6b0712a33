//! Caches open SST handles so repeated reads of the same file don't
//! each pay the cost of a fresh `open` + footer/index parse.
//!
//! Keyed by file number, capacity set to `max_open_files - 10` (ten
//! files reserved for the WAL, MANIFEST, LOCK, and other non-table file
//! descriptors the process holds open). Every cached entry also mints a
//! table ID from a monotonic counter the first time it's opened; the
//! block cache combines that ID with a block offset to form its own
//! cache keys, so a table's block-cache entries become unreachable as
//! soon as the table itself falls out of this cache, without needing a
//! proactive sweep.

use super::lru::Cache;
use crate::cache::BlockCache;
use crate::comparator::Comparator;
use crate::filename::table_file_name;
use crate::filter_policy::FilterPolicy;
use crate::dbformat::LookupKey;
use crate::sstable::table::TableGetResult;
use crate::sstable::{Table, TableError};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TableCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("table error: {0}")]
    Table(#[from] TableError),
}

struct CachedTable {
    id: u64,
    table: Arc<Table>,
}

/// Reserve ten file descriptors outside the table cache's own budget
/// for the WAL, MANIFEST, LOCK, and info log.
pub const NON_TABLE_CACHE_FILES: usize = 10;

pub struct TableCache {
    db_path: PathBuf,
    comparator: Arc<dyn Comparator>,
    filter_policy: Option<Arc<dyn FilterPolicy>>,
    block_cache: Arc<BlockCache>,
    cache: Cache<Arc<CachedTable>>,
    next_id: AtomicU64,
}

impl TableCache {
    pub fn new(
        db_path: PathBuf,
        max_open_files: usize,
        comparator: Arc<dyn Comparator>,
        filter_policy: Option<Arc<dyn FilterPolicy>>,
        block_cache: Arc<BlockCache>,
    ) -> Self {
        let capacity = max_open_files.saturating_sub(NON_TABLE_CACHE_FILES).max(1);
        TableCache {
            db_path,
            comparator,
            filter_policy,
            block_cache,
            cache: Cache::with_capacity(capacity),
            next_id: AtomicU64::new(1),
        }
    }

    fn cache_key(file_number: u64) -> [u8; 8] {
        file_number.to_le_bytes()
    }

    /// Returns the opened table for `file_number` and its table-cache
    /// ID, opening and inserting it on a miss.
    pub fn find_table(&self, file_number: u64, file_size: u64) -> Result<(Arc<Table>, u64), TableCacheError> {
        let key = Self::cache_key(file_number);
        if let Some(cached) = self.cache.get(&key) {
            return Ok((cached.table.clone(), cached.id));
        }

        debug!(file_number, "table_cache: opening sstable");
        let path = table_file_name(&self.db_path, file_number);
        let file = File::open(&path)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(Table::open_with_cache(
            file,
            file_size,
            self.comparator.clone(),
            self.filter_policy.clone(),
            Some(self.block_cache.clone()),
            id,
        )?);
        let cached = Arc::new(CachedTable { id, table: table.clone() });
        self.cache.insert(&key, cached, 1);
        Ok((table, id))
    }

    /// Direct MVCC point lookup through the cache, without handing the
    /// caller a table reference — the common case for `Get`.
    pub fn get(&self, file_number: u64, file_size: u64, lookup: &LookupKey) -> Result<TableGetResult, TableCacheError> {
        let (table, _id) = self.find_table(file_number, file_size)?;
        Ok(table.get(lookup)?)
    }

    /// A two-level iterator over every entry in `file_number`, opening
    /// (and caching) the table first if necessary.
    pub fn iter(&self, file_number: u64, file_size: u64) -> Result<crate::sstable::table::TableIterator, TableCacheError> {
        let (table, _id) = self.find_table(file_number, file_size)?;
        Ok(table.iter())
    }

    /// Drops `file_number` from the cache, called by `DeleteObsoleteFiles`
    /// right before the underlying table file is removed.
    pub fn evict(&self, file_number: u64) {
        self.cache.erase(&Self::cache_key(file_number));
    }
}

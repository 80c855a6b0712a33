//! Opens a completed SST file for reading: parses the footer, index,
//! and (if present) filter block, and serves point lookups and
//! iteration over the data blocks.

use super::block::{Block, BlockIterator};
use super::filter_block::FilterBlockReader;
use super::format::{BlockHandle, FOOTER_ENCODED_LENGTH, Footer, FormatError, verify_block_trailer};
use crate::cache::{BlockCache, block_cache_key};
use crate::comparator::Comparator;
use crate::filter_policy::FilterPolicy;
use memmap2::Mmap;
use std::fs::File;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("file too small to be a valid table")]
    TooSmall,
}

/// Outcome of [`Table::get`]: a live value, a tombstone (the newest
/// write for this user key at or below the lookup sequence was a
/// delete), or nothing at all for this user key in this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableGetResult {
    Found(Vec<u8>),
    Deleted,
    NotFound,
}

fn read_block_raw(data: &[u8], handle: &BlockHandle) -> Result<Arc<[u8]>, TableError> {
    let start = handle.offset as usize;
    let full_len = handle.size as usize + super::format::BLOCK_TRAILER_SIZE;
    let end = start + full_len;
    if end > data.len() {
        return Err(TableError::TooSmall);
    }
    let with_trailer = &data[start..end];
    verify_block_trailer(with_trailer)?;
    Ok(Arc::from(&with_trailer[..handle.size as usize]))
}

/// A memory-mapped, opened SST. Cheap to clone (an `Arc` around the
/// mapping plus a handful of parsed block handles), so the table cache
/// can hand out copies freely.
pub struct Table {
    mmap: Arc<Mmap>,
    comparator: Arc<dyn Comparator>,
    index_block: Arc<[u8]>,
    filter_reader: Option<FilterBlockReader>,
    block_cache: Option<Arc<BlockCache>>,
    table_id: u64,
}

impl Table {
    pub fn open(
        file: File,
        file_size: u64,
        comparator: Arc<dyn Comparator>,
        filter_policy: Option<Arc<dyn FilterPolicy>>,
    ) -> Result<Table, TableError> {
        Self::open_with_cache(file, file_size, comparator, filter_policy, None, 0)
    }

    /// Like [`Table::open`], but reads data blocks through `block_cache`
    /// (keyed by `table_id` plus the block's offset) rather than
    /// re-decoding them on every access. `table_id` is minted by
    /// [`crate::cache::table_cache::TableCache`] the first time this
    /// file is opened.
    pub fn open_with_cache(
        file: File,
        file_size: u64,
        comparator: Arc<dyn Comparator>,
        filter_policy: Option<Arc<dyn FilterPolicy>>,
        block_cache: Option<Arc<BlockCache>>,
        table_id: u64,
    ) -> Result<Table, TableError> {
        if file_size < FOOTER_ENCODED_LENGTH as u64 {
            return Err(TableError::TooSmall);
        }
        let mmap = Arc::new(unsafe { Mmap::map(&file)? });
        let data: &[u8] = &mmap;

        let footer_start = file_size as usize - FOOTER_ENCODED_LENGTH;
        let footer = Footer::decode_from(&data[footer_start..])?;

        let index_block = read_block_raw(data, &footer.index_handle)?;

        let filter_reader = if let Some(policy) = filter_policy {
            let metaindex_raw = read_block_raw(data, &footer.metaindex_handle)?;
            let metaindex = Block::new(metaindex_raw);
            let mut it = metaindex.iter(comparator.clone());
            let wanted_key = format!("filter.{}", policy.name());
            it.seek(wanted_key.as_bytes());
            if it.valid() && it.key() == wanted_key.as_bytes() {
                let (handle, _) = BlockHandle::decode_from(it.value())?;
                let filter_raw = read_block_raw(data, &handle)?;
                FilterBlockReader::new(policy, filter_raw)
            } else {
                None
            }
        } else {
            None
        };

        Ok(Table {
            mmap,
            comparator,
            index_block,
            filter_reader,
            block_cache,
            table_id,
        })
    }

    fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Reads and decodes the data block at `handle`, consulting the
    /// block cache (if one is configured) before touching the mmap.
    fn read_data_block(&self, handle: &BlockHandle) -> Result<Arc<Block>, TableError> {
        if let Some(cache) = &self.block_cache {
            let key = block_cache_key(self.table_id, handle.offset);
            if let Some(block) = cache.get(&key) {
                return Ok(block);
            }
            let raw = read_block_raw(self.data(), handle)?;
            let charge = raw.len();
            let block = Arc::new(Block::new(raw));
            cache.insert(&key, block.clone(), charge);
            return Ok(block);
        }
        let raw = read_block_raw(self.data(), handle)?;
        Ok(Arc::new(Block::new(raw)))
    }

    /// Looks up `key` (an encoded internal key) directly, without going
    /// through the general-purpose two-level iterator: consults the
    /// filter block first so a negative can skip reading the data block
    /// entirely.
    pub fn internal_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TableError> {
        let index = Block::new(self.index_block.clone());
        let mut index_it = index.iter(self.comparator.clone());
        index_it.seek(key);
        if !index_it.valid() {
            return Ok(None);
        }
        let (handle, _) = BlockHandle::decode_from(index_it.value())?;

        if let Some(filter) = &self.filter_reader {
            if !filter.key_may_match(handle.offset, key) {
                return Ok(None);
            }
        }

        let block = self.read_data_block(&handle)?;
        let mut data_it = block.iter(self.comparator.clone());
        data_it.seek(key);
        if data_it.valid() && data_it.key() == key {
            Ok(Some(data_it.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// The MVCC-aware point lookup `Version::get` and the table cache use:
    /// seeks to the first entry whose internal key is >= `lookup`'s, then
    /// accepts it only if its user key matches exactly (the tag may differ,
    /// since the seek target carries the snapshot's sequence number, not
    /// the stored entry's).
    pub fn get(&self, lookup: &crate::dbformat::LookupKey) -> Result<TableGetResult, TableError> {
        let index = Block::new(self.index_block.clone());
        let mut index_it = index.iter(self.comparator.clone());
        index_it.seek(lookup.internal_key());
        if !index_it.valid() {
            return Ok(TableGetResult::NotFound);
        }
        let (handle, _) = BlockHandle::decode_from(index_it.value())?;

        if let Some(filter) = &self.filter_reader {
            if !filter.key_may_match(handle.offset, lookup.internal_key()) {
                return Ok(TableGetResult::NotFound);
            }
        }

        let block = self.read_data_block(&handle)?;
        let mut data_it = block.iter(self.comparator.clone());
        data_it.seek(lookup.internal_key());
        if !data_it.valid() {
            return Ok(TableGetResult::NotFound);
        }

        let Some(parsed) = crate::dbformat::parse_internal_key(data_it.key()) else {
            return Ok(TableGetResult::NotFound);
        };
        if parsed.user_key != lookup.user_key() {
            return Ok(TableGetResult::NotFound);
        }
        match parsed.value_type {
            crate::dbformat::ValueType::Value => Ok(TableGetResult::Found(data_it.value().to_vec())),
            crate::dbformat::ValueType::Deletion => Ok(TableGetResult::Deleted),
        }
    }

    /// Approximate byte offset within the file of `key` (an encoded
    /// internal key): seeks the index for the first block that could
    /// contain it and returns that block's starting offset. A key past
    /// the last index entry maps to the file's total size, so a range
    /// scan's upper bound beyond every stored key sizes as "the rest of
    /// the file".
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let index = Block::new(self.index_block.clone());
        let mut index_it = index.iter(self.comparator.clone());
        index_it.seek(key);
        if index_it.valid() {
            match BlockHandle::decode_from(index_it.value()) {
                Ok((handle, _)) => handle.offset,
                Err(_) => self.mmap.len() as u64,
            }
        } else {
            self.mmap.len() as u64
        }
    }

    /// A two-level iterator over every entry in the table, in key order.
    pub fn iter(self: &Arc<Self>) -> TableIterator {
        let index = Block::new(self.index_block.clone());
        TableIterator {
            table: self.clone(),
            index_iter: index.iter(self.comparator.clone()),
            data_iter: None,
        }
    }
}

/// Lazily materializes each data block referenced by the index as
/// iteration reaches it, so a full scan only ever holds one data block
/// alive at a time.
pub struct TableIterator {
    table: Arc<Table>,
    index_iter: BlockIterator,
    data_iter: Option<BlockIterator>,
}

impl TableIterator {
    fn set_data_iter_for_current_index(&mut self) {
        if !self.index_iter.valid() {
            self.data_iter = None;
            return;
        }
        match BlockHandle::decode_from(self.index_iter.value()) {
            Ok((handle, _)) => match self.table.read_data_block(&handle) {
                Ok(block) => {
                    let mut it = block.iter(self.table.comparator.clone());
                    it.seek_to_first();
                    self.data_iter = Some(it);
                }
                Err(_) => self.data_iter = None,
            },
            Err(_) => self.data_iter = None,
        }
    }

    pub fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        self.set_data_iter_for_current_index();
        self.skip_empty_data_blocks_forward();
    }

    pub fn seek(&mut self, target: &[u8]) {
        self.index_iter.seek(target);
        self.set_data_iter_for_current_index();
        if let Some(it) = self.data_iter.as_mut() {
            it.seek(target);
        }
        self.skip_empty_data_blocks_forward();
    }

    pub fn seek_to_last(&mut self) {
        self.index_iter.seek_to_last();
        self.set_data_iter_for_current_index();
        if let Some(it) = self.data_iter.as_mut() {
            it.seek_to_last();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn skip_empty_data_blocks_forward(&mut self) {
        while self.data_iter.as_ref().map(|it| !it.valid()).unwrap_or(true) {
            self.index_iter.next();
            if !self.index_iter.valid() {
                self.data_iter = None;
                return;
            }
            self.set_data_iter_for_current_index();
            if let Some(it) = self.data_iter.as_mut() {
                it.seek_to_first();
            }
        }
    }

    fn skip_empty_data_blocks_backward(&mut self) {
        while self.data_iter.as_ref().map(|it| !it.valid()).unwrap_or(true) {
            self.index_iter.prev();
            if !self.index_iter.valid() {
                self.data_iter = None;
                return;
            }
            self.set_data_iter_for_current_index();
            if let Some(it) = self.data_iter.as_mut() {
                it.seek_to_last();
            }
        }
    }

    pub fn valid(&self) -> bool {
        self.data_iter.as_ref().is_some_and(|it| it.valid())
    }

    pub fn next(&mut self) {
        if let Some(it) = self.data_iter.as_mut() {
            it.next();
        }
        self.skip_empty_data_blocks_forward();
    }

    pub fn prev(&mut self) {
        if let Some(it) = self.data_iter.as_mut() {
            it.prev();
        }
        self.skip_empty_data_blocks_backward();
    }

    pub fn key(&self) -> &[u8] {
        self.data_iter.as_ref().expect("valid iterator").key()
    }

    pub fn value(&self) -> &[u8] {
        self.data_iter.as_ref().expect("valid iterator").value()
    }
}

impl crate::iterator::Iter for TableIterator {
    fn valid(&self) -> bool {
        TableIterator::valid(self)
    }

    fn seek_to_first(&mut self) {
        TableIterator::seek_to_first(self)
    }

    fn seek_to_last(&mut self) {
        TableIterator::seek_to_last(self)
    }

    fn seek(&mut self, target: &[u8]) {
        TableIterator::seek(self, target)
    }

    fn next(&mut self) {
        TableIterator::next(self)
    }

    fn prev(&mut self) {
        TableIterator::prev(self)
    }

    fn key(&self) -> &[u8] {
        TableIterator::key(self)
    }

    fn value(&self) -> &[u8] {
        TableIterator::value(self)
    }
}

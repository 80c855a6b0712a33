//! Writes a complete SST file from a stream of already-sorted internal
//! keys: data blocks, the filter block, the index block, the metaindex
//! block, and the footer, in that order.

use super::block::{BlockBuilder, DEFAULT_RESTART_INTERVAL};
use super::filter_block::FilterBlockBuilder;
use super::format::{BlockHandle, Footer, append_block_trailer};
use crate::comparator::Comparator;
use crate::filter_policy::FilterPolicy;
use std::io::{self, Write};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("keys must be added in increasing order")]
    OutOfOrder,
}

/// Target uncompressed size of a data block before it's flushed. Not a
/// hard cap — the last entry added to a block is always allowed to
/// finish, so actual blocks run slightly over this.
pub const BLOCK_SIZE_TARGET: usize = 4 * 1024;

pub struct TableBuilder<W: Write> {
    writer: W,
    comparator: Arc<dyn Comparator>,
    filter_policy: Option<Arc<dyn FilterPolicy>>,
    offset: u64,
    data_block: BlockBuilder,
    index_block: BlockBuilder,
    filter_block: Option<FilterBlockBuilder>,
    num_entries: u64,
    last_key: Vec<u8>,
    pending_index_entry: bool,
    pending_handle: BlockHandle,
    closed: bool,
}

impl<W: Write> TableBuilder<W> {
    pub fn new(writer: W, comparator: Arc<dyn Comparator>, filter_policy: Option<Arc<dyn FilterPolicy>>) -> Self {
        let filter_block = filter_policy.clone().map(|p| {
            let mut fb = FilterBlockBuilder::new(p);
            fb.start_block(0);
            fb
        });
        TableBuilder {
            writer,
            comparator,
            filter_policy,
            offset: 0,
            data_block: BlockBuilder::new(DEFAULT_RESTART_INTERVAL),
            index_block: BlockBuilder::new(1),
            filter_block,
            num_entries: 0,
            last_key: Vec::new(),
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
            closed: false,
        }
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// Adds `(internal_key, value)`. Keys must arrive in ascending
    /// order under `comparator`.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<(), BuilderError> {
        assert!(!self.closed);
        if self.num_entries > 0 && self.comparator.compare(&self.last_key, key) != std::cmp::Ordering::Less {
            return Err(BuilderError::OutOfOrder);
        }

        if self.pending_index_entry {
            debug_assert!(self.data_block.empty());
            let separator = self.comparator.find_shortest_separator(&self.last_key, key);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&separator, &handle_encoding);
            self.pending_index_entry = false;
        }

        if let Some(fb) = self.filter_block.as_mut() {
            fb.add_key(key);
        }

        self.last_key = key.to_vec();
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= BLOCK_SIZE_TARGET {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BuilderError> {
        assert!(!self.closed);
        if self.data_block.empty() {
            return Ok(());
        }
        assert!(!self.pending_index_entry);
        let block = std::mem::replace(&mut self.data_block, BlockBuilder::new(DEFAULT_RESTART_INTERVAL));
        self.pending_handle = self.write_block(block)?;
        self.pending_index_entry = true;
        self.writer.flush()?;
        if let Some(fb) = self.filter_block.as_mut() {
            fb.start_block(self.offset);
        }
        Ok(())
    }

    fn write_block(&mut self, block: BlockBuilder) -> Result<BlockHandle, BuilderError> {
        let contents = block.finish();
        let mut with_trailer = Vec::with_capacity(contents.len() + 5);
        append_block_trailer(&contents, &mut with_trailer);
        let handle = BlockHandle::new(self.offset, contents.len() as u64);
        self.writer.write_all(&with_trailer)?;
        self.offset += with_trailer.len() as u64;
        Ok(handle)
    }

    fn write_raw_block(&mut self, contents: &[u8]) -> Result<BlockHandle, BuilderError> {
        let mut with_trailer = Vec::with_capacity(contents.len() + 5);
        append_block_trailer(contents, &mut with_trailer);
        let handle = BlockHandle::new(self.offset, contents.len() as u64);
        self.writer.write_all(&with_trailer)?;
        self.offset += with_trailer.len() as u64;
        Ok(handle)
    }

    /// Flushes any pending data block, writes the filter, index, and
    /// metaindex blocks, and writes the footer. Consumes `self`,
    /// returning the total file size written.
    pub fn finish(mut self) -> Result<u64, BuilderError> {
        self.flush()?;
        self.closed = true;

        let filter_handle = match self.filter_block.take() {
            Some(fb) => Some(self.write_raw_block(&fb.finish())?),
            None => None,
        };

        if self.pending_index_entry {
            let successor = self.comparator.find_short_successor(&self.last_key);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&successor, &handle_encoding);
            self.pending_index_entry = false;
        }

        let mut metaindex_block = BlockBuilder::new(DEFAULT_RESTART_INTERVAL);
        if let (Some(handle), Some(policy)) = (filter_handle, self.filter_policy.as_ref()) {
            let key = format!("filter.{}", policy.name());
            let mut handle_encoding = Vec::new();
            handle.encode_to(&mut handle_encoding);
            metaindex_block.add(key.as_bytes(), &handle_encoding);
        }
        let metaindex_handle = self.write_block(metaindex_block)?;

        let index_block = std::mem::replace(&mut self.index_block, BlockBuilder::new(1));
        let index_handle = self.write_block(index_block)?;

        let footer = Footer {
            metaindex_handle,
            index_handle,
        };
        let mut footer_bytes = Vec::new();
        footer.encode_to(&mut footer_bytes);
        self.writer.write_all(&footer_bytes)?;
        self.offset += footer_bytes.len() as u64;
        self.writer.flush()?;

        Ok(self.offset)
    }
}

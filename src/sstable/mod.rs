//! Immutable, sorted, on-disk tables (SSTs).
//!
//! An SST is built once, in increasing internal-key order, by
//! [`builder::TableBuilder`], and afterwards opened read-only by
//! [`table::Table`]. Internally a table is a sequence of restart-prefix
//! compressed data blocks (see [`block`]), an index block mapping the
//! last key of each data block to its [`format::BlockHandle`], an
//! optional per-block-range bloom filter (see [`filter_block`]), and a
//! fixed-size [`format::Footer`] pointing at the index and metaindex
//! blocks.

pub mod block;
pub mod builder;
pub mod filter_block;
pub mod format;
pub mod table;


pub use builder::{BuilderError, TableBuilder};
pub use format::{BlockHandle, FormatError};
pub use table::{Table, TableError, TableGetResult, TableIterator};

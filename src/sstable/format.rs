//! Block handles, the table footer, and the per-block trailer —
//! the small fixed-size structures that stitch an SST's blocks
//! together.

use crate::encoding::{crc, get_varint64, mask_crc, put_varint64, unmask_crc};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad block handle")]
    BadBlockHandle,
    #[error("not an sstable (footer magic mismatch)")]
    BadMagicNumber,
    #[error("block checksum mismatch")]
    ChecksumMismatch,
    #[error("unsupported block compression type {0}")]
    UnsupportedCompression(u8),
}

/// An offset/size pair locating a block within the SST file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

/// Varint64 + varint64 gives a worst case of 10 bytes each.
pub const MAX_ENCODED_LENGTH: usize = 20;

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        BlockHandle { offset, size }
    }

    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        put_varint64(dst, self.offset);
        put_varint64(dst, self.size);
    }

    pub fn decode_from(input: &[u8]) -> Result<(BlockHandle, usize), FormatError> {
        let (offset, n1) = get_varint64(input).map_err(|_| FormatError::BadBlockHandle)?;
        let (size, n2) = get_varint64(&input[n1..]).map_err(|_| FormatError::BadBlockHandle)?;
        Ok((BlockHandle { offset, size }, n1 + n2))
    }
}

/// Block compression codec. Only `None` is implemented; the byte is
/// reserved and checked on read so a future codec addition doesn't
/// silently misinterpret old files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
}

impl CompressionType {
    pub fn from_u8(b: u8) -> Result<CompressionType, FormatError> {
        match b {
            0 => Ok(CompressionType::None),
            other => Err(FormatError::UnsupportedCompression(other)),
        }
    }
}

/// Trailer appended after every block's raw contents: 1 compression-type
/// byte + a 4-byte masked CRC32C over `contents ++ compression_type`.
pub const BLOCK_TRAILER_SIZE: usize = 5;

pub fn append_block_trailer(contents: &[u8], dst: &mut Vec<u8>) {
    dst.extend_from_slice(contents);
    dst.push(CompressionType::None as u8);
    let checksum = mask_crc(crc(&[contents, &[CompressionType::None as u8]]));
    dst.extend_from_slice(&checksum.to_le_bytes());
}

pub fn verify_block_trailer(block_and_trailer: &[u8]) -> Result<(), FormatError> {
    let n = block_and_trailer.len();
    if n < BLOCK_TRAILER_SIZE {
        return Err(FormatError::BadBlockHandle);
    }
    let contents = &block_and_trailer[..n - BLOCK_TRAILER_SIZE];
    let compression_byte = block_and_trailer[n - BLOCK_TRAILER_SIZE];
    CompressionType::from_u8(compression_byte)?;
    let expected = unmask_crc(u32::from_le_bytes(
        block_and_trailer[n - 4..].try_into().unwrap(),
    ));
    let actual = crc(&[contents, &[compression_byte]]);
    if actual != expected {
        return Err(FormatError::ChecksumMismatch);
    }
    Ok(())
}

/// The fixed-size footer at the end of every SST file: handles to the
/// metaindex and index blocks, zero-padded, then an 8-byte magic number.
pub const FOOTER_ENCODED_LENGTH: usize = 2 * MAX_ENCODED_LENGTH + 8;
pub const TABLE_MAGIC_NUMBER: u64 = 0xdb4775248b80fb57;

#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        let start_len = dst.len();
        self.metaindex_handle.encode_to(dst);
        self.index_handle.encode_to(dst);
        dst.resize(start_len + 2 * MAX_ENCODED_LENGTH, 0);
        dst.extend_from_slice(&TABLE_MAGIC_NUMBER.to_le_bytes());
        debug_assert_eq!(dst.len() - start_len, FOOTER_ENCODED_LENGTH);
    }

    pub fn decode_from(input: &[u8]) -> Result<Footer, FormatError> {
        if input.len() < FOOTER_ENCODED_LENGTH {
            return Err(FormatError::BadBlockHandle);
        }
        let magic = u64::from_le_bytes(
            input[FOOTER_ENCODED_LENGTH - 8..FOOTER_ENCODED_LENGTH]
                .try_into()
                .unwrap(),
        );
        if magic != TABLE_MAGIC_NUMBER {
            return Err(FormatError::BadMagicNumber);
        }
        let (metaindex_handle, n1) = BlockHandle::decode_from(input)?;
        let (index_handle, _) = BlockHandle::decode_from(&input[n1..])?;
        Ok(Footer {
            metaindex_handle,
            index_handle,
        })
    }
}

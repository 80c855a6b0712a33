//! On-disk key format shared by the memtable, SSTs, and the version set.
//!
//! Every stored key is an *internal key*: a user key followed by an
//! 8-byte tag packing a 56-bit sequence number and a 1-byte
//! [`ValueType`]. Internal keys sort by user key ascending, then by
//! sequence number descending, then by type descending — so that for a
//! given user key, the newest write (and, among writes at the same
//! sequence number, a delete over a put) always sorts first. That's what
//! lets a forward scan find "the current value of this key" by simply
//! taking the first internal key with a matching user key.

use crate::comparator::Comparator;
use std::cmp::Ordering;
use std::sync::Arc;

/// Tag byte distinguishing a live value from a tombstone. `ForSeek` is
/// not a real stored value; it's used to build a `LookupKey` that sorts
/// before every internal key with the same user key and sequence
/// number, regardless of type, since `Put(1) > Delete(1)` is exactly
/// backwards from what a seek needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    Deletion = 0,
    Value = 1,
}

impl ValueType {
    pub const FOR_SEEK: ValueType = ValueType::Value;

    pub fn from_u8(b: u8) -> Option<ValueType> {
        match b {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            _ => None,
        }
    }
}

pub type SequenceNumber = u64;

/// Sequence numbers are packed into the low 56 bits of the tag word;
/// this is the largest representable value.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1u64 << 56) - 1;

/// Packs `(seq, type)` into the 8-byte tag appended after every user key.
pub fn pack_sequence_and_type(seq: SequenceNumber, t: ValueType) -> u64 {
    debug_assert!(seq <= MAX_SEQUENCE_NUMBER);
    (seq << 8) | (t as u64)
}

/// An internal key, decomposed into its user key, sequence number, and
/// type. Borrows from whatever buffer backs `user_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn new(user_key: &'a [u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        ParsedInternalKey {
            user_key,
            sequence,
            value_type,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.user_key.len() + 8
    }

    pub fn append_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self.user_key);
        let tag = pack_sequence_and_type(self.sequence, self.value_type);
        dst.extend_from_slice(&tag.to_le_bytes());
    }
}

/// Splits a raw internal-key byte string into its parts. Fails if
/// `data` is shorter than the 8-byte tag or the tag's type byte is
/// unrecognized.
pub fn parse_internal_key(data: &[u8]) -> Option<ParsedInternalKey<'_>> {
    if data.len() < 8 {
        return None;
    }
    let n = data.len() - 8;
    let tag = u64::from_le_bytes(data[n..].try_into().ok()?);
    let value_type = ValueType::from_u8((tag & 0xff) as u8)?;
    let sequence = tag >> 8;
    Some(ParsedInternalKey {
        user_key: &data[..n],
        sequence,
        value_type,
    })
}

/// Returns just the user-key prefix of an encoded internal key, without
/// validating the tag. Internal keys are never shorter than 8 bytes, so
/// callers that already trust the source (on-disk data past checksum
/// verification) can skip `parse_internal_key`'s validation.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    debug_assert!(internal_key.len() >= 8);
    &internal_key[..internal_key.len() - 8]
}

/// An owned, encoded internal key: `user_key ++ tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey(Vec<u8>);

impl InternalKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        let mut buf = Vec::with_capacity(user_key.len() + 8);
        ParsedInternalKey::new(user_key, sequence, value_type).append_to(&mut buf);
        InternalKey(buf)
    }

    pub fn from_encoded(data: Vec<u8>) -> Self {
        InternalKey(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn user_key(&self) -> &[u8] {
        extract_user_key(&self.0)
    }

    pub fn parse(&self) -> ParsedInternalKey<'_> {
        parse_internal_key(&self.0).expect("InternalKey always holds a well-formed encoding")
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

/// Wraps a user [`Comparator`] to order encoded internal keys: user key
/// ascending (via the wrapped comparator), then sequence number and type
/// descending (via the raw tag, which conveniently makes a larger tag
/// sort first when compared in reverse).
///
/// Implements [`Comparator`] itself — exactly the way the rest of the
/// engine builds on it — so every component that orders raw byte
/// strings (the skip list, SST blocks, the version's file lists) can
/// take a plain `Arc<dyn Comparator>` without knowing it's actually
/// comparing internal keys underneath.
pub struct InternalKeyComparator {
    user_comparator: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        InternalKeyComparator { user_comparator }
    }

    pub fn user_comparator(&self) -> &Arc<dyn Comparator> {
        &self.user_comparator
    }
}

impl Comparator for InternalKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let ua = extract_user_key(a);
        let ub = extract_user_key(b);
        match self.user_comparator.compare(ua, ub) {
            Ordering::Equal => {
                // Larger tag (higher sequence, or same sequence but a
                // "larger" type) sorts first. The tag is stored little-
                // endian, so it must be decoded back to a u64 before
                // comparing — comparing the raw bytes lexicographically
                // does not agree with numeric order past the first byte.
                let anum = u64::from_le_bytes(a[a.len() - 8..].try_into().unwrap());
                let bnum = u64::from_le_bytes(b[b.len() - 8..].try_into().unwrap());
                bnum.cmp(&anum)
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "leveldb.InternalKeyComparator"
    }

    /// Shortens `start`'s user key while preserving `start`'s tag
    /// untouched, since the tag must stay >= any key it's meant to
    /// bound.
    fn find_shortest_separator(&self, start: &[u8], limit: &[u8]) -> Vec<u8> {
        let user_start = extract_user_key(start);
        let user_limit = extract_user_key(limit);
        let shortened = self.user_comparator.find_shortest_separator(user_start, user_limit);
        if shortened.len() < user_start.len()
            && self.user_comparator.compare(user_start, &shortened) == Ordering::Less
        {
            let mut new_key = shortened;
            let tag = pack_sequence_and_type(MAX_SEQUENCE_NUMBER, ValueType::FOR_SEEK);
            new_key.extend_from_slice(&tag.to_le_bytes());
            debug_assert!(self.compare(start, &new_key) == Ordering::Less);
            debug_assert!(self.compare(&new_key, limit) == Ordering::Less);
            return new_key;
        }
        start.to_vec()
    }

    fn find_short_successor(&self, key: &[u8]) -> Vec<u8> {
        let user_key = extract_user_key(key);
        let shortened = self.user_comparator.find_short_successor(user_key);
        if shortened.len() < user_key.len() && self.user_comparator.compare(user_key, &shortened) == Ordering::Less {
            let mut new_key = shortened;
            let tag = pack_sequence_and_type(MAX_SEQUENCE_NUMBER, ValueType::FOR_SEEK);
            new_key.extend_from_slice(&tag.to_le_bytes());
            debug_assert!(self.compare(key, &new_key) == Ordering::Less);
            return new_key;
        }
        key.to_vec()
    }
}

/// A transient key used to probe the memtable/version chain for the
/// current value of `user_key` as of `sequence`. Built once per `Get`
/// and handed to the memtable, the immutable memtable, and each
/// candidate SST in turn.
pub struct LookupKey {
    /// `user_key ++ tag`, the same encoding as [`InternalKey`].
    data: Vec<u8>,
}

impl LookupKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber) -> Self {
        let mut data = Vec::with_capacity(user_key.len() + 8);
        data.extend_from_slice(user_key);
        let tag = pack_sequence_and_type(sequence, ValueType::FOR_SEEK);
        data.extend_from_slice(&tag.to_le_bytes());
        LookupKey { data }
    }

    /// The encoding used as a memtable skip-list key: identical to the
    /// internal-key encoding here, since this port's memtable stores raw
    /// internal keys rather than length-prefixing them with a varint32
    /// (that prefix only matters when keys are packed contiguously in an
    /// arena-resident record, which this memtable does not do).
    pub fn internal_key(&self) -> &[u8] {
        &self.data
    }

    pub fn user_key(&self) -> &[u8] {
        &self.data[..self.data.len() - 8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::bytewise;

    #[test]
    fn parse_and_encode_round_trip() {
        let ik = InternalKey::new(b"hello", 42, ValueType::Value);
        let parsed = ik.parse();
        assert_eq!(parsed.user_key, b"hello");
        assert_eq!(parsed.sequence, 42);
        assert_eq!(parsed.value_type, ValueType::Value);
    }

    #[test]
    fn ordering_is_user_key_then_sequence_desc_then_type_desc() {
        let cmp = InternalKeyComparator::new(bytewise());
        let a = InternalKey::new(b"key", 5, ValueType::Value);
        let b = InternalKey::new(b"key", 3, ValueType::Value);
        assert_eq!(cmp.compare(a.as_bytes(), b.as_bytes()), Ordering::Less);

        let c = InternalKey::new(b"key", 5, ValueType::Deletion);
        let d = InternalKey::new(b"key", 5, ValueType::Value);
        assert_eq!(cmp.compare(d.as_bytes(), c.as_bytes()), Ordering::Less);

        let e = InternalKey::new(b"apple", 1, ValueType::Value);
        let f = InternalKey::new(b"banana", 1, ValueType::Value);
        assert_eq!(cmp.compare(e.as_bytes(), f.as_bytes()), Ordering::Less);
    }

    #[test]
    fn lookup_key_sorts_at_or_before_any_entry_with_same_user_key_and_sequence() {
        let cmp = InternalKeyComparator::new(bytewise());
        let lookup = LookupKey::new(b"key", 10);
        let put = InternalKey::new(b"key", 10, ValueType::Value);
        let del = InternalKey::new(b"key", 10, ValueType::Deletion);
        // Equal to a same-sequence Put (ForSeek reuses the Value tag)...
        assert_eq!(cmp.compare(lookup.internal_key(), put.as_bytes()), Ordering::Equal);
        // ...and strictly before a same-sequence Deletion, whose smaller
        // type tag sorts later, so a forward search for `lookup` still
        // lands on the deletion when that's the newest write.
        assert_eq!(cmp.compare(lookup.internal_key(), del.as_bytes()), Ordering::Less);
    }

    #[test]
    fn extract_user_key_strips_tag() {
        let ik = InternalKey::new(b"abcdef", 1, ValueType::Value);
        assert_eq!(extract_user_key(ik.as_bytes()), b"abcdef");
    }

    #[test]
    fn ordering_holds_across_a_tag_byte_boundary() {
        // seq=256 vs seq=255 differ in the tag's second byte; a
        // lexicographic comparison of the little-endian tag bytes gets
        // this backwards, while numeric comparison does not.
        let cmp = InternalKeyComparator::new(bytewise());
        let newer = InternalKey::new(b"key", 256, ValueType::Value);
        let older = InternalKey::new(b"key", 255, ValueType::Value);
        assert_eq!(cmp.compare(newer.as_bytes(), older.as_bytes()), Ordering::Less);
    }
}

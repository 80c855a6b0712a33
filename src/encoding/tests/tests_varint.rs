//! Tests for varint, fixed-width, and masked-CRC helpers.

use crate::encoding::*;

#[test]
fn varint32_roundtrip_small_and_large() {
    for v in [0u32, 1, 127, 128, 300, 16384, u32::MAX] {
        let mut buf = Vec::new();
        put_varint32(&mut buf, v);
        let (decoded, consumed) = get_varint32(&buf).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(consumed, buf.len());
    }
}

#[test]
fn varint64_roundtrip() {
    for v in [0u64, 1, 127, 128, u64::from(u32::MAX), u64::MAX] {
        let mut buf = Vec::new();
        put_varint64(&mut buf, v);
        let (decoded, consumed) = get_varint64(&buf).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(consumed, buf.len());
    }
}

#[test]
fn varint_one_byte_for_small_values() {
    let mut buf = Vec::new();
    put_varint32(&mut buf, 5);
    assert_eq!(buf.len(), 1);
}

#[test]
fn length_prefixed_slice_roundtrip() {
    let mut buf = Vec::new();
    put_length_prefixed_slice(&mut buf, b"hello world");
    let (decoded, consumed) = get_length_prefixed_slice(&buf).unwrap();
    assert_eq!(decoded, b"hello world");
    assert_eq!(consumed, buf.len());
}

#[test]
fn length_prefixed_slice_empty() {
    let mut buf = Vec::new();
    put_length_prefixed_slice(&mut buf, b"");
    let (decoded, _) = get_length_prefixed_slice(&buf).unwrap();
    assert!(decoded.is_empty());
}

#[test]
fn fixed32_fixed64_roundtrip() {
    let mut buf = Vec::new();
    put_fixed32(&mut buf, 0xdeadbeef);
    put_fixed64(&mut buf, 0x0102030405060708);
    assert_eq!(decode_fixed32(&buf).unwrap(), 0xdeadbeef);
    assert_eq!(decode_fixed64(&buf[4..]).unwrap(), 0x0102030405060708);
}

#[test]
fn masked_crc_roundtrips_through_mask() {
    let raw = crc(&[b"hello"]);
    let masked = mask_crc(raw);
    assert_ne!(masked, raw);
    assert_eq!(unmask_crc(masked), raw);
}

#[test]
fn masked_crc_detects_corruption() {
    let good = masked_crc(&[b"abc"]);
    let bad = masked_crc(&[b"abd"]);
    assert_ne!(good, bad);
}

#[test]
fn get_varint32_rejects_truncated_input() {
    // A continuation byte with nothing after it.
    let buf = [0x80u8];
    assert!(get_varint32(&buf).is_err());
}

//! Unsigned variable-length integers for the record-chunk wire format.
//!
//! Standard LEB128: 7 payload bits per byte, high bit set while more bytes
//! follow. Decoding is fallible because chunk input is untrusted: truncated
//! or over-long encodings return `None` instead of panicking.

use bytes::{Buf, BufMut};

pub fn encode_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn decode_u64(buf: &mut impl Buf) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        if !buf.has_remaining() {
            return None;
        }
        let byte = buf.get_u8();
        if shift == 63 && byte > 1 {
            // A tenth byte may only carry the final bit.
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: u64) -> usize {
        let mut buf = Vec::new();
        encode_u64(&mut buf, value);
        let len = buf.len();
        let mut cursor = &buf[..];
        assert_eq!(decode_u64(&mut cursor), Some(value));
        assert!(cursor.is_empty());
        len
    }

    #[test]
    fn encodes_compactly() {
        assert_eq!(round_trip(0), 1);
        assert_eq!(round_trip(127), 1);
        assert_eq!(round_trip(128), 2);
        assert_eq!(round_trip(1_000_000), 3);
        assert_eq!(round_trip(u64::MAX), 10);
    }

    #[test]
    fn rejects_truncated_input() {
        let mut cursor = &[0x80u8][..];
        assert_eq!(decode_u64(&mut cursor), None);
        let mut empty = &[][..];
        assert_eq!(decode_u64(&mut empty), None);
    }

    #[test]
    fn rejects_overflowing_input() {
        let mut cursor = &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02][..];
        assert_eq!(decode_u64(&mut cursor), None);
    }
}

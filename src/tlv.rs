// Variable-length TLV primitives, as used by the NDN suite.
//
// Both type and length are encoded as a variable-width number:
//  values below 253 take one byte, otherwise a marker byte (253/254/255)
//  is followed by 2/4/8 big-endian bytes.

use crate::{encode::PrependBuffer, error::DecodeError, error::EncodeError};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TLV<'a> {
    pub typ: u64,
    pub val: &'a [u8],
}

impl<'a> TLV<'a> {
    // Returns the TLV at the start of `bytes` and the number of bytes it occupies.
    pub fn try_decode(bytes: &'a [u8]) -> Result<(TLV<'a>, usize), DecodeError> {
        let mut cursor = 0;
        let typ = read_varint(bytes, &mut cursor)?;
        let len = read_varint(bytes, &mut cursor)?;
        let len = usize::try_from(len).map_err(|_| DecodeError::InvalidLength {
            typ,
            len: usize::MAX,
        })?;

        let end = cursor.checked_add(len).ok_or(DecodeError::InvalidLength { typ, len })?;
        let val = bytes.get(cursor..end).ok_or(DecodeError::Truncated {
            offset: cursor,
            needed: len,
            available: bytes.len() - cursor,
        })?;
        Ok((TLV { typ, val }, end))
    }

    pub fn val_as_u64(&self) -> Result<u64, DecodeError> {
        decode_nonneg(self.typ, self.val)
    }
}

pub struct TlvIterator<'a> {
    bytes: &'a [u8],
    offset: usize,
}

// Walks consecutive TLVs. Yields the element and its byte range within `bytes`;
//  stops after the first error.
pub fn parse_tlvs(bytes: &[u8]) -> TlvIterator<'_> {
    TlvIterator { bytes, offset: 0 }
}

impl<'a> Iterator for TlvIterator<'a> {
    type Item = Result<(TLV<'a>, core::ops::Range<usize>), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let start = self.offset;
        match TLV::try_decode(&self.bytes[start..]) {
            Ok((tlv, len)) => {
                self.offset += len;
                Some(Ok((tlv, start..start + len)))
            }
            Err(err) => {
                self.offset = self.bytes.len();
                Some(Err(shift_offset(err, start)))
            }
        }
    }
}

fn shift_offset(err: DecodeError, by: usize) -> DecodeError {
    match err {
        DecodeError::Truncated {
            offset,
            needed,
            available,
        } => DecodeError::Truncated {
            offset: offset + by,
            needed,
            available,
        },
        other => other,
    }
}

pub fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u64, DecodeError> {
    let first = *bytes.get(*cursor).ok_or(DecodeError::Truncated {
        offset: *cursor,
        needed: 1,
        available: 0,
    })?;
    let width = match first {
        0..=252 => {
            *cursor += 1;
            return Ok(first as u64);
        }
        253 => 2,
        254 => 4,
        255 => 8,
    };

    let start = *cursor + 1;
    let next = bytes.get(start..start + width).ok_or(DecodeError::Truncated {
        offset: start,
        needed: width,
        available: bytes.len().saturating_sub(start),
    })?;
    let val = next.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    *cursor = start + width;

    // Every value has exactly one valid encoding
    let minimum = match width {
        2 => 253,
        4 => 65536,
        _ => 4294967296,
    };
    if val < minimum {
        return Err(DecodeError::NonMinimalVarint);
    }
    Ok(val)
}

pub fn varint_len(val: u64) -> usize {
    if val < 253 {
        1
    } else if val <= 0xffff {
        3
    } else if val <= 0xffff_ffff {
        5
    } else {
        9
    }
}

// Non-negative integers are plain big-endian numbers whose width is given by the
//  enclosing length. A zero-length value is zero.
pub fn decode_nonneg(typ: u64, val: &[u8]) -> Result<u64, DecodeError> {
    if val.len() > 8 {
        return Err(DecodeError::InvalidInteger { typ });
    }
    Ok(val.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

pub fn prepend_varint(val: u64, buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    let mut scratch = [0u8; 9];
    let len = varint_len(val);
    match len {
        1 => scratch[0] = val as u8,
        3 => {
            scratch[0] = 253;
            scratch[1..3].copy_from_slice(&(val as u16).to_be_bytes());
        }
        5 => {
            scratch[0] = 254;
            scratch[1..5].copy_from_slice(&(val as u32).to_be_bytes());
        }
        _ => {
            scratch[0] = 255;
            scratch[1..9].copy_from_slice(&val.to_be_bytes());
        }
    }
    buf.prepend(&scratch[..len])
}

pub fn prepend_tl(typ: u64, len: usize, buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    prepend_varint(len as u64, buf)?;
    prepend_varint(typ, buf)
}

pub fn prepend_blob(typ: u64, bytes: &[u8], buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    buf.prepend(bytes)?;
    prepend_tl(typ, bytes.len(), buf)
}

// Number of zero bytes added in front of an integer that needs n significant bytes,
//  which rounds the width up to 1, 2, 4 or 8. Zero still takes one byte.
const NONNEG_FILL: [usize; 9] = [1, 0, 0, 1, 0, 3, 2, 1, 0];

// Writes just the integer value and returns how many bytes it took.
pub fn prepend_nonneg_value(val: u64, buf: &mut PrependBuffer) -> Result<usize, EncodeError> {
    let bytes = val.to_be_bytes();
    let significant = 8 - (val.leading_zeros() as usize / 8);
    let width = significant + NONNEG_FILL[significant];
    buf.prepend(&bytes[8 - significant..])?;
    for _ in significant..width {
        buf.prepend_byte(0)?;
    }
    Ok(width)
}

pub fn prepend_nonneg(typ: u64, val: u64, buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    let len = prepend_nonneg_value(val, buf)?;
    prepend_tl(typ, len, buf)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{
        encode::PrependBuffer,
        error::DecodeError,
        tlv::{
            decode_nonneg, parse_tlvs, prepend_nonneg, prepend_nonneg_value, prepend_tl,
            prepend_varint, read_varint, varint_len, TLV,
        },
    };

    fn varint_bytes(v: u64) -> Vec<u8> {
        let mut buf = PrependBuffer::with_capacity(16);
        prepend_varint(v, &mut buf).ok().unwrap();
        buf.written().to_vec()
    }

    fn nonneg_bytes(v: u64) -> Vec<u8> {
        let mut buf = PrependBuffer::with_capacity(16);
        prepend_nonneg_value(v, &mut buf).ok().unwrap();
        buf.written().to_vec()
    }

    #[test]
    fn test_varint_boundaries() {
        assert_eq!(varint_bytes(0), vec![0]);
        assert_eq!(varint_bytes(252), vec![252]);
        assert_eq!(varint_bytes(253), vec![253, 0, 253]);
        assert_eq!(varint_bytes(65535), vec![253, 0xff, 0xff]);
        assert_eq!(varint_bytes(65536), vec![254, 0, 1, 0, 0]);
        assert_eq!(varint_bytes(4294967295), vec![254, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            varint_bytes(4294967296),
            vec![255, 0, 0, 0, 1, 0, 0, 0, 0]
        );

        for v in [0u64, 252, 253, 65535, 65536, 4294967295, 4294967296] {
            let bytes = varint_bytes(v);
            assert_eq!(bytes.len(), varint_len(v));
            let mut cursor = 0;
            assert_eq!(read_varint(&bytes, &mut cursor), Ok(v));
            assert_eq!(cursor, bytes.len());
        }
    }

    #[test]
    fn test_varint_rejects_non_minimal_and_short() {
        let mut cursor = 0;
        assert_eq!(
            read_varint(&[253, 0, 12], &mut cursor),
            Err(DecodeError::NonMinimalVarint)
        );
        let mut cursor = 0;
        assert!(matches!(
            read_varint(&[254, 0, 1], &mut cursor),
            Err(DecodeError::Truncated { .. })
        ));
        let mut cursor = 0;
        assert!(matches!(
            read_varint(&[], &mut cursor),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_nonneg_fill_table() {
        assert_eq!(nonneg_bytes(0), vec![0]);
        assert_eq!(nonneg_bytes(252), vec![252]);
        assert_eq!(nonneg_bytes(253), vec![253]);
        assert_eq!(nonneg_bytes(65535), vec![0xff, 0xff]);
        // three significant bytes are widened to four
        assert_eq!(nonneg_bytes(65536), vec![0, 1, 0, 0]);
        assert_eq!(nonneg_bytes(4294967295), vec![0xff, 0xff, 0xff, 0xff]);
        // five are widened to eight
        assert_eq!(nonneg_bytes(4294967296), vec![0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(nonneg_bytes(u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn test_nonneg_decode() {
        assert_eq!(decode_nonneg(0x19, &[]), Ok(0));
        assert_eq!(decode_nonneg(0x19, &[0]), Ok(0));
        assert_eq!(decode_nonneg(0x19, &[1, 0]), Ok(256));
        assert_eq!(decode_nonneg(0x19, &[0, 1, 0, 0]), Ok(65536));
        assert_eq!(
            decode_nonneg(0x19, &[0; 9]),
            Err(DecodeError::InvalidInteger { typ: 0x19 })
        );
    }

    #[test]
    fn test_dehead_checks_length() {
        assert!(TLV::try_decode(&[7, 3, 1, 2]).is_err());
        let (tlv, len) = TLV::try_decode(&[7, 2, 1, 2, 9]).ok().unwrap();
        assert_eq!(tlv.typ, 7);
        assert_eq!(tlv.val, &[1, 2]);
        assert_eq!(len, 4);
    }

    #[test]
    fn test_parse_tlvs() {
        let mut buf = PrependBuffer::with_capacity(32);
        prepend_nonneg(0x19, 1000, &mut buf).ok().unwrap();
        prepend_tl(0x12, 0, &mut buf).ok().unwrap();
        let parsed: Vec<_> = parse_tlvs(buf.written()).map(|r| r.ok().unwrap()).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0.typ, 0x12);
        assert_eq!(parsed[0].1, 0..2);
        assert_eq!(parsed[1].0.val_as_u64(), Ok(1000));
    }

    proptest! {
        #[test]
        fn varint_round_trip(v in any::<u64>()) {
            let bytes = varint_bytes(v);
            let mut cursor = 0;
            prop_assert_eq!(read_varint(&bytes, &mut cursor), Ok(v));
            prop_assert_eq!(cursor, varint_len(v));
        }

        #[test]
        fn nonneg_round_trip(v in any::<u64>()) {
            let bytes = nonneg_bytes(v);
            prop_assert!(matches!(bytes.len(), 1 | 2 | 4 | 8));
            prop_assert_eq!(decode_nonneg(0, &bytes), Ok(v));
        }

        #[test]
        fn dehead_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = TLV::try_decode(&bytes);
            for item in parse_tlvs(&bytes) {
                let _ = item;
            }
        }
    }
}

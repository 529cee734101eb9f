// CCNx 1.0 fixed-width TLV packets.
//
// An 8 byte fixed header (version, packet type, packet length, hop limit,
//  return code, flags, header length) is followed by optional hop-by-hop
//  headers, one message TLV and optionally the validation TLVs. Types and
//  lengths are 16-bit big-endian throughout.

use core::ops::Range;

use crate::{
    encode::PrependBuffer,
    error::{DecodeError, EncodeError},
    name::{CompareMode, Name, NameComponent},
    packet::{Control, ContentFields, InterestFields, Packet, PacketKind, MAX_NAME_COMPONENTS},
    suite::Suite,
};

pub const VERSION: u8 = 1;
pub const FIXED_HEADER_LEN: usize = 8;
const HOP_LIMIT_OFFSET: usize = 4;

pub const PT_INTEREST: u8 = 0;
pub const PT_CONTENT: u8 = 1;
pub const PT_NACK: u8 = 2;
pub const PT_FRAGMENT: u8 = 3;

pub const INTEREST_HOP_LIMIT: u8 = 64;
pub const CONTENT_HOP_LIMIT: u8 = 255;

// Message TLVs
pub const M_INTEREST: u16 = 0x0001;
pub const M_OBJECT: u16 = 0x0002;
pub const VALIDATION_ALGORITHM: u16 = 0x0003;
pub const VALIDATION_PAYLOAD: u16 = 0x0004;

// Fields inside a message
pub const M_NAME: u16 = 0x0000;
pub const M_PAYLOAD: u16 = 0x0001;
pub const M_KEYID_RESTRICTION: u16 = 0x0002;
pub const M_OBJHASH_RESTRICTION: u16 = 0x0003;
pub const M_ENDCHUNK: u16 = 0x0019;

// Name segments
pub const N_NAME_SEGMENT: u16 = 0x0001;
pub const N_IPID: u16 = 0x0002;
pub const N_CHUNK: u16 = 0x0010;
pub const N_META: u16 = 0x0011;

// Inside the validation algorithm
pub const VA_HMAC_SHA256: u16 = 0x0004;
pub const VA_KEYID: u16 = 0x0009;

const TL_LEN: usize = 4;

// Reads the type and length at `offset` and returns the type together with
//  the range of the value.
pub fn dehead(bytes: &[u8], offset: usize) -> Result<(u16, Range<usize>), DecodeError> {
    let header = bytes
        .get(offset..offset + TL_LEN)
        .ok_or(DecodeError::Truncated {
            offset,
            needed: TL_LEN,
            available: bytes.len().saturating_sub(offset),
        })?;
    let typ = u16::from_be_bytes([header[0], header[1]]);
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;

    let start = offset + TL_LEN;
    if bytes.len() - start < len {
        return Err(DecodeError::Truncated {
            offset: start,
            needed: len,
            available: bytes.len() - start,
        });
    }
    Ok((typ, start..start + len))
}

// Consecutive TLVs within `range` of `bytes`.
struct Tlvs<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn tlvs(bytes: &[u8], range: Range<usize>) -> Tlvs<'_> {
    Tlvs {
        bytes: &bytes[..range.end],
        pos: range.start,
    }
}

impl Iterator for Tlvs<'_> {
    type Item = Result<(u16, Range<usize>), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        match dehead(self.bytes, self.pos) {
            Ok((typ, value)) => {
                self.pos = value.end;
                Some(Ok((typ, value)))
            }
            Err(err) => {
                self.pos = self.bytes.len();
                Some(Err(err))
            }
        }
    }
}

// Minimal network-order bytes of `val`; zero still takes one byte.
pub fn network_uint(val: u64) -> Vec<u8> {
    let bytes = val.to_be_bytes();
    let skip = (val.leading_zeros() as usize / 8).min(7);
    bytes[skip..].to_vec()
}

fn read_network_uint(typ: u16, val: &[u8]) -> Result<u32, DecodeError> {
    if val.len() > 4 {
        return Err(DecodeError::InvalidInteger { typ: typ as u64 });
    }
    Ok(val.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
}

// Parses the Name TLV at the start of `bytes`. Besides the name and its length
//  this yields an ENDChunk found inside a Meta segment.
pub(crate) fn parse_name(bytes: &[u8]) -> Result<(Name, usize, Option<u32>), DecodeError> {
    let (typ, value) = dehead(bytes, 0)?;
    if typ != M_NAME {
        return Err(DecodeError::UnexpectedType {
            typ: typ as u64,
            offset: 0,
        });
    }

    let mut components = Vec::new();
    let mut chunk = None;
    let mut end_chunk = None;
    for segment in tlvs(bytes, value.clone()) {
        let (typ, range) = segment?;
        match typ {
            N_META => {
                for field in tlvs(bytes, range) {
                    let (typ, range) = field?;
                    if typ == M_ENDCHUNK {
                        end_chunk = Some(read_network_uint(typ, &bytes[range])?);
                    }
                }
                continue;
            }
            N_CHUNK => chunk = Some(read_network_uint(typ, &bytes[range.clone()])?),
            _ => {}
        }
        if components.len() == MAX_NAME_COMPONENTS as usize {
            return Err(DecodeError::InvalidLength {
                typ: M_NAME as u64,
                len: components.len() + 1,
            });
        }
        components.push((typ, range));
    }

    let encoded: Box<[u8]> = bytes[..value.end].into();
    let name = Name::from_wire(Suite::CcnTlv, encoded, components, chunk);
    Ok((name, value.end, end_chunk))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<(Packet, usize), DecodeError> {
    let header = bytes
        .get(..FIXED_HEADER_LEN)
        .ok_or(DecodeError::Truncated {
            offset: 0,
            needed: FIXED_HEADER_LEN,
            available: bytes.len(),
        })?;
    if header[0] != VERSION {
        return Err(DecodeError::UnsupportedVersion(header[0]));
    }
    let (kind, message_type) = match header[1] {
        PT_INTEREST => (PacketKind::Interest, M_INTEREST),
        PT_CONTENT => (PacketKind::Content, M_OBJECT),
        other => return Err(DecodeError::UnknownPacketType(other as u64)),
    };
    let packet_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let header_len = header[7] as usize;
    if header_len < FIXED_HEADER_LEN || packet_len < header_len {
        return Err(DecodeError::InvalidLength {
            typ: header[1] as u64,
            len: header_len,
        });
    }
    if packet_len > bytes.len() {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: packet_len,
            available: bytes.len(),
        });
    }
    let bytes = &bytes[..packet_len];

    let mut control = Control {
        hop_limit: Some(header[HOP_LIMIT_OFFSET]),
        ..Control::default()
    };

    let (typ, message) = dehead(bytes, header_len)?;
    if typ != message_type {
        return Err(DecodeError::UnexpectedType {
            typ: typ as u64,
            offset: header_len,
        });
    }

    let mut name = None;
    let mut payload = None;
    for field in tlvs(bytes, message.clone()) {
        let (typ, range) = field?;
        match typ {
            M_NAME if name.is_none() => {
                let start = range.start - TL_LEN;
                let (parsed, _, end_chunk) = parse_name(&bytes[start..range.end])?;
                if control.final_block_id.is_none() {
                    control.final_block_id = end_chunk;
                }
                name = Some(parsed);
            }
            M_PAYLOAD => payload = Some(range),
            M_KEYID_RESTRICTION if control.publisher_digest.is_none() => {
                control.publisher_digest = Some(range);
            }
            M_ENDCHUNK => control.final_block_id = Some(read_network_uint(typ, &bytes[range])?),
            _ => {}
        }
    }

    // Validation follows the message; anything else is left over.
    let mut pos = message.end;
    while pos < bytes.len() {
        let (typ, range) = dehead(bytes, pos)?;
        match typ {
            VALIDATION_ALGORITHM => {
                if let Some(key_id) = validation_key_id(bytes, range.clone())? {
                    if control.publisher_digest.is_none() {
                        control.publisher_digest = Some(key_id);
                    }
                }
            }
            VALIDATION_PAYLOAD => {}
            _ => {
                return Err(DecodeError::TrailingBytes {
                    remaining: bytes.len() - pos,
                })
            }
        }
        pos = range.end;
    }

    let name = name.ok_or(DecodeError::MissingName)?;
    let packet = Packet::new(Suite::CcnTlv, kind, bytes.into(), name, payload, control);
    Ok((packet, packet_len))
}

// The key id sits inside whichever algorithm the validation section names.
fn validation_key_id(
    bytes: &[u8],
    range: Range<usize>,
) -> Result<Option<Range<usize>>, DecodeError> {
    for algorithm in tlvs(bytes, range) {
        let (_, inner) = algorithm?;
        for field in tlvs(bytes, inner) {
            let (typ, value) = field?;
            if typ == VA_KEYID {
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HopLimit {
    Forward(u8),
    Expired,
}

// Decrements the hop limit of an encoded packet in place.
pub fn decrement_hop_limit(bytes: &mut [u8]) -> HopLimit {
    match bytes.get_mut(HOP_LIMIT_OFFSET) {
        Some(hop) if *hop > 1 => {
            *hop -= 1;
            HopLimit::Forward(*hop)
        }
        Some(hop) => {
            *hop = 0;
            HopLimit::Expired
        }
        None => HopLimit::Expired,
    }
}

fn prepend_tl(typ: u16, len: usize, buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    let len = u16::try_from(len).map_err(|_| EncodeError::ValueTooLarge {
        typ: typ as u64,
        len,
    })?;
    let mut tl = [0u8; TL_LEN];
    tl[..2].copy_from_slice(&typ.to_be_bytes());
    tl[2..].copy_from_slice(&len.to_be_bytes());
    buf.prepend(&tl)
}

fn prepend_field(typ: u16, value: &[u8], buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    buf.prepend(value)?;
    prepend_tl(typ, value.len(), buf)
}

// Prepends the fixed header in front of everything written so far.
fn prepend_fixed_header(
    packet_type: u8,
    hop_limit: u8,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    let total = buf.len() + FIXED_HEADER_LEN;
    let total = u16::try_from(total).map_err(|_| EncodeError::ValueTooLarge {
        typ: packet_type as u64,
        len: total,
    })?;
    let [hi, lo] = total.to_be_bytes();
    buf.prepend(&[
        VERSION,
        packet_type,
        hi,
        lo,
        hop_limit,
        0,
        0,
        FIXED_HEADER_LEN as u8,
    ])
}

pub(crate) fn prepend_name(
    components: &[NameComponent<'_>],
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    let mark = buf.len();
    for component in components.iter().rev() {
        prepend_field(component.typ, component.bytes, buf)?;
    }
    prepend_tl(M_NAME, buf.len() - mark, buf)
}

// Scope, selectors, lifetime and freshness have no place in a CCNx interest
//  and are left out.
pub(crate) fn prepend_interest(
    name: &Name,
    fields: &InterestFields,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    let mark = buf.len();
    if let Some(digest) = &fields.publisher_digest {
        prepend_field(M_KEYID_RESTRICTION, digest, buf)?;
    }
    buf.prepend(name.key())?;
    prepend_tl(M_INTEREST, buf.len() - mark, buf)?;
    prepend_fixed_header(
        PT_INTEREST,
        fields.hop_limit.unwrap_or(INTEREST_HOP_LIMIT),
        buf,
    )
}

pub(crate) fn prepend_content(
    name: &Name,
    payload: &[u8],
    fields: &ContentFields,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    if let Some(key_id) = &fields.publisher_digest {
        prepend_tl(VALIDATION_PAYLOAD, 0, buf)?;
        let mark = buf.len();
        prepend_field(VA_KEYID, key_id, buf)?;
        prepend_tl(VA_HMAC_SHA256, buf.len() - mark, buf)?;
        prepend_tl(VALIDATION_ALGORITHM, buf.len() - mark, buf)?;
    }

    let mark = buf.len();
    prepend_field(M_PAYLOAD, payload, buf)?;
    if let Some(end_chunk) = fields.final_block_id {
        prepend_field(M_ENDCHUNK, &network_uint(end_chunk as u64), buf)?;
    }
    buf.prepend(name.key())?;
    prepend_tl(M_OBJECT, buf.len() - mark, buf)?;
    prepend_fixed_header(PT_CONTENT, CONTENT_HOP_LIMIT, buf)
}

// CCNx has no suffix selectors: a content object answers only the exact name.
pub(crate) fn matches(interest: &Packet, content: &Packet) -> bool {
    content
        .name()
        .compare(None, interest.name(), CompareMode::Exact)
        .is_some()
}

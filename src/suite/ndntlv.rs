// NDN packet format 0.1 (2013). Built on the variable-width TLV primitives in
//  the tlv module.

use core::ops::Range;

use crate::{
    encode::PrependBuffer,
    error::{DecodeError, EncodeError},
    name::{Name, NameComponent},
    packet::{Control, ContentFields, InterestFields, Packet, PacketKind, MAX_NAME_COMPONENTS},
    suite::Suite,
    tlv::{
        decode_nonneg, parse_tlvs, prepend_blob, prepend_nonneg, prepend_nonneg_value, prepend_tl,
        TLV,
    },
};

pub const INTEREST: u64 = 0x05;
pub const DATA: u64 = 0x06;
pub const NDNLP_FRAGMENT: u64 = 0x64;

pub(crate) const INTEREST_BYTE: u8 = INTEREST as u8;
pub(crate) const DATA_BYTE: u8 = DATA as u8;
pub(crate) const FRAGMENT_BYTE: u8 = NDNLP_FRAGMENT as u8;

pub const NAME: u64 = 0x07;
pub const NAME_COMPONENT: u64 = 0x08;
pub const SELECTORS: u64 = 0x09;
pub const NONCE: u64 = 0x0a;
pub const SCOPE: u64 = 0x0b;
pub const INTEREST_LIFETIME: u64 = 0x0c;
pub const MIN_SUFFIX_COMPONENTS: u64 = 0x0d;
pub const MAX_SUFFIX_COMPONENTS: u64 = 0x0e;
pub const PUBLISHER_PUBLIC_KEY_LOCATOR: u64 = 0x0f;
pub const EXCLUDE: u64 = 0x10;
pub const CHILD_SELECTOR: u64 = 0x11;
pub const MUST_BE_FRESH: u64 = 0x12;
pub const META_INFO: u64 = 0x14;
pub const CONTENT: u64 = 0x15;
pub const SIGNATURE_INFO: u64 = 0x16;
pub const SIGNATURE_VALUE: u64 = 0x17;
pub const CONTENT_TYPE: u64 = 0x18;
pub const FRESHNESS_PERIOD: u64 = 0x19;
pub const FINAL_BLOCK_ID: u64 = 0x1a;
pub const SIGNATURE_TYPE: u64 = 0x1b;
pub const KEY_LOCATOR: u64 = 0x1c;
pub const KEY_LOCATOR_DIGEST: u64 = 0x1d;

// A name component starting with this byte carries a segment number.
pub(crate) const SEGMENT_MARKER: u8 = 0x00;

const SIGNATURE_DIGEST_SHA256: u64 = 0;

// One element nested in another: its type, its whole extent and its value,
//  both as ranges into the packet.
struct Child {
    typ: u64,
    whole: Range<usize>,
    value: Range<usize>,
}

fn children(
    bytes: &[u8],
    range: Range<usize>,
) -> impl Iterator<Item = Result<Child, DecodeError>> + '_ {
    let base = range.start;
    parse_tlvs(&bytes[range]).map(move |item| {
        item.map(|(tlv, r)| {
            let value_start = r.end - tlv.val.len();
            Child {
                typ: tlv.typ,
                whole: base + r.start..base + r.end,
                value: base + value_start..base + r.end,
            }
        })
    })
}

fn read_u32(typ: u64, val: &[u8]) -> Result<u32, DecodeError> {
    u32::try_from(decode_nonneg(typ, val)?).map_err(|_| DecodeError::InvalidInteger { typ })
}

// The segment number of a component, if it is a segment component whose
//  number fits in 32 bits.
fn segment_number(component: &[u8]) -> Option<u32> {
    match component.split_first() {
        Some((&SEGMENT_MARKER, rest)) => read_u32(NAME_COMPONENT, rest).ok(),
        _ => None,
    }
}

pub(crate) fn segment_component(chunk: u32) -> Result<Vec<u8>, EncodeError> {
    let mut buf = PrependBuffer::with_capacity(9);
    prepend_nonneg_value(chunk as u64, &mut buf)?;
    buf.prepend_byte(SEGMENT_MARKER)?;
    Ok(buf.written().to_vec())
}

pub(crate) fn parse_name(bytes: &[u8]) -> Result<(Name, usize), DecodeError> {
    let (tlv, used) = TLV::try_decode(bytes)?;
    if tlv.typ != NAME {
        return Err(DecodeError::UnexpectedType {
            typ: tlv.typ,
            offset: 0,
        });
    }

    let mut components = Vec::new();
    for child in children(bytes, used - tlv.val.len()..used) {
        let child = child?;
        let typ = u16::try_from(child.typ).map_err(|_| DecodeError::UnexpectedType {
            typ: child.typ,
            offset: child.whole.start,
        })?;
        if components.len() == MAX_NAME_COMPONENTS as usize {
            return Err(DecodeError::InvalidLength {
                typ: NAME,
                len: components.len() + 1,
            });
        }
        components.push((typ, child.value));
    }

    let encoded: Box<[u8]> = bytes[..used].into();
    let mut name = Name::from_wire(Suite::NdnTlv, encoded, components, None);
    // Only a trailing segment component numbers the chunk. Flag markers are
    //  already gone, so it is looked up after them.
    let chunk = name
        .components()
        .last()
        .filter(|last| last.typ == NAME_COMPONENT as u16)
        .and_then(|last| segment_number(last.bytes));
    name.set_chunk(chunk);
    Ok((name, used))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<(Packet, usize), DecodeError> {
    let (outer, used) = TLV::try_decode(bytes)?;
    if outer.typ == NDNLP_FRAGMENT {
        // A link-layer fragment wrapping one complete packet
        let inner = &bytes[used - outer.val.len()..used];
        let (tlv, inner_used) = TLV::try_decode(inner)?;
        if tlv.typ == NDNLP_FRAGMENT {
            return Err(DecodeError::UnexpectedType {
                typ: tlv.typ,
                offset: used - outer.val.len(),
            });
        }
        if inner_used != inner.len() {
            return Err(DecodeError::TrailingBytes {
                remaining: inner.len() - inner_used,
            });
        }
        let (packet, _) = decode(inner)?;
        return Ok((packet, used));
    }

    let kind = match outer.typ {
        INTEREST => PacketKind::Interest,
        DATA => PacketKind::Content,
        other => return Err(DecodeError::UnknownPacketType(other)),
    };
    let bytes = &bytes[..used];

    let mut name = None;
    let mut payload = None;
    let mut control = Control::default();
    for child in children(bytes, used - outer.val.len()..used) {
        let Child { typ, whole, value } = child?;
        let val = &bytes[value.clone()];
        match typ {
            NAME if name.is_none() => name = Some(parse_name(&bytes[whole])?.0),
            SELECTORS => selectors(bytes, value, &mut control)?,
            NONCE if control.nonce.is_none() => control.nonce = Some(value),
            SCOPE => {
                let scope = decode_nonneg(typ, val)?;
                control.scope =
                    Some(u8::try_from(scope).map_err(|_| DecodeError::InvalidInteger { typ })?);
            }
            INTEREST_LIFETIME => control.interest_lifetime_ms = Some(decode_nonneg(typ, val)?),
            CONTENT => payload = Some(value),
            META_INFO => meta_info(bytes, value, &mut control)?,
            SIGNATURE_INFO => signature_info(bytes, value, &mut control)?,
            _ => {}
        }
    }

    let name = name.ok_or(DecodeError::MissingName)?;
    let packet = Packet::new(Suite::NdnTlv, kind, bytes.into(), name, payload, control);
    Ok((packet, used))
}

fn selectors(bytes: &[u8], range: Range<usize>, control: &mut Control) -> Result<(), DecodeError> {
    for child in children(bytes, range) {
        let Child { typ, value, .. } = child?;
        let val = &bytes[value.clone()];
        match typ {
            MIN_SUFFIX_COMPONENTS => control.min_suffix = read_u32(typ, val)?,
            MAX_SUFFIX_COMPONENTS => control.max_suffix = read_u32(typ, val)?,
            PUBLISHER_PUBLIC_KEY_LOCATOR if control.publisher_digest.is_none() => {
                control.publisher_digest = Some(value);
            }
            MUST_BE_FRESH => control.must_be_fresh = true,
            // Exclusion filters are not evaluated
            _ => {}
        }
    }
    Ok(())
}

fn meta_info(bytes: &[u8], range: Range<usize>, control: &mut Control) -> Result<(), DecodeError> {
    for child in children(bytes, range) {
        let Child { typ, value, .. } = child?;
        match typ {
            FRESHNESS_PERIOD => {
                control.freshness_period_ms = Some(decode_nonneg(typ, &bytes[value])?);
            }
            FINAL_BLOCK_ID => {
                if let Some(component) = children(bytes, value).next() {
                    let component = component?;
                    if component.typ == NAME_COMPONENT {
                        control.final_block_id = segment_number(&bytes[component.value]);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn signature_info(
    bytes: &[u8],
    range: Range<usize>,
    control: &mut Control,
) -> Result<(), DecodeError> {
    for child in children(bytes, range) {
        let child = child?;
        if child.typ != KEY_LOCATOR {
            continue;
        }
        for locator in children(bytes, child.value) {
            let locator = locator?;
            if locator.typ == KEY_LOCATOR_DIGEST && control.publisher_digest.is_none() {
                control.publisher_digest = Some(locator.value);
            }
        }
    }
    Ok(())
}

pub(crate) fn prepend_name(
    components: &[NameComponent<'_>],
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    let mark = buf.len();
    for component in components.iter().rev() {
        prepend_blob(component.typ as u64, component.bytes, buf)?;
    }
    prepend_tl(NAME, buf.len() - mark, buf)
}

// Answer-origin-kind and hop limits have no NDN form and are left out.
pub(crate) fn prepend_interest(
    name: &Name,
    fields: &InterestFields,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    let mark = buf.len();
    if let Some(scope) = fields.scope {
        prepend_nonneg(SCOPE, scope as u64, buf)?;
    }
    if let Some(lifetime) = fields.lifetime_ms {
        prepend_nonneg(INTEREST_LIFETIME, lifetime, buf)?;
    }
    if let Some(nonce) = &fields.nonce {
        prepend_blob(NONCE, nonce, buf)?;
    }

    let selectors = buf.len();
    if fields.must_be_fresh {
        prepend_tl(MUST_BE_FRESH, 0, buf)?;
    }
    if let Some(digest) = &fields.publisher_digest {
        prepend_blob(PUBLISHER_PUBLIC_KEY_LOCATOR, digest, buf)?;
    }
    if let Some(max) = fields.max_suffix {
        prepend_nonneg(MAX_SUFFIX_COMPONENTS, max as u64, buf)?;
    }
    if let Some(min) = fields.min_suffix {
        prepend_nonneg(MIN_SUFFIX_COMPONENTS, min as u64, buf)?;
    }
    if buf.len() > selectors {
        prepend_tl(SELECTORS, buf.len() - selectors, buf)?;
    }

    buf.prepend(name.key())?;
    prepend_tl(INTEREST, buf.len() - mark, buf)
}

pub(crate) fn prepend_content(
    name: &Name,
    payload: &[u8],
    fields: &ContentFields,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    let mark = buf.len();
    prepend_tl(SIGNATURE_VALUE, 0, buf)?;

    let signature_info = buf.len();
    if let Some(digest) = &fields.publisher_digest {
        prepend_blob(KEY_LOCATOR_DIGEST, digest, buf)?;
        prepend_tl(KEY_LOCATOR, buf.len() - signature_info, buf)?;
    }
    prepend_nonneg(SIGNATURE_TYPE, SIGNATURE_DIGEST_SHA256, buf)?;
    prepend_tl(SIGNATURE_INFO, buf.len() - signature_info, buf)?;

    prepend_blob(CONTENT, payload, buf)?;

    let meta_info = buf.len();
    if let Some(last) = fields.final_block_id {
        let final_block = buf.len();
        prepend_blob(NAME_COMPONENT, &segment_component(last)?, buf)?;
        prepend_tl(FINAL_BLOCK_ID, buf.len() - final_block, buf)?;
    }
    if let Some(freshness) = fields.freshness_period_ms {
        prepend_nonneg(FRESHNESS_PERIOD, freshness, buf)?;
    }
    prepend_tl(META_INFO, buf.len() - meta_info, buf)?;

    buf.prepend(name.key())?;
    prepend_tl(DATA, buf.len() - mark, buf)
}

pub(crate) fn matches(interest: &Packet, content: &Packet, stale: bool) -> bool {
    let control = interest.control();
    if control.must_be_fresh && stale {
        return false;
    }
    interest.name().is_prefix_of_content(
        control.min_suffix,
        control.max_suffix,
        content.name(),
        || content.digest(),
    )
}

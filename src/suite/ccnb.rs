// CCNB, the binary XML encoding of early CCNx.
//
// Every element starts with a header carrying a number and a 3-bit type. The
//  number is spread over 7-bit groups, most significant first; the last header
//  byte has its high bit set and holds the low 4 bits of the number next to the
//  type. A single zero byte closes the innermost open element.

use core::ops::Range;

use crate::{
    encode::PrependBuffer,
    error::{DecodeError, EncodeError},
    name::{Name, NameComponent},
    packet::{Control, ContentFields, InterestFields, Packet, PacketKind, MAX_NAME_COMPONENTS},
    suite::Suite,
};

pub const TT_TAG: u8 = 1;
pub const TT_DTAG: u8 = 2;
pub const TT_ATTR: u8 = 3;
pub const TT_DATTR: u8 = 4;
pub const TT_BLOB: u8 = 5;
pub const TT_UDATA: u8 = 6;

pub const DTAG_NAME: u64 = 14;
pub const DTAG_COMPONENT: u64 = 15;
pub const DTAG_CONTENT: u64 = 19;
pub const DTAG_INTEREST: u64 = 26;
pub const DTAG_NONCE: u64 = 41;
pub const DTAG_SCOPE: u64 = 42;
pub const DTAG_EXCLUDE: u64 = 43;
pub const DTAG_ANSWERORIGINKIND: u64 = 47;
pub const DTAG_SIGNEDINFO: u64 = 57;
pub const DTAG_FRESHNESS: u64 = 58;
pub const DTAG_FINALBLOCKID: u64 = 59;
pub const DTAG_PUBPUBKDIGEST: u64 = 60;
pub const DTAG_CONTENTOBJ: u64 = 64;
pub const DTAG_MINSUFFCOMP: u64 = 83;
pub const DTAG_MAXSUFFCOMP: u64 = 84;

// Answer-origin-kind bit allowing stale content to be returned.
const AOK_STALE: u32 = 4;

// A header never spans more bytes than an int: three 7-bit groups and the
//  terminal byte, so numbers are limited to 25 bits.
const MAX_HEADER_LEN: usize = 4;
pub const MAX_HEADER_NUM: u64 = (1 << (7 * (MAX_HEADER_LEN - 1) + 4)) - 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Head {
    End,
    Element { num: u64, tt: u8 },
}

// Reads the header at `offset` and returns it with the number of bytes it took.
pub fn dehead(bytes: &[u8], offset: usize) -> Result<(Head, usize), DecodeError> {
    let rest = bytes.get(offset..).unwrap_or_default();
    match rest.first() {
        None => {
            return Err(DecodeError::Truncated {
                offset,
                needed: 1,
                available: 0,
            })
        }
        Some(0) => return Ok((Head::End, 1)),
        Some(_) => {}
    }

    let mut acc = 0u64;
    for (i, b) in rest.iter().take(MAX_HEADER_LEN).enumerate() {
        if b & 0x80 != 0 {
            let num = (acc << 4) | ((b >> 3) & 0x0f) as u64;
            return Ok((Head::Element { num, tt: b & 0x07 }, i + 1));
        }
        acc = (acc << 7) | *b as u64;
    }
    Err(DecodeError::MissingTerminator {
        offset,
        window: MAX_HEADER_LEN,
    })
}

pub fn prepend_header(num: u64, tt: u8, buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    if num > MAX_HEADER_NUM {
        return Err(EncodeError::NumberTooLarge {
            num,
            max: MAX_HEADER_NUM,
        });
    }
    let mut scratch = [0u8; MAX_HEADER_LEN];
    let mut at = scratch.len() - 1;
    scratch[at] = 0x80 | (((num & 0x0f) as u8) << 3) | (tt & 0x07);
    let mut rest = num >> 4;
    while rest > 0 {
        at -= 1;
        scratch[at] = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    buf.prepend(&scratch[at..])
}

fn prepend_end(buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    buf.prepend_byte(0)
}

// DTAG(dtag) BLOB/UDATA(value) End
fn prepend_leaf(
    dtag: u64,
    tt: u8,
    value: &[u8],
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    prepend_end(buf)?;
    buf.prepend(value)?;
    prepend_header(value.len() as u64, tt, buf)?;
    prepend_header(dtag, TT_DTAG, buf)
}

fn prepend_decimal(dtag: u64, val: u64, buf: &mut PrependBuffer) -> Result<(), EncodeError> {
    prepend_leaf(dtag, TT_UDATA, val.to_string().as_bytes(), buf)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn head(&mut self) -> Result<Head, DecodeError> {
        let (head, len) = dehead(self.bytes, self.pos)?;
        self.pos += len;
        Ok(head)
    }

    fn take(&mut self, len: u64) -> Result<Range<usize>, DecodeError> {
        let available = self.bytes.len() - self.pos;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= available)
            .ok_or(DecodeError::Truncated {
                offset: self.pos,
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                available,
            })?;
        let range = self.pos..self.pos + len;
        self.pos += len;
        Ok(range)
    }

    // Walks to the End closing the element whose header was just read and
    //  returns the last BLOB or UDATA seen on the way, at any depth.
    fn element_value(&mut self) -> Result<Option<Range<usize>>, DecodeError> {
        let mut depth = 1usize;
        let mut value = None;
        while depth > 0 {
            let offset = self.pos;
            match self.head()? {
                Head::End => depth -= 1,
                Head::Element {
                    num,
                    tt: TT_BLOB | TT_UDATA,
                } => value = Some(self.take(num)?),
                Head::Element {
                    tt: TT_DTAG | TT_DATTR,
                    ..
                } => depth += 1,
                Head::Element { tt, .. } => {
                    return Err(DecodeError::UnexpectedType {
                        typ: tt as u64,
                        offset,
                    })
                }
            }
        }
        Ok(value)
    }

    fn text(&self, range: &Range<usize>) -> &'a [u8] {
        &self.bytes[range.clone()]
    }

    // Skips whatever element a header announced.
    fn skip(&mut self, head: Head, offset: usize) -> Result<(), DecodeError> {
        match head {
            Head::End => Ok(()),
            Head::Element {
                num,
                tt: TT_BLOB | TT_UDATA,
            } => self.take(num).map(|_| ()),
            Head::Element {
                tt: TT_DTAG | TT_DATTR,
                ..
            } => self.element_value().map(|_| ()),
            Head::Element { tt, .. } => Err(DecodeError::UnexpectedType {
                typ: tt as u64,
                offset,
            }),
        }
    }

    fn signed_info(&mut self, control: &mut Control) -> Result<(), DecodeError> {
        loop {
            let offset = self.pos;
            match self.head()? {
                Head::End => return Ok(()),
                Head::Element {
                    num: DTAG_PUBPUBKDIGEST,
                    tt: TT_DTAG,
                } => {
                    let value = self.element_value()?;
                    if control.publisher_digest.is_none() {
                        control.publisher_digest = value;
                    }
                }
                Head::Element {
                    num: DTAG_FRESHNESS,
                    tt: TT_DTAG,
                } => {
                    let value = self.element_value()?;
                    if let Some(seconds) = value.and_then(|v| parse_decimal(self.text(&v))) {
                        control.freshness_period_ms = Some(seconds as u64 * 1000);
                    }
                }
                head => self.skip(head, offset)?,
            }
        }
    }
}

// Counts are decimal text. Anything else leaves the field at its default.
fn parse_decimal(text: &[u8]) -> Option<u32> {
    if text.is_empty() {
        return None;
    }
    text.iter().try_fold(0u32, |acc, d| {
        if !d.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((d - b'0') as u32)
    })
}

// Scope is a single decimal digit; anything else is treated as unscoped.
fn parse_scope(text: &[u8]) -> Option<u8> {
    match text {
        [d] if d.is_ascii_digit() => Some(d - b'0'),
        _ => None,
    }
}

pub(crate) fn parse_name(bytes: &[u8]) -> Result<(Name, usize), DecodeError> {
    let mut r = Reader::new(bytes);
    match r.head()? {
        Head::Element {
            num: DTAG_NAME,
            tt: TT_DTAG,
        } => {}
        Head::Element { num, .. } => return Err(DecodeError::UnexpectedType { typ: num, offset: 0 }),
        Head::End => return Err(DecodeError::MissingName),
    }

    let mut components = Vec::new();
    loop {
        let offset = r.pos;
        match r.head()? {
            Head::End => break,
            Head::Element {
                num: DTAG_COMPONENT,
                tt: TT_DTAG,
            } => {
                let range = r.element_value()?.unwrap_or(0..0);
                if components.len() == MAX_NAME_COMPONENTS as usize {
                    return Err(DecodeError::InvalidLength {
                        typ: DTAG_NAME,
                        len: components.len() + 1,
                    });
                }
                components.push((DTAG_COMPONENT as u16, range));
            }
            head => r.skip(head, offset)?,
        }
    }

    let encoded: Box<[u8]> = bytes[..r.pos].into();
    Ok((Name::from_wire(Suite::Ccnb, encoded, components, None), r.pos))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<(Packet, usize), DecodeError> {
    let mut r = Reader::new(bytes);
    let kind = match r.head()? {
        Head::Element {
            num: DTAG_INTEREST,
            tt: TT_DTAG,
        } => PacketKind::Interest,
        Head::Element {
            num: DTAG_CONTENTOBJ,
            tt: TT_DTAG,
        } => PacketKind::Content,
        Head::Element { num, .. } => return Err(DecodeError::UnknownPacketType(num)),
        Head::End => return Err(DecodeError::UnexpectedType { typ: 0, offset: 0 }),
    };

    let mut name = None;
    let mut payload = None;
    let mut control = Control::default();
    loop {
        let start = r.pos;
        let head = r.head()?;
        let num = match head {
            Head::End => break,
            Head::Element { num, tt: TT_DTAG } => num,
            Head::Element { tt: TT_DATTR, .. } => {
                r.skip(head, start)?;
                continue;
            }
            // Bare values belong inside an element
            Head::Element { tt, .. } => {
                return Err(DecodeError::UnexpectedType {
                    typ: tt as u64,
                    offset: start,
                })
            }
        };

        match num {
            DTAG_NAME if name.is_none() => {
                let (parsed, len) = parse_name(&bytes[start..])?;
                r.pos = start + len;
                name = Some(parsed);
            }
            DTAG_CONTENT => payload = r.element_value()?,
            DTAG_SCOPE => {
                control.scope = r.element_value()?.and_then(|v| parse_scope(r.text(&v)));
            }
            DTAG_ANSWERORIGINKIND | DTAG_MINSUFFCOMP | DTAG_MAXSUFFCOMP => {
                let value = r.element_value()?;
                if let Some(val) = value.and_then(|v| parse_decimal(r.text(&v))) {
                    match num {
                        DTAG_ANSWERORIGINKIND => control.answer_origin_kind = val,
                        DTAG_MINSUFFCOMP => control.min_suffix = val,
                        _ => control.max_suffix = val,
                    }
                }
            }
            DTAG_NONCE => {
                let value = r.element_value()?;
                if control.nonce.is_none() {
                    control.nonce = value;
                }
            }
            DTAG_PUBPUBKDIGEST => {
                let value = r.element_value()?;
                if control.publisher_digest.is_none() {
                    control.publisher_digest = value;
                }
            }
            DTAG_SIGNEDINFO => r.signed_info(&mut control)?,
            _ => r.skip(head, start)?,
        }
    }

    let name = name.ok_or(DecodeError::MissingName)?;
    let packet = Packet::new(
        Suite::Ccnb,
        kind,
        bytes[..r.pos].into(),
        name,
        payload,
        control,
    );
    Ok((packet, r.pos))
}

pub(crate) fn prepend_name(
    components: &[NameComponent<'_>],
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    prepend_end(buf)?;
    for component in components.iter().rev() {
        prepend_leaf(DTAG_COMPONENT, TT_BLOB, component.bytes, buf)?;
    }
    prepend_header(DTAG_NAME, TT_DTAG, buf)
}

// Lifetime, freshness requirements and hop limits have no CCNB form and are
//  left out.
pub(crate) fn prepend_interest(
    name: &Name,
    fields: &InterestFields,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    prepend_end(buf)?;
    if let Some(nonce) = &fields.nonce {
        prepend_leaf(DTAG_NONCE, TT_BLOB, nonce, buf)?;
    }
    if let Some(scope) = fields.scope {
        prepend_decimal(DTAG_SCOPE, scope as u64, buf)?;
    }
    if let Some(aok) = fields.answer_origin_kind {
        prepend_decimal(DTAG_ANSWERORIGINKIND, aok as u64, buf)?;
    }
    if let Some(digest) = &fields.publisher_digest {
        prepend_leaf(DTAG_PUBPUBKDIGEST, TT_BLOB, digest, buf)?;
    }
    if let Some(max) = fields.max_suffix {
        prepend_decimal(DTAG_MAXSUFFCOMP, max as u64, buf)?;
    }
    if let Some(min) = fields.min_suffix {
        prepend_decimal(DTAG_MINSUFFCOMP, min as u64, buf)?;
    }
    buf.prepend(name.key())?;
    prepend_header(DTAG_INTEREST, TT_DTAG, buf)
}

pub(crate) fn prepend_content(
    name: &Name,
    payload: &[u8],
    fields: &ContentFields,
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    prepend_end(buf)?;
    prepend_leaf(DTAG_CONTENT, TT_BLOB, payload, buf)?;

    if fields.publisher_digest.is_some() || fields.freshness_period_ms.is_some() {
        prepend_end(buf)?;
        if let Some(ms) = fields.freshness_period_ms {
            prepend_decimal(DTAG_FRESHNESS, ms / 1000, buf)?;
        }
        if let Some(digest) = &fields.publisher_digest {
            prepend_leaf(DTAG_PUBPUBKDIGEST, TT_BLOB, digest, buf)?;
        }
        prepend_header(DTAG_SIGNEDINFO, TT_DTAG, buf)?;
    }

    buf.prepend(name.key())?;
    prepend_header(DTAG_CONTENTOBJ, TT_DTAG, buf)
}

pub(crate) fn matches(interest: &Packet, content: &Packet, stale: bool) -> bool {
    let control = interest.control();
    if stale && control.answer_origin_kind & AOK_STALE == 0 {
        return false;
    }
    interest.name().is_prefix_of_content(
        control.min_suffix,
        control.max_suffix,
        content.name(),
        || content.digest(),
    )
}

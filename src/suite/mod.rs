pub mod ccnb;
pub mod ccntlv;
pub mod ndntlv;

use core::fmt;

use crate::{
    encode::PrependBuffer,
    error::{DecodeError, EncodeError},
    name::{CompareMode, Name, NameComponent},
    packet::{ContentFields, InterestFields, Packet},
};

// The three wire encodings a relay understands. The forwarding logic is the
//  same for all of them; only decoding, encoding and the "does this content
//  satisfy this interest" predicate differ.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suite {
    Ccnb,
    CcnTlv,
    NdnTlv,
}

impl Suite {
    pub const ALL: [Suite; 3] = [Suite::Ccnb, Suite::CcnTlv, Suite::NdnTlv];

    pub fn id(self) -> u8 {
        match self {
            Suite::Ccnb => 1,
            Suite::CcnTlv => 2,
            Suite::NdnTlv => 6,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Suite::Ccnb => "ccnb",
            Suite::CcnTlv => "ccnx2015",
            Suite::NdnTlv => "ndn2013",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn default_port(self) -> u16 {
        match self {
            Suite::Ccnb | Suite::CcnTlv => 9695,
            Suite::NdnTlv => 6363,
        }
    }

    // Code used after the switch marker to announce the encoding explicitly.
    pub fn switch_code(self) -> u8 {
        match self {
            Suite::Ccnb => 0,
            Suite::NdnTlv => 1,
            Suite::CcnTlv => 2,
        }
    }

    pub fn from_switch_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.switch_code() == code)
    }

    pub(crate) fn default_component_type(self) -> u16 {
        match self {
            Suite::Ccnb => ccnb::DTAG_COMPONENT as u16,
            Suite::CcnTlv => ccntlv::N_NAME_SEGMENT,
            Suite::NdnTlv => ndntlv::NAME_COMPONENT as u16,
        }
    }

    // Guesses the encoding from the first bytes of a packet.
    pub fn detect(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes {
            [] => Err(DecodeError::EmptyPacket),
            // A CCNB content object starts with DTAG(64)
            [0x04, ..] => Ok(Suite::Ccnb),
            // CCNx fixed header: version 1 followed by a known packet type,
            //  everything else starting with 0x01 is a CCNB interest DTAG(26)
            [0x01, 0..=3, ..] => Ok(Suite::CcnTlv),
            [0x01, ..] => Ok(Suite::Ccnb),
            [ndntlv::INTEREST_BYTE | ndntlv::DATA_BYTE | ndntlv::FRAGMENT_BYTE, ..] => {
                Ok(Suite::NdnTlv)
            }
            [other, ..] => Err(DecodeError::UnsupportedSuite(*other)),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const SWITCH_MARKER: u8 = 0x80;

pub fn encode_switch(suite: Suite) -> [u8; 2] {
    [SWITCH_MARKER, suite.switch_code()]
}

// Reads an optional switch prefix. Returns the announced suite, if any, and the
//  number of bytes the prefix took.
pub fn read_switch(bytes: &[u8]) -> Result<(Option<Suite>, usize), DecodeError> {
    match bytes {
        [SWITCH_MARKER, code, ..] => {
            let suite = (*code < 253)
                .then(|| Suite::from_switch_code(*code))
                .flatten()
                .ok_or(DecodeError::UnsupportedSuite(*code))?;
            Ok((Some(suite), 2))
        }
        [SWITCH_MARKER] => Err(DecodeError::Truncated {
            offset: 1,
            needed: 1,
            available: 0,
        }),
        _ => Ok((None, 0)),
    }
}

// Decodes the first packet in `bytes`, which may be preceded by a switch prefix.
// Returns the packet and the number of bytes consumed, so that callers can walk
//  a datagram carrying several packets back to back.
pub fn decode(bytes: &[u8]) -> Result<(Packet, usize), DecodeError> {
    let (announced, skip) = read_switch(bytes)?;
    let rest = &bytes[skip..];
    let suite = match announced {
        Some(suite) => suite,
        None => Suite::detect(rest)?,
    };
    let (packet, used) = decode_as(suite, rest)?;
    Ok((packet, skip + used))
}

pub fn decode_as(suite: Suite, bytes: &[u8]) -> Result<(Packet, usize), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPacket);
    }
    match suite {
        Suite::Ccnb => ccnb::decode(bytes),
        Suite::CcnTlv => ccntlv::decode(bytes),
        Suite::NdnTlv => ndntlv::decode(bytes),
    }
}

// Headroom for everything in a packet except the name, payload and the
//  variable-length fields accounted for separately.
const ENCODING_HEADROOM: usize = 128;

pub fn encode_interest(name: &Name, fields: &InterestFields) -> Result<Box<[u8]>, EncodeError> {
    let capacity = ENCODING_HEADROOM
        + name.key().len()
        + fields.nonce.as_ref().map_or(0, |n| n.len())
        + fields.publisher_digest.as_ref().map_or(0, |d| d.len());
    let mut buf = PrependBuffer::with_capacity(capacity);
    match name.suite() {
        Suite::Ccnb => ccnb::prepend_interest(name, fields, &mut buf)?,
        Suite::CcnTlv => ccntlv::prepend_interest(name, fields, &mut buf)?,
        Suite::NdnTlv => ndntlv::prepend_interest(name, fields, &mut buf)?,
    }
    Ok(buf.into_bytes())
}

pub fn encode_content(
    name: &Name,
    payload: &[u8],
    fields: &ContentFields,
) -> Result<Box<[u8]>, EncodeError> {
    let capacity = ENCODING_HEADROOM
        + name.key().len()
        + payload.len()
        + fields.publisher_digest.as_ref().map_or(0, |d| d.len());
    let mut buf = PrependBuffer::with_capacity(capacity);
    match name.suite() {
        Suite::Ccnb => ccnb::prepend_content(name, payload, fields, &mut buf)?,
        Suite::CcnTlv => ccntlv::prepend_content(name, payload, fields, &mut buf)?,
        Suite::NdnTlv => ndntlv::prepend_content(name, payload, fields, &mut buf)?,
    }
    Ok(buf.into_bytes())
}

pub(crate) fn prepend_name(
    suite: Suite,
    components: &[NameComponent<'_>],
    buf: &mut PrependBuffer,
) -> Result<(), EncodeError> {
    match suite {
        Suite::Ccnb => ccnb::prepend_name(components, buf),
        Suite::CcnTlv => ccntlv::prepend_name(components, buf),
        Suite::NdnTlv => ndntlv::prepend_name(components, buf),
    }
}

// Parses a name element at the start of `bytes`.
pub(crate) fn parse_name(suite: Suite, bytes: &[u8]) -> Result<(Name, usize), DecodeError> {
    match suite {
        Suite::Ccnb => ccnb::parse_name(bytes),
        Suite::CcnTlv => ccntlv::parse_name(bytes).map(|(name, len, _)| (name, len)),
        Suite::NdnTlv => ndntlv::parse_name(bytes),
    }
}

pub(crate) fn chunk_component(suite: Suite, chunk: u32) -> Result<(u16, Vec<u8>), EncodeError> {
    match suite {
        Suite::Ccnb => Err(EncodeError::UnsupportedField("chunk number")),
        Suite::CcnTlv => Ok((ccntlv::N_CHUNK, ccntlv::network_uint(chunk as u64))),
        Suite::NdnTlv => {
            ndntlv::segment_component(chunk).map(|bytes| (ndntlv::NAME_COMPONENT as u16, bytes))
        }
    }
}

pub(crate) fn is_chunk_component(suite: Suite, component: NameComponent<'_>) -> bool {
    match suite {
        Suite::Ccnb => false,
        Suite::CcnTlv => component.typ == ccntlv::N_CHUNK,
        Suite::NdnTlv => {
            component.typ == ndntlv::NAME_COMPONENT as u16
                && component.bytes.first() == Some(&ndntlv::SEGMENT_MARKER)
        }
    }
}

// Knobs of the matching predicates that differ between deployments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchRules {
    // CCNx interests may restrict the publisher key id. Some relays ignore
    //  the restriction; we honour it unless told otherwise.
    pub check_ccnx_key_id: bool,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            check_ccnx_key_id: true,
        }
    }
}

impl MatchRules {
    fn checks_digest(&self, suite: Suite) -> bool {
        suite != Suite::CcnTlv || self.check_ccnx_key_id
    }
}

// Whether `content` satisfies `interest`. `stale` tells whether the cached copy
//  has outlived its freshness period.
pub fn content_matches(
    interest: &Packet,
    content: &Packet,
    stale: bool,
    rules: &MatchRules,
) -> bool {
    if interest.suite() != content.suite() {
        return false;
    }
    if rules.checks_digest(interest.suite()) {
        if let Some(wanted) = interest.publisher_digest() {
            if content.publisher_digest() != Some(wanted) {
                return false;
            }
        }
    }
    match interest.suite() {
        Suite::Ccnb => ccnb::matches(interest, content, stale),
        Suite::CcnTlv => ccntlv::matches(interest, content),
        Suite::NdnTlv => ndntlv::matches(interest, content, stale),
    }
}

// Whether two interests are the same request for the purposes of aggregation:
//  exact name, same suffix bounds and the same (or no) publisher digest.
pub fn same_interest(a: &Packet, b: &Packet, rules: &MatchRules) -> bool {
    if a.suite() != b.suite() || a.name().compare(None, b.name(), CompareMode::Exact).is_none() {
        return false;
    }
    let (ca, cb) = (a.control(), b.control());
    if ca.min_suffix != cb.min_suffix || ca.max_suffix != cb.max_suffix {
        return false;
    }
    !rules.checks_digest(a.suite()) || a.publisher_digest() == b.publisher_digest()
}

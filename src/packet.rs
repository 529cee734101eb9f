use core::ops::Range;

use crate::{
    hash::packet_digest,
    name::Name,
    suite::{
        ccntlv::{self, HopLimit},
        Suite,
    },
};

// Interests may restrict how many components follow their prefix; without a
//  restriction any name up to this length is acceptable.
pub const MAX_NAME_COMPONENTS: u32 = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Interest,
    Content,
}

// Everything besides the name that a decoder extracts from a packet.
// Byte-string fields are kept as ranges into the packet buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Control {
    pub scope: Option<u8>,
    pub answer_origin_kind: u32,
    pub min_suffix: u32,
    pub max_suffix: u32,
    pub nonce: Option<Range<usize>>,
    pub publisher_digest: Option<Range<usize>>,
    pub must_be_fresh: bool,
    pub interest_lifetime_ms: Option<u64>,
    pub freshness_period_ms: Option<u64>,
    pub final_block_id: Option<u32>,
    pub hop_limit: Option<u8>,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            scope: None,
            answer_origin_kind: 3,
            min_suffix: 0,
            max_suffix: MAX_NAME_COMPONENTS,
            nonce: None,
            publisher_digest: None,
            must_be_fresh: false,
            interest_lifetime_ms: None,
            freshness_period_ms: None,
            final_block_id: None,
            hop_limit: None,
        }
    }
}

// One decoded packet. The buffer holds exactly the bytes the packet occupied
//  on the wire and is never resized; all views into it are ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    suite: Suite,
    kind: PacketKind,
    bytes: Box<[u8]>,
    name: Name,
    payload: Option<Range<usize>>,
    control: Control,
}

impl Packet {
    pub(crate) fn new(
        suite: Suite,
        kind: PacketKind,
        bytes: Box<[u8]>,
        name: Name,
        payload: Option<Range<usize>>,
        control: Control,
    ) -> Self {
        Self {
            suite,
            kind,
            bytes,
            name,
            payload,
            control,
        }
    }

    pub fn suite(&self) -> Suite {
        self.suite
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn is_interest(&self) -> bool {
        self.kind == PacketKind::Interest
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.view(&self.payload)
    }

    pub fn nonce(&self) -> Option<&[u8]> {
        self.view(&self.control.nonce)
    }

    pub fn publisher_digest(&self) -> Option<&[u8]> {
        self.view(&self.control.publisher_digest)
    }

    fn view(&self, range: &Option<Range<usize>>) -> Option<&[u8]> {
        range.as_ref().and_then(|r| self.bytes.get(r.clone()))
    }

    // Only CCNB interests can ask not to be answered from caches.
    pub fn honors_cache(&self) -> bool {
        match self.suite {
            Suite::Ccnb => self.control.answer_origin_kind & 1 == 1,
            _ => true,
        }
    }

    // Low scopes are link-local: such interests are recorded but never
    //  propagated further.
    pub fn forwarding_permitted(&self) -> bool {
        self.control.scope.map_or(true, |scope| scope > 2)
    }

    pub fn digest(&self) -> Option<[u8; 32]> {
        packet_digest(&self.bytes).map(|d| d.0)
    }

    // CCNx packets carry a hop limit in their fixed header which is decremented
    //  in the wire bytes themselves, so a forwarded copy carries the new value.
    // Other suites have no hop limit and give None.
    pub fn decrement_hop_limit(&mut self) -> Option<HopLimit> {
        if self.suite != Suite::CcnTlv {
            return None;
        }
        let outcome = ccntlv::decrement_hop_limit(&mut self.bytes);
        self.control.hop_limit = match outcome {
            HopLimit::Forward(hop) => Some(hop),
            HopLimit::Expired => Some(0),
        };
        Some(outcome)
    }
}

// Optional interest fields used when encoding. Fields a suite has no place for
//  are left out of the encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterestFields {
    pub nonce: Option<Vec<u8>>,
    pub scope: Option<u8>,
    pub answer_origin_kind: Option<u32>,
    pub min_suffix: Option<u32>,
    pub max_suffix: Option<u32>,
    pub publisher_digest: Option<Vec<u8>>,
    pub must_be_fresh: bool,
    pub lifetime_ms: Option<u64>,
    pub hop_limit: Option<u8>,
}

impl InterestFields {
    pub fn with_nonce(mut self, nonce: &[u8]) -> Self {
        self.nonce = Some(nonce.to_vec());
        self
    }

    pub fn with_scope(mut self, scope: u8) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_publisher_digest(mut self, digest: &[u8]) -> Self {
        self.publisher_digest = Some(digest.to_vec());
        self
    }

    pub fn with_suffix_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_suffix = Some(min);
        self.max_suffix = Some(max);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentFields {
    pub freshness_period_ms: Option<u64>,
    pub final_block_id: Option<u32>,
    pub publisher_digest: Option<Vec<u8>>,
}

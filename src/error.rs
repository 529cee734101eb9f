use thiserror::Error;

// Decoding runs on bytes straight off the wire, so every failure here is
//  expected in normal operation: the forwarder drops the packet and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet is empty")]
    EmptyPacket,

    #[error("truncated field at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("no terminal header byte within {window} bytes at offset {offset}")]
    MissingTerminator { offset: usize, window: usize },

    #[error("invalid length {len} for type {typ:#x}")]
    InvalidLength { typ: u64, len: usize },

    #[error("unexpected type {typ:#x} at offset {offset}")]
    UnexpectedType { typ: u64, offset: usize },

    #[error("integer field of type {typ:#x} is not a valid number")]
    InvalidInteger { typ: u64 },

    #[error("variable-length integer is not minimally encoded")]
    NonMinimalVarint,

    #[error("{remaining} bytes left over after the packet")]
    TrailingBytes { remaining: usize },

    #[error("packet carries no name")]
    MissingName,

    #[error("unsupported suite discriminant {0:#04x}")]
    UnsupportedSuite(u8),

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown packet type {0:#x}")]
    UnknownPacketType(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("scratch buffer too short: needed {needed} bytes, {available} available")]
    BufferTooShort { needed: usize, available: usize },

    #[error("value of {len} bytes does not fit field type {typ:#x}")]
    ValueTooLarge { typ: u64, len: usize },

    #[error("number {num} exceeds the header limit of {max}")]
    NumberTooLarge { num: u64, max: u64 },

    #[error("field {0} cannot be expressed in this suite")]
    UnsupportedField(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("an entry with this name is already cached")]
    DuplicateName,

    #[error("content cannot be cached")]
    InvalidArgument,

    #[error("store is full and holds nothing evictable")]
    CapacityExceeded,
}

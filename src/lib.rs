//#![warn(missing_docs)]

pub mod error;

pub mod clock;

pub mod hash;

pub mod encode;

pub mod tlv;

pub mod suite;

pub mod name;

pub mod packet;

pub mod store;

pub mod tables;

pub mod face;

pub mod forwarder;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use error::{DecodeError, EncodeError, StoreError};
pub use face::{FaceError, FaceTable, FaceToken};
pub use forwarder::{Forwarder, ForwarderConfig, ForwarderMetrics, Outcome};
pub use name::{CompareMode, Name, NameComponent, NameFlags};
pub use packet::{ContentFields, InterestFields, Packet, PacketKind};
pub use store::{CacheLimit, Content, ContentStore, StoreBackend};
pub use suite::Suite;

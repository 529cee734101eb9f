mod queue;
pub use queue::{FaceOptions, QueuedFaces};

use thiserror::Error;

use crate::{name::Name, packet::Packet};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceToken(pub(crate) u32);

impl FaceToken {
    pub fn id(&self) -> u32 {
        self.0
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceError {
    #[error("face is disconnected")]
    Disconnected,

    #[error("face queue is full")]
    QueueFull,
}

// The forwarder does not own any links. Everything it sends goes through a
//  FaceTable, which also knows the routes (the FIB) and which faces lead to
//  local applications rather than to other relays.
// All calls are fire-and-forget from the forwarder's point of view: a failed
//  enqueue is logged and counted, never retried.
pub trait FaceTable {
    fn enqueue(&mut self, face: FaceToken, packet: &[u8]) -> Result<(), FaceError>;

    // Faces an interest for `name` should be propagated to.
    fn lookup_route(&mut self, name: &Name) -> impl Iterator<Item = FaceToken> + '_;

    fn is_local(&self, face: FaceToken) -> bool;

    // Hands content to the application behind a local face.
    fn deliver_to_application(&mut self, face: FaceToken, content: &Packet)
        -> Result<(), FaceError>;

    // Faces flagged this way have every interest they send propagated, even
    //  when an identical one is already pending.
    fn forwards_all_interests(&self, _face: FaceToken) -> bool {
        false
    }
}

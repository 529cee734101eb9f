mod nonces;
mod pit;

pub use nonces::NonceHistory;
pub use pit::{PendingFace, PendingInterestTable, PitEntry, Registration};

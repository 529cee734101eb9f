mod hashed;
mod list;

pub use hashed::HashedStore;
pub use list::ListStore;

use core::num::NonZeroUsize;

use crate::{
    clock::Timestamp,
    error::StoreError,
    name::Name,
    packet::Packet,
    suite::MatchRules,
};

// Content kept by a store, together with the bookkeeping used for eviction
//  and ageing.
#[derive(Clone, Debug)]
pub struct Content {
    packet: Packet,
    arrived: Timestamp,
    last_used: Timestamp,
    served: u64,
    is_static: bool,
    stale: bool,
}

impl Content {
    pub fn new(packet: Packet, now: Timestamp) -> Self {
        Self {
            packet,
            arrived: now,
            last_used: now,
            served: 0,
            is_static: false,
            stale: false,
        }
    }

    // Static content is installed by a local producer. It is never evicted
    //  and never aged out.
    pub fn new_static(packet: Packet, now: Timestamp) -> Self {
        Self {
            is_static: true,
            ..Self::new(packet, now)
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn name(&self) -> &Name {
        self.packet.name()
    }

    pub fn arrived(&self) -> Timestamp {
        self.arrived
    }

    pub fn last_used(&self) -> Timestamp {
        self.last_used
    }

    // How many interests this entry has answered.
    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn mark_used(&mut self, now: Timestamp) {
        self.last_used = now;
        self.served += 1;
    }

    fn is_idle(&self, now: Timestamp, idle_timeout_ms: u64) -> bool {
        !self.is_static && now.elapsed_since(&self.last_used) > idle_timeout_ms
    }

    fn refresh_staleness(&mut self, now: Timestamp) {
        if let Some(period) = self.packet.control().freshness_period_ms {
            if now.elapsed_since(&self.arrived) >= period {
                self.stale = true;
            }
        }
    }
}

// How many entries a store may hold.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheLimit {
    // Forwarded content is not cached at all. Static content is still kept.
    #[default]
    Disabled,
    Bounded(NonZeroUsize),
    Unbounded,
}

impl CacheLimit {
    pub fn bounded(entries: usize) -> Self {
        NonZeroUsize::new(entries).map_or(CacheLimit::Disabled, CacheLimit::Bounded)
    }

    // The entry count at which a store starts evicting, if any.
    pub fn max_entries(&self) -> Option<usize> {
        match self {
            CacheLimit::Bounded(n) => Some(n.get()),
            CacheLimit::Disabled | CacheLimit::Unbounded => None,
        }
    }

    pub fn caches_forwarded_content(&self) -> bool {
        *self != CacheLimit::Disabled
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    List,
    Hashed,
}

impl StoreBackend {
    pub fn build(self, limit: CacheLimit) -> Box<dyn ContentStore> {
        match self {
            StoreBackend::List => Box::new(ListStore::new(limit)),
            StoreBackend::Hashed => Box::new(HashedStore::new(limit)),
        }
    }
}

// The content store contract. The forwarder only talks to a store through
//  this trait, so backends can be swapped without touching forwarding.
// Entries are identified by the encoded bytes of their name.
pub trait ContentStore {
    // Fails with DuplicateName if an entry with the same name exists and with
    //  CapacityExceeded if the store is full of static entries.
    fn add(&mut self, content: Content) -> Result<(), StoreError>;

    fn lookup(&self, name: &Name) -> Option<&Content>;

    fn remove(&mut self, name: &Name) -> Option<Content>;

    fn clear(&mut self);

    // Finds content satisfying `interest` and records the use for LRU
    //  purposes.
    fn match_interest(
        &mut self,
        interest: &Packet,
        rules: &MatchRules,
        now: Timestamp,
    ) -> Option<&Content>;

    // Drops non-static entries unused for longer than `idle_timeout_ms` and
    //  marks entries past their freshness period stale. Returns how many
    //  entries were dropped.
    fn age(&mut self, now: Timestamp, idle_timeout_ms: u64) -> usize;

    fn capacity(&self) -> CacheLimit;

    // Shrinking the capacity evicts entries until the store fits.
    fn set_capacity(&mut self, limit: CacheLimit);

    // Evicts the least recently used non-static entry.
    fn remove_oldest_entry(&mut self) -> Option<Content>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Whether exactly these packet bytes are already cached.
    fn contains_packet(&self, packet: &Packet) -> bool {
        self.lookup(packet.name())
            .is_some_and(|content| content.packet().bytes() == packet.bytes())
    }
}

// Rejects what can never be an entry.
fn check_admissible(content: &Content) -> Result<(), StoreError> {
    if content.packet().is_interest() {
        return Err(StoreError::InvalidArgument);
    }
    Ok(())
}

// Evicts until one more entry fits.
fn make_room(store: &mut dyn ContentStore) -> Result<(), StoreError> {
    let Some(max) = store.capacity().max_entries() else {
        return Ok(());
    };
    while store.len() >= max {
        if store.remove_oldest_entry().is_none() {
            return Err(StoreError::CapacityExceeded);
        }
    }
    Ok(())
}

fn shrink_to_fit(store: &mut dyn ContentStore) {
    let Some(max) = store.capacity().max_entries() else {
        return;
    };
    while store.len() > max {
        if store.remove_oldest_entry().is_none() {
            break;
        }
    }
}

use std::collections::HashMap;

use tracing::debug;

use crate::{
    clock::Timestamp,
    error::StoreError,
    name::Name,
    packet::Packet,
    store::{check_admissible, make_room, shrink_to_fit, CacheLimit, Content, ContentStore},
    suite::{content_matches, MatchRules, Suite},
};

struct Slot {
    content: Content,
    // Insertion order, used to break ties the same way a list would
    seq: u64,
}

// A store indexed by the encoded name. Lookups by name are O(1); interest
//  matching is too for CCNx, which only ever matches exact names.
pub struct HashedStore {
    entries: HashMap<Box<[u8]>, Slot>,
    limit: CacheLimit,
    next_seq: u64,
}

impl HashedStore {
    pub fn new(limit: CacheLimit) -> Self {
        Self {
            entries: HashMap::new(),
            limit,
            next_seq: 0,
        }
    }

    // Key of the first inserted entry satisfying `interest`.
    fn find_match(&self, interest: &Packet, rules: &MatchRules) -> Option<Box<[u8]>> {
        let satisfies = |slot: &Slot| {
            content_matches(interest, slot.content.packet(), slot.content.is_stale(), rules)
        };

        if interest.suite() == Suite::CcnTlv {
            let key = interest.name().key();
            return self
                .entries
                .get(key)
                .filter(|&slot| satisfies(slot))
                .map(|_| Box::from(key));
        }

        self.entries
            .iter()
            .filter(|&(_, slot)| satisfies(slot))
            .min_by_key(|(_, slot)| slot.seq)
            .map(|(key, _)| key.clone())
    }
}

impl ContentStore for HashedStore {
    fn add(&mut self, content: Content) -> Result<(), StoreError> {
        check_admissible(&content)?;
        if self.entries.contains_key(content.name().key()) {
            return Err(StoreError::DuplicateName);
        }
        make_room(self)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries
            .insert(Box::from(content.name().key()), Slot { content, seq });
        Ok(())
    }

    fn lookup(&self, name: &Name) -> Option<&Content> {
        self.entries.get(name.key()).map(|slot| &slot.content)
    }

    fn remove(&mut self, name: &Name) -> Option<Content> {
        self.entries.remove(name.key()).map(|slot| slot.content)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn match_interest(
        &mut self,
        interest: &Packet,
        rules: &MatchRules,
        now: Timestamp,
    ) -> Option<&Content> {
        let key = self.find_match(interest, rules)?;
        let slot = self.entries.get_mut(&key)?;
        slot.content.mark_used(now);
        Some(&slot.content)
    }

    fn age(&mut self, now: Timestamp, idle_timeout_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| {
            if slot.content.is_idle(now, idle_timeout_ms) {
                debug!("Aged out {}", slot.content.name());
                return false;
            }
            slot.content.refresh_staleness(now);
            true
        });
        before - self.entries.len()
    }

    fn capacity(&self) -> CacheLimit {
        self.limit
    }

    fn set_capacity(&mut self, limit: CacheLimit) {
        self.limit = limit;
        shrink_to_fit(self);
    }

    fn remove_oldest_entry(&mut self) -> Option<Content> {
        let key = self
            .entries
            .iter()
            .filter(|(_, slot)| !slot.content.is_static())
            .min_by_key(|(_, slot)| (slot.content.last_used(), slot.seq))
            .map(|(key, _)| key.clone())?;
        let evicted = self.entries.remove(&key)?.content;
        debug!("Evicted {}", evicted.name());
        Some(evicted)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

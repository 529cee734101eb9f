use std::collections::LinkedList;

use tracing::debug;

use crate::{
    clock::Timestamp,
    error::StoreError,
    name::Name,
    packet::Packet,
    store::{check_admissible, make_room, shrink_to_fit, CacheLimit, Content, ContentStore},
    suite::{content_matches, MatchRules},
};

// The simplest store: a list in insertion order, scanned linearly by every
//  operation. Used as the baseline the other backends are checked against.
pub struct ListStore {
    entries: LinkedList<Content>,
    limit: CacheLimit,
}

impl ListStore {
    pub fn new(limit: CacheLimit) -> Self {
        Self {
            entries: LinkedList::new(),
            limit,
        }
    }

    fn position(&self, name: &Name) -> Option<usize> {
        self.entries
            .iter()
            .position(|c| c.name().key() == name.key())
    }

    fn take_at(&mut self, index: usize) -> Option<Content> {
        if index >= self.entries.len() {
            return None;
        }
        let mut tail = self.entries.split_off(index);
        let taken = tail.pop_front();
        self.entries.append(&mut tail);
        taken
    }
}

impl ContentStore for ListStore {
    fn add(&mut self, content: Content) -> Result<(), StoreError> {
        check_admissible(&content)?;
        if self.position(content.name()).is_some() {
            return Err(StoreError::DuplicateName);
        }
        make_room(self)?;
        self.entries.push_back(content);
        Ok(())
    }

    fn lookup(&self, name: &Name) -> Option<&Content> {
        self.entries.iter().find(|c| c.name().key() == name.key())
    }

    fn remove(&mut self, name: &Name) -> Option<Content> {
        let index = self.position(name)?;
        self.take_at(index)
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
        let content = self
            .entries
            .iter_mut()
            .find(|c| content_matches(interest, c.packet(), c.is_stale(), rules))?;
        content.mark_used(now);
        Some(content)
    }

    fn age(&mut self, now: Timestamp, idle_timeout_ms: u64) -> usize {
        let (idle, mut kept): (LinkedList<Content>, LinkedList<Content>) =
            core::mem::take(&mut self.entries)
                .into_iter()
                .partition(|c| c.is_idle(now, idle_timeout_ms));
        for content in &idle {
            debug!("Aged out {}", content.name());
        }
        for content in kept.iter_mut() {
            content.refresh_staleness(now);
        }
        self.entries = kept;
        idle.len()
    }

    fn capacity(&self) -> CacheLimit {
        self.limit
    }

    fn set_capacity(&mut self, limit: CacheLimit) {
        self.limit = limit;
        shrink_to_fit(self);
    }

    fn remove_oldest_entry(&mut self) -> Option<Content> {
        let mut oldest: Option<(usize, Timestamp)> = None;
        for (index, content) in self.entries.iter().enumerate() {
            if content.is_static() {
                continue;
            }
            // Strictly older wins, so ties go to the earliest insertion
            if oldest.map_or(true, |(_, used)| content.last_used() < used) {
                oldest = Some((index, content.last_used()));
            }
        }
        let evicted = self.take_at(oldest?.0)?;
        debug!("Evicted {}", evicted.name());
        Some(evicted)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

use crate::{
    clock::Timestamp,
    face::FaceToken,
    packet::Packet,
    suite::{content_matches, same_interest, MatchRules},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingFace {
    pub face: FaceToken,
    pub last_seen: Timestamp,
}

// One in-flight interest and everyone waiting for its answer.
#[derive(Clone, Debug)]
pub struct PitEntry {
    interest: Packet,
    faces: Vec<PendingFace>,
    created: Timestamp,
    last_activity: Timestamp,
    lifetime_ms: u64,
    retries: u32,
}

impl PitEntry {
    fn new(interest: Packet, from: FaceToken, now: Timestamp, lifetime_ms: u64) -> Self {
        Self {
            interest,
            faces: vec![PendingFace {
                face: from,
                last_seen: now,
            }],
            created: now,
            last_activity: now,
            lifetime_ms,
            retries: 0,
        }
    }

    pub fn interest(&self) -> &Packet {
        &self.interest
    }

    pub fn pending_faces(&self) -> impl Iterator<Item = FaceToken> + '_ {
        self.faces.iter().map(|p| p.face)
    }

    pub fn is_pending_on(&self, face: FaceToken) -> bool {
        self.faces.iter().any(|p| p.face == face)
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    pub fn last_activity(&self) -> Timestamp {
        self.last_activity
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn has_expired(&self, now: Timestamp, max_retries: u32) -> bool {
        now.elapsed_since(&self.last_activity) >= self.lifetime_ms || self.retries > max_retries
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    // No such interest was pending; it has to be propagated.
    Created,
    // Someone else already asked, the face was added to the waiting list.
    Aggregated,
    // The face was already waiting; only its timer was refreshed.
    Refreshed,
}

// Interests are kept in arrival order. Identity is the aggregation rule of
//  `same_interest`, so there is at most one entry per distinct request.
#[derive(Default)]
pub struct PendingInterestTable {
    entries: Vec<PitEntry>,
    face_scratchpad: Vec<FaceToken>,
}

impl PendingInterestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PitEntry> + '_ {
        self.entries.iter()
    }

    pub fn find(&self, interest: &Packet, rules: &MatchRules) -> Option<&PitEntry> {
        self.entries
            .iter()
            .find(|e| same_interest(&e.interest, interest, rules))
    }

    pub fn register(
        &mut self,
        interest: &Packet,
        from: FaceToken,
        rules: &MatchRules,
        now: Timestamp,
        lifetime_ms: u64,
    ) -> Registration {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| same_interest(&e.interest, interest, rules))
        else {
            self.entries
                .push(PitEntry::new(interest.clone(), from, now, lifetime_ms));
            return Registration::Created;
        };

        entry.last_activity = now;
        entry.lifetime_ms = entry.lifetime_ms.max(lifetime_ms);
        match entry.faces.iter_mut().find(|p| p.face == from) {
            Some(pending) => {
                pending.last_seen = now;
                Registration::Refreshed
            }
            None => {
                entry.faces.push(PendingFace {
                    face: from,
                    last_seen: now,
                });
                Registration::Aggregated
            }
        }
    }

    // Removes every entry `content` answers and returns the faces that were
    //  waiting on them, each face once.
    pub fn satisfy(
        &mut self,
        content: &Packet,
        rules: &MatchRules,
    ) -> impl Iterator<Item = FaceToken> + '_ {
        self.face_scratchpad.clear();
        let scratchpad = &mut self.face_scratchpad;
        self.entries.retain(|entry| {
            if !content_matches(&entry.interest, content, false, rules) {
                return true;
            }
            for face in entry.pending_faces() {
                if !scratchpad.contains(&face) {
                    scratchpad.push(face);
                }
            }
            false
        });
        self.face_scratchpad.iter().copied()
    }

    // Takes `face` out of every waiting list. Entries nobody waits on any more
    //  are dropped; returns how many.
    pub fn remove_face(&mut self, face: FaceToken) -> usize {
        let before = self.entries.len();
        self.entries.retain_mut(|entry| {
            entry.faces.retain(|p| p.face != face);
            !entry.faces.is_empty()
        });
        before - self.entries.len()
    }

    // Drops entries that outlived their lifetime or were retransmitted too
    //  often, and waiting faces that went quiet. The surviving entries count
    //  one more retry, since the caller propagates them again.
    pub fn age(&mut self, now: Timestamp, max_retries: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain_mut(|entry| {
            if entry.has_expired(now, max_retries) {
                return false;
            }
            let lifetime_ms = entry.lifetime_ms;
            entry
                .faces
                .retain(|p| now.elapsed_since(&p.last_seen) < lifetime_ms);
            if entry.faces.is_empty() {
                return false;
            }
            entry.retries += 1;
            true
        });
        before - self.entries.len()
    }
}

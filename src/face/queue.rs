use std::collections::VecDeque;

use crate::{
    face::{FaceError, FaceTable, FaceToken},
    name::{CompareMode, Name},
    packet::Packet,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaceOptions {
    // The face leads to an application on this node.
    pub local: bool,
    pub forward_all_interests: bool,
    pub queue_capacity: usize,
}

impl Default for FaceOptions {
    fn default() -> Self {
        Self {
            local: false,
            forward_all_interests: false,
            queue_capacity: 64,
        }
    }
}

impl FaceOptions {
    pub fn local() -> Self {
        Self {
            local: true,
            ..Self::default()
        }
    }

    pub fn forwarding_all_interests(mut self) -> Self {
        self.forward_all_interests = true;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}

struct FaceEntry {
    options: FaceOptions,
    outgoing: VecDeque<Box<[u8]>>,
    delivered: Vec<Packet>,
    connected: bool,
}

// An in-memory face table: outgoing packets pile up in per-face queues until
//  the owner drains them. Routes are plain (prefix, face) pairs matched by
//  name prefix.
// Useful whenever the links live elsewhere, and for driving a forwarder from
//  tests or simulations.
pub struct QueuedFaces {
    faces: Vec<(u32, FaceEntry)>,
    routes: Vec<(Name, FaceToken)>,
    latest_face_token: u32,
    face_scratchpad: Vec<FaceToken>,
}

impl Default for QueuedFaces {
    fn default() -> Self {
        Self::new()
    }
}

impl QueuedFaces {
    pub fn new() -> Self {
        Self {
            faces: Vec::new(),
            routes: Vec::new(),
            latest_face_token: 0,
            face_scratchpad: Vec::new(),
        }
    }

    pub fn add_face(&mut self, options: FaceOptions) -> Option<FaceToken> {
        let token = self.latest_face_token.checked_add(1)?;
        self.latest_face_token = token;
        self.faces.push((
            token,
            FaceEntry {
                options,
                outgoing: VecDeque::new(),
                delivered: Vec::new(),
                connected: true,
            },
        ));
        Some(FaceToken(token))
    }

    // Tokens are never reused, so a removed face stays gone.
    pub fn remove_face(&mut self, face: FaceToken) -> bool {
        self.routes.retain(|(_, f)| *f != face);
        match self.find_face(face) {
            Some(index) => {
                self.faces.remove(index);
                true
            }
            None => false,
        }
    }

    // Keeps the face and its routes but refuses further packets.
    pub fn disconnect(&mut self, face: FaceToken) {
        if let Some(entry) = self.entry_mut(face) {
            entry.connected = false;
        }
    }

    pub fn register_route(&mut self, prefix: Name, face: FaceToken) {
        let exists = self
            .routes
            .iter()
            .any(|(p, f)| *f == face && p.key() == prefix.key());
        if !exists {
            self.routes.push((prefix, face));
        }
    }

    pub fn unregister_route(&mut self, prefix: &Name, face: FaceToken) -> bool {
        let before = self.routes.len();
        self.routes
            .retain(|(p, f)| !(*f == face && p.key() == prefix.key()));
        before != self.routes.len()
    }

    // Drains the packets queued towards `face`.
    pub fn take_sent(&mut self, face: FaceToken) -> Vec<Box<[u8]>> {
        self.entry_mut(face)
            .map(|entry| entry.outgoing.drain(..).collect())
            .unwrap_or_default()
    }

    // Drains the content handed to the application behind `face`.
    pub fn take_delivered(&mut self, face: FaceToken) -> Vec<Packet> {
        self.entry_mut(face)
            .map(|entry| core::mem::take(&mut entry.delivered))
            .unwrap_or_default()
    }

    fn find_face(&self, face: FaceToken) -> Option<usize> {
        // Tokens only grow, so the list stays sorted
        self.faces.binary_search_by_key(&face.0, |x| x.0).ok()
    }

    fn entry(&self, face: FaceToken) -> Option<&FaceEntry> {
        self.find_face(face).map(|index| &self.faces[index].1)
    }

    fn entry_mut(&mut self, face: FaceToken) -> Option<&mut FaceEntry> {
        self.find_face(face).map(|index| &mut self.faces[index].1)
    }

    fn usable_entry(&mut self, face: FaceToken) -> Result<&mut FaceEntry, FaceError> {
        match self.entry_mut(face) {
            Some(entry) if entry.connected => Ok(entry),
            _ => Err(FaceError::Disconnected),
        }
    }
}

impl FaceTable for QueuedFaces {
    fn enqueue(&mut self, face: FaceToken, packet: &[u8]) -> Result<(), FaceError> {
        let entry = self.usable_entry(face)?;
        if entry.outgoing.len() >= entry.options.queue_capacity {
            return Err(FaceError::QueueFull);
        }
        entry.outgoing.push_back(Box::from(packet));
        Ok(())
    }

    fn lookup_route(&mut self, name: &Name) -> impl Iterator<Item = FaceToken> + '_ {
        self.face_scratchpad.clear();
        for (prefix, face) in &self.routes {
            let covered = name.compare(None, prefix, CompareMode::Prefix).is_some();
            if covered && !self.face_scratchpad.contains(face) {
                self.face_scratchpad.push(*face);
            }
        }
        self.face_scratchpad.iter().copied()
    }

    fn is_local(&self, face: FaceToken) -> bool {
        self.entry(face).is_some_and(|entry| entry.options.local)
    }

    fn deliver_to_application(
        &mut self,
        face: FaceToken,
        content: &Packet,
    ) -> Result<(), FaceError> {
        let entry = self.usable_entry(face)?;
        entry.delivered.push(content.clone());
        Ok(())
    }

    fn forwards_all_interests(&self, face: FaceToken) -> bool {
        self.entry(face)
            .is_some_and(|entry| entry.options.forward_all_interests)
    }
}

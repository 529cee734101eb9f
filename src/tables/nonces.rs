use core::ops::BitXor;
use std::collections::VecDeque;

use crate::{clock::Timestamp, name::Name};

// Recently seen (name, nonce) pairs. An interest that comes back with a pair
//  we already saw has most likely looped and is dropped.
// The history is bounded both in size (oldest first out) and in time.
pub struct NonceHistory {
    seen: VecDeque<(u64, Timestamp)>,
    capacity: usize,
    window_ms: u64,
}

impl NonceHistory {
    pub fn new(capacity: usize, window_ms: u64) -> Self {
        Self {
            seen: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            window_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, name: &Name, nonce: &[u8]) -> bool {
        let hash = hash_name_and_nonce(name, nonce);
        self.seen.iter().any(|(h, _)| *h == hash)
    }

    // Records the pair and tells whether it had been seen before. A pair that
    //  was already present is not recorded a second time.
    pub fn check_and_insert(&mut self, name: &Name, nonce: &[u8], now: Timestamp) -> bool {
        let hash = hash_name_and_nonce(name, nonce);
        if self.seen.iter().any(|(h, _)| *h == hash) {
            return true;
        }
        if self.capacity == 0 {
            return false;
        }
        while self.seen.len() >= self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back((hash, now));
        false
    }

    // Forgets pairs older than the window. Returns how many were dropped.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.seen.len();
        // Insertion order is also time order
        while let Some((_, seen_at)) = self.seen.front() {
            if now.elapsed_since(seen_at) < self.window_ms {
                break;
            }
            self.seen.pop_front();
        }
        before - self.seen.len()
    }
}

fn hash_name_and_nonce(name: &Name, nonce: &[u8]) -> u64 {
    let mut hash = 0u64;
    for component in name.components() {
        add_to_hash(&mut hash, component.typ as u64);
        add_bytes_to_hash(&mut hash, component.bytes);
    }
    // Keeps /a + nonce "bc" apart from /ab + nonce "c"
    add_to_hash(&mut hash, name.len() as u64);
    add_bytes_to_hash(&mut hash, nonce);
    hash
}

fn add_bytes_to_hash(hash: &mut u64, bytes: &[u8]) {
    add_to_hash(hash, bytes.len() as u64);
    for chunk in bytes.chunks(8) {
        let mut arr = [0u8; 8];
        arr[..chunk.len()].copy_from_slice(chunk);
        add_to_hash(hash, u64::from_be_bytes(arr));
    }
}

#[inline]
fn add_to_hash(hash: &mut u64, i: u64) {
    *hash = hash
        .rotate_left(5)
        .bitxor(i)
        .wrapping_mul(0x517cc1b727220a95);
}

use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub ms_since_1970: u64,
}

impl Timestamp {
    pub fn from_ms(ms_since_1970: u64) -> Self {
        Self { ms_since_1970 }
    }

    pub fn adding(&self, ms: u64) -> Self {
        Self {
            ms_since_1970: self.ms_since_1970.saturating_add(ms),
        }
    }

    pub fn removing(&self, ms: u64) -> Self {
        Self {
            ms_since_1970: self.ms_since_1970.saturating_sub(ms),
        }
    }

    pub fn difference(&self, other: &Self) -> Option<u64> {
        self.ms_since_1970.checked_sub(other.ms_since_1970)
    }

    // How long ago `earlier` was, clamped at zero when the clock went backwards.
    pub fn elapsed_since(&self, earlier: &Self) -> u64 {
        self.difference(earlier).unwrap_or(0)
    }
}

// The forwarder never reads the system time directly: ageing, LRU eviction and
//  nonce expiry all go through a Clock so that tests can drive time by hand.
pub trait Clock {
    fn now(&mut self) -> Timestamp;
}

pub struct MonotonicClock {
    reference: Instant,
    reference_ms: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        let reference_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| u64::try_from(d.as_millis()).ok())
            .unwrap_or(0);
        Self {
            reference: Instant::now(),
            reference_ms,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> Timestamp {
        let millis = u64::try_from(Instant::now().duration_since(self.reference).as_millis())
            .unwrap_or(u64::MAX);

        Timestamp {
            ms_since_1970: self.reference_ms.saturating_add(millis),
        }
    }
}

// A clock that only moves when told to. Clones share nothing.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Timestamp,
}

impl ManualClock {
    pub fn starting_at(ms_since_1970: u64) -> Self {
        Self {
            now: Timestamp::from_ms(ms_since_1970),
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now = self.now.adding(ms);
    }

    pub fn set(&mut self, now: Timestamp) {
        self.now = now;
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Timestamp {
        self.now
    }
}

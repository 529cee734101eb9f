use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::{
    clock::{Clock, Timestamp},
    error::{DecodeError, StoreError},
    face::{FaceTable, FaceToken},
    packet::Packet,
    store::{CacheLimit, Content, ContentStore, StoreBackend},
    suite::{self, ccntlv::HopLimit, MatchRules},
    tables::{NonceHistory, PendingInterestTable, Registration},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwarderConfig {
    pub cache_limit: CacheLimit,
    pub max_nonces: usize,
    pub nonce_window_ms: u64,
    pub content_timeout_ms: u64,
    pub interest_timeout_ms: u64,
    pub max_interest_retransmit: u32,
    pub check_ccnx_key_id: bool,
    pub store_backend: StoreBackend,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            cache_limit: CacheLimit::Disabled,
            max_nonces: 256,
            nonce_window_ms: 60_000,
            content_timeout_ms: 300_000,
            interest_timeout_ms: 40_000,
            max_interest_retransmit: 20,
            check_ccnx_key_id: true,
            store_backend: StoreBackend::List,
        }
    }
}

impl ForwarderConfig {
    pub fn with_cache_limit(mut self, cache_limit: CacheLimit) -> Self {
        self.cache_limit = cache_limit;
        self
    }

    pub fn with_max_nonces(mut self, max_nonces: usize) -> Self {
        self.max_nonces = max_nonces;
        self
    }

    pub fn with_nonce_window_ms(mut self, nonce_window_ms: u64) -> Self {
        self.nonce_window_ms = nonce_window_ms;
        self
    }

    pub fn with_content_timeout_ms(mut self, content_timeout_ms: u64) -> Self {
        self.content_timeout_ms = content_timeout_ms;
        self
    }

    pub fn with_interest_timeout_ms(mut self, interest_timeout_ms: u64) -> Self {
        self.interest_timeout_ms = interest_timeout_ms;
        self
    }

    pub fn with_max_interest_retransmit(mut self, max_interest_retransmit: u32) -> Self {
        self.max_interest_retransmit = max_interest_retransmit;
        self
    }

    pub fn with_check_ccnx_key_id(mut self, check_ccnx_key_id: bool) -> Self {
        self.check_ccnx_key_id = check_ccnx_key_id;
        self
    }

    pub fn with_store_backend(mut self, store_backend: StoreBackend) -> Self {
        self.store_backend = store_backend;
        self
    }

    fn match_rules(&self) -> MatchRules {
        MatchRules {
            check_ccnx_key_id: self.check_ccnx_key_id,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    Malformed,
    UnsupportedSuite,
    DuplicateNonce,
    HopLimitExpired,
    Unsolicited,
    AlreadyCached,
}

// What became of one received packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    // The interest was answered from the content store.
    AnsweredFromCache,
    // A new PIT entry was created and the interest sent to this many faces.
    //  Link-local interests are recorded but sent nowhere.
    Forwarded { faces: usize },
    // The interest joined an identical pending one.
    Aggregated,
    // The content satisfied pending interests of this many faces.
    Delivered { faces: usize },
    Dropped(DropReason),
}

// Reporting hooks called at fixed points of the forwarding state machine.
pub trait ForwarderMetrics {
    fn interest_received(&mut self) {}
    fn interest_sent(&mut self) {}
    fn content_received(&mut self) {}
    fn content_sent(&mut self) {}
    fn dropped(&mut self, _reason: DropReason) {}
    fn send_failed(&mut self) {}
}

pub struct InertMetrics;

impl ForwarderMetrics for InertMetrics {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountingMetrics {
    pub interests_received: u64,
    pub interests_sent: u64,
    pub contents_received: u64,
    pub contents_sent: u64,
    pub send_failures: u64,
    drops: BTreeMap<DropReason, u64>,
}

impl CountingMetrics {
    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drops.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_drops(&self) -> u64 {
        self.drops.values().sum()
    }
}

impl ForwarderMetrics for CountingMetrics {
    fn interest_received(&mut self) {
        self.interests_received += 1;
    }

    fn interest_sent(&mut self) {
        self.interests_sent += 1;
    }

    fn content_received(&mut self) {
        self.contents_received += 1;
    }

    fn content_sent(&mut self) {
        self.contents_sent += 1;
    }

    fn dropped(&mut self, reason: DropReason) {
        *self.drops.entry(reason).or_default() += 1;
    }

    fn send_failed(&mut self) {
        self.send_failures += 1;
    }
}

// What one call to `Forwarder::age` removed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AgeingReport {
    pub nonces: usize,
    pub contents: usize,
    pub interests: usize,
    pub retransmitted: usize,
}

// The relay context: everything packet processing reads or mutates. Each
//  call runs to completion, so one Forwarder must not be shared between
//  threads without a lock around it.
pub struct Forwarder<F, C, M = InertMetrics>
where
    F: FaceTable,
    C: Clock,
    M: ForwarderMetrics,
{
    faces: F,
    clock: C,
    metrics: M,
    store: Box<dyn ContentStore>,
    pit: PendingInterestTable,
    nonces: NonceHistory,
    config: ForwarderConfig,
    rules: MatchRules,
    face_scratchpad: Vec<FaceToken>,
}

impl<F, C, M> Forwarder<F, C, M>
where
    F: FaceTable,
    C: Clock,
    M: ForwarderMetrics,
{
    pub fn new(faces: F, clock: C, metrics: M, config: ForwarderConfig) -> Self {
        let store = config.store_backend.build(config.cache_limit);
        Self::with_store(faces, clock, metrics, config, store)
    }

    // Uses `store` instead of building the configured backend.
    pub fn with_store(
        faces: F,
        clock: C,
        metrics: M,
        config: ForwarderConfig,
        store: Box<dyn ContentStore>,
    ) -> Self {
        Self {
            faces,
            clock,
            metrics,
            store,
            pit: PendingInterestTable::new(),
            nonces: NonceHistory::new(config.max_nonces, config.nonce_window_ms),
            rules: config.match_rules(),
            config,
            face_scratchpad: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn faces(&self) -> &F {
        &self.faces
    }

    pub fn faces_mut(&mut self) -> &mut F {
        &mut self.faces
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn pit(&self) -> &PendingInterestTable {
        &self.pit
    }

    pub fn nonces(&self) -> &NonceHistory {
        &self.nonces
    }

    // Processes every packet in `datagram`, in order. Processing stops at the
    //  first packet that does not decode, since its length cannot be trusted.
    pub fn receive(&mut self, from: FaceToken, datagram: &[u8]) -> Vec<Outcome> {
        let now = self.clock.now();
        let mut outcomes = Vec::new();
        let mut offset = 0;

        while let Some(rest) = datagram.get(offset..).filter(|rest| !rest.is_empty()) {
            match suite::decode(rest) {
                Ok((packet, consumed)) if consumed > 0 => {
                    offset += consumed;
                    outcomes.push(self.dispatch(from, packet, now));
                }
                Ok(_) => break,
                Err(err) => {
                    debug!(face = ?from, offset, %err, "Dropping undecodable packet");
                    let reason = match err {
                        DecodeError::UnsupportedSuite(_) => DropReason::UnsupportedSuite,
                        _ => DropReason::Malformed,
                    };
                    self.metrics.dropped(reason);
                    outcomes.push(Outcome::Dropped(reason));
                    break;
                }
            }
        }
        outcomes
    }

    // Handles one already decoded packet.
    pub fn dispatch(&mut self, from: FaceToken, packet: Packet, now: Timestamp) -> Outcome {
        if packet.is_interest() {
            self.handle_interest(from, packet, now)
        } else {
            self.handle_content(from, packet, now)
        }
    }

    fn handle_interest(&mut self, from: FaceToken, mut interest: Packet, now: Timestamp) -> Outcome {
        self.metrics.interest_received();
        let suite = interest.suite();

        if let Some(HopLimit::Expired) = interest.decrement_hop_limit() {
            debug!(%suite, name = %interest.name(), face = ?from, "Hop limit expired");
            return self.drop_packet(DropReason::HopLimitExpired);
        }

        if let Some(nonce) = interest.nonce() {
            if self.nonces.check_and_insert(interest.name(), nonce, now) {
                debug!(%suite, name = %interest.name(), face = ?from, "Duplicate nonce");
                return self.drop_packet(DropReason::DuplicateNonce);
            }
        }

        if interest.honors_cache() {
            if let Some(content) = self.store.match_interest(&interest, &self.rules, now) {
                debug!(%suite, name = %interest.name(), cached = %content.name(), "Answered from cache");
                let packet = content.packet();
                send_content(&mut self.faces, &mut self.metrics, from, packet);
                return Outcome::AnsweredFromCache;
            }
        }

        let lifetime_ms = interest
            .control()
            .interest_lifetime_ms
            .unwrap_or(self.config.interest_timeout_ms);
        let registration = self
            .pit
            .register(&interest, from, &self.rules, now, lifetime_ms);

        match registration {
            Registration::Created => {
                trace!(%suite, name = %interest.name(), face = ?from, "New PIT entry");
                let faces = if interest.forwarding_permitted() {
                    self.propagate(&interest, &[from])
                } else {
                    0
                };
                Outcome::Forwarded { faces }
            }
            Registration::Aggregated | Registration::Refreshed => {
                debug!(%suite, name = %interest.name(), face = ?from, "Aggregated with pending interest");
                if self.faces.forwards_all_interests(from) && interest.forwarding_permitted() {
                    self.propagate(&interest, &[from]);
                }
                Outcome::Aggregated
            }
        }
    }

    fn handle_content(&mut self, from: FaceToken, content: Packet, now: Timestamp) -> Outcome {
        self.metrics.content_received();
        let suite = content.suite();

        if self.store.contains_packet(&content) {
            trace!(%suite, name = %content.name(), "Content already cached");
            return self.drop_packet(DropReason::AlreadyCached);
        }

        self.face_scratchpad.clear();
        self.face_scratchpad
            .extend(self.pit.satisfy(&content, &self.rules));

        if self.face_scratchpad.is_empty() {
            debug!(%suite, name = %content.name(), face = ?from, "Dropping unsolicited content");
            return self.drop_packet(DropReason::Unsolicited);
        }

        let mut delivered = 0;
        for &face in &self.face_scratchpad {
            if face == from {
                continue;
            }
            send_content(&mut self.faces, &mut self.metrics, face, &content);
            delivered += 1;
        }

        if self.config.cache_limit.caches_forwarded_content() {
            let name = content.name().clone();
            match self.store.add(Content::new(content, now)) {
                Ok(()) => trace!(%suite, %name, "Cached content"),
                Err(StoreError::CapacityExceeded) => {
                    debug!(%suite, %name, "Content store full of static content, not caching")
                }
                Err(err) => debug!(%suite, %name, %err, "Not caching content"),
            }
        }

        Outcome::Delivered { faces: delivered }
    }

    // Sends `interest` along its routes, except to the faces in `exclude`.
    //  Returns how many faces it was sent to.
    fn propagate(&mut self, interest: &Packet, exclude: &[FaceToken]) -> usize {
        self.face_scratchpad.clear();
        self.face_scratchpad
            .extend(self.faces.lookup_route(interest.name()));
        propagate_to(
            &mut self.faces,
            &mut self.metrics,
            &self.face_scratchpad,
            interest,
            exclude,
        )
    }

    fn drop_packet(&mut self, reason: DropReason) -> Outcome {
        self.metrics.dropped(reason);
        Outcome::Dropped(reason)
    }

    // Periodic housekeeping: expires nonces, idle and stale content and
    //  pending interests, then retransmits the interests still pending.
    pub fn age(&mut self) -> AgeingReport {
        let now = self.clock.now();
        let mut report = AgeingReport {
            nonces: self.nonces.prune(now),
            contents: self.store.age(now, self.config.content_timeout_ms),
            interests: self.pit.age(now, self.config.max_interest_retransmit),
            retransmitted: 0,
        };

        for entry in self.pit.entries() {
            let interest = entry.interest();
            if !interest.forwarding_permitted() {
                continue;
            }
            self.face_scratchpad.clear();
            self.face_scratchpad
                .extend(self.faces.lookup_route(interest.name()));
            let pending: Vec<FaceToken> = entry.pending_faces().collect();
            let sent = propagate_to(
                &mut self.faces,
                &mut self.metrics,
                &self.face_scratchpad,
                interest,
                &pending,
            );
            if sent > 0 {
                report.retransmitted += 1;
            }
        }

        if report != AgeingReport::default() {
            debug!(?report, "Aged tables");
        }
        report
    }

    // Installs content produced on this node. It is served like any cached
    //  content but never evicted or aged out.
    pub fn add_static_content(&mut self, content: Packet) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.store.add(Content::new_static(content, now))
    }

    // Forgets a face that went away. Returns how many pending interests were
    //  dropped because nobody else waited on them.
    pub fn remove_face(&mut self, face: FaceToken) -> usize {
        let dropped = self.pit.remove_face(face);
        debug!(?face, dropped, "Removed face");
        dropped
    }
}

fn send_content<F, M>(faces: &mut F, metrics: &mut M, face: FaceToken, content: &Packet)
where
    F: FaceTable,
    M: ForwarderMetrics,
{
    let result = if faces.is_local(face) {
        faces.deliver_to_application(face, content)
    } else {
        faces.enqueue(face, content.bytes())
    };
    match result {
        Ok(()) => metrics.content_sent(),
        Err(err) => {
            warn!(?face, %err, "Could not send content");
            metrics.send_failed();
        }
    }
}

fn propagate_to<F, M>(
    faces: &mut F,
    metrics: &mut M,
    hops: &[FaceToken],
    interest: &Packet,
    exclude: &[FaceToken],
) -> usize
where
    F: FaceTable,
    M: ForwarderMetrics,
{
    let mut sent = 0;
    for &face in hops {
        if exclude.contains(&face) {
            continue;
        }
        match faces.enqueue(face, interest.bytes()) {
            Ok(()) => {
                trace!(?face, name = %interest.name(), "Propagated interest");
                metrics.interest_sent();
                sent += 1;
            }
            Err(err) => {
                warn!(?face, %err, "Could not propagate interest");
                metrics.send_failed();
            }
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use crate::{
        clock::ManualClock,
        face::{FaceOptions, QueuedFaces},
        forwarder::{CountingMetrics, DropReason, Forwarder, ForwarderConfig, ForwarderMetrics, Outcome},
        name::Name,
        packet::ContentFields,
        store::{CacheLimit, StoreBackend},
        suite::{self, Suite},
    };

    #[test]
    fn test_config_defaults() {
        let config = ForwarderConfig::default();
        assert_eq!(config.cache_limit, CacheLimit::Disabled);
        assert_eq!(config.max_nonces, 256);
        assert_eq!(config.content_timeout_ms, 300_000);
        assert_eq!(config.interest_timeout_ms, 40_000);
        assert_eq!(config.max_interest_retransmit, 20);
        assert!(config.check_ccnx_key_id);
        assert_eq!(config.store_backend, StoreBackend::List);

        let config = config
            .with_cache_limit(CacheLimit::bounded(10))
            .with_store_backend(StoreBackend::Hashed)
            .with_check_ccnx_key_id(false);
        assert_eq!(config.cache_limit, CacheLimit::bounded(10));
        assert_eq!(config.store_backend, StoreBackend::Hashed);
        assert!(!config.match_rules().check_ccnx_key_id);
    }

    #[test]
    fn test_counting_metrics() {
        let mut metrics = CountingMetrics::default();
        metrics.dropped(DropReason::Unsolicited);
        metrics.dropped(DropReason::Unsolicited);
        metrics.dropped(DropReason::Malformed);
        metrics.interest_received();
        assert_eq!(metrics.drops(DropReason::Unsolicited), 2);
        assert_eq!(metrics.drops(DropReason::DuplicateNonce), 0);
        assert_eq!(metrics.total_drops(), 3);
        assert_eq!(metrics.interests_received, 1);
    }

    #[test]
    fn test_garbage_stops_the_frame_loop() {
        let mut faces = QueuedFaces::new();
        let face = faces.add_face(FaceOptions::default()).unwrap();
        let mut forwarder = Forwarder::new(
            faces,
            ManualClock::starting_at(0),
            CountingMetrics::default(),
            ForwarderConfig::default(),
        );

        // An NDN interest whose length runs past the datagram
        assert_eq!(
            forwarder.receive(face, &[0x05, 0x40, 0x07, 0x00]),
            vec![Outcome::Dropped(DropReason::Malformed)]
        );
        assert!(forwarder.receive(face, &[]).is_empty());
        assert_eq!(forwarder.metrics().drops(DropReason::Malformed), 1);
        assert_eq!(forwarder.metrics().drops(DropReason::UnsupportedSuite), 0);
    }

    #[test]
    fn test_unknown_encoding_is_counted_apart() {
        let mut faces = QueuedFaces::new();
        let face = faces.add_face(FaceOptions::default()).unwrap();
        let mut forwarder = Forwarder::new(
            faces,
            ManualClock::starting_at(0),
            CountingMetrics::default(),
            ForwarderConfig::default(),
        );

        assert_eq!(
            forwarder.receive(face, &[0xff, 0x00, 0x01]),
            vec![Outcome::Dropped(DropReason::UnsupportedSuite)]
        );
        // A switch prefix announcing an encoding nobody knows
        assert_eq!(
            forwarder.receive(face, &[0x80, 0x07, 0x05, 0x00]),
            vec![Outcome::Dropped(DropReason::UnsupportedSuite)]
        );
        assert_eq!(forwarder.metrics().drops(DropReason::UnsupportedSuite), 2);
        assert_eq!(forwarder.metrics().drops(DropReason::Malformed), 0);
    }

    #[traced_test]
    #[test]
    fn test_unsolicited_content_is_logged() {
        let mut faces = QueuedFaces::new();
        let face = faces.add_face(FaceOptions::default()).unwrap();
        let mut forwarder = Forwarder::new(
            faces,
            ManualClock::starting_at(0),
            CountingMetrics::default(),
            ForwarderConfig::default().with_cache_limit(CacheLimit::Unbounded),
        );

        let name = Name::from_components(Suite::NdnTlv, &[b"nobody", b"asked"]).unwrap();
        let bytes = suite::encode_content(&name, b"x", &ContentFields::default()).unwrap();
        assert_eq!(
            forwarder.receive(face, &bytes),
            vec![Outcome::Dropped(DropReason::Unsolicited)]
        );
        assert!(forwarder.store().is_empty());
        assert!(logs_contain("Dropping unsolicited content"));
        assert!(logs_contain("/nobody/asked"));
    }
}

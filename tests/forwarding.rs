use ccnrelay::{
    face::{FaceOptions, QueuedFaces},
    forwarder::{CountingMetrics, DropReason},
    suite, CacheLimit, ContentFields, FaceToken, Forwarder, ForwarderConfig, InterestFields,
    ManualClock, Name, Outcome, StoreBackend, Suite,
};

const BACKENDS: [StoreBackend; 2] = [StoreBackend::List, StoreBackend::Hashed];

struct Node {
    forwarder: Forwarder<QueuedFaces, ManualClock, CountingMetrics>,
    upstream: FaceToken,
    alice: FaceToken,
    bob: FaceToken,
}

impl Node {
    fn new(config: ForwarderConfig) -> Self {
        let mut faces = QueuedFaces::new();
        let upstream = faces.add_face(FaceOptions::default()).unwrap();
        let alice = faces.add_face(FaceOptions::default()).unwrap();
        let bob = faces.add_face(FaceOptions::default()).unwrap();
        for suite in Suite::ALL {
            faces.register_route(name(suite, &["a"]), upstream);
        }
        let forwarder = Forwarder::new(
            faces,
            ManualClock::starting_at(1_000),
            CountingMetrics::default(),
            config,
        );
        Self {
            forwarder,
            upstream,
            alice,
            bob,
        }
    }

    fn caching(backend: StoreBackend) -> Self {
        Self::new(
            ForwarderConfig::default()
                .with_store_backend(backend)
                .with_cache_limit(CacheLimit::Unbounded),
        )
    }

    fn receive(&mut self, from: FaceToken, packet: &[u8]) -> Outcome {
        let outcomes = self.forwarder.receive(from, packet);
        assert_eq!(outcomes.len(), 1, "{outcomes:?}");
        outcomes[0]
    }

    fn sent_to(&mut self, face: FaceToken) -> Vec<Box<[u8]>> {
        self.forwarder.faces_mut().take_sent(face)
    }
}

fn name(suite: Suite, path: &[&str]) -> Name {
    let components: Vec<&[u8]> = path.iter().map(|c| c.as_bytes()).collect();
    Name::from_components(suite, &components).unwrap()
}

fn interest(suite: Suite, path: &[&str], fields: &InterestFields) -> Box<[u8]> {
    suite::encode_interest(&name(suite, path), fields).unwrap()
}

fn content(suite: Suite, path: &[&str], payload: &[u8]) -> Box<[u8]> {
    suite::encode_content(&name(suite, path), payload, &ContentFields::default()).unwrap()
}

#[test]
fn test_interest_content_round_trip() {
    for backend in BACKENDS {
        for suite in Suite::ALL {
            let mut node = Node::caching(backend);
            let (alice, upstream) = (node.alice, node.upstream);
            let request = interest(suite, &["a", "b"], &InterestFields::default());

            assert_eq!(node.receive(alice, &request), Outcome::Forwarded { faces: 1 });
            assert_eq!(node.forwarder.pit().len(), 1);
            let forwarded = node.sent_to(upstream);
            assert_eq!(forwarded.len(), 1);

            let answer = content(suite, &["a", "b"], b"hello");
            assert_eq!(node.receive(upstream, &answer), Outcome::Delivered { faces: 1 });
            assert!(node.forwarder.pit().is_empty());
            assert_eq!(node.sent_to(alice), vec![answer.clone()]);
            assert_eq!(node.forwarder.store().len(), 1);
        }
    }
}

#[test]
fn test_pit_aggregation() {
    for backend in BACKENDS {
        let mut node = Node::caching(backend);
        let (alice, bob, upstream) = (node.alice, node.bob, node.upstream);
        let plain = interest(Suite::Ccnb, &["a", "b"], &InterestFields::default().with_nonce(b"n1"));
        let again = interest(Suite::Ccnb, &["a", "b"], &InterestFields::default().with_nonce(b"n2"));
        let keyed = interest(
            Suite::Ccnb,
            &["a", "b"],
            &InterestFields::default()
                .with_nonce(b"n3")
                .with_publisher_digest(&[9; 32]),
        );

        assert_eq!(node.receive(alice, &plain), Outcome::Forwarded { faces: 1 });
        assert_eq!(node.receive(bob, &again), Outcome::Aggregated);
        assert_eq!(node.forwarder.pit().len(), 1);
        // Only the first one went upstream
        assert_eq!(node.sent_to(upstream).len(), 1);

        assert_eq!(node.receive(bob, &keyed), Outcome::Forwarded { faces: 1 });
        assert_eq!(node.forwarder.pit().len(), 2);

        // Unsigned content answers the plain interest only
        let answer = content(Suite::Ccnb, &["a", "b"], b"x");
        assert_eq!(node.receive(upstream, &answer), Outcome::Delivered { faces: 2 });
        assert_eq!(node.sent_to(alice).len(), 1);
        assert_eq!(node.sent_to(bob).len(), 1);
        assert_eq!(node.forwarder.pit().len(), 1);
    }
}

#[test]
fn test_cache_short_circuit() {
    for backend in BACKENDS {
        let mut node = Node::caching(backend);
        let (alice, bob, upstream) = (node.alice, node.bob, node.upstream);
        let answer = content(Suite::NdnTlv, &["a", "b"], b"cached");

        node.receive(alice, &interest(Suite::NdnTlv, &["a", "b"], &InterestFields::default()));
        node.receive(upstream, &answer);
        node.sent_to(upstream);

        let request = interest(Suite::NdnTlv, &["a", "b"], &InterestFields::default());
        assert_eq!(node.receive(bob, &request), Outcome::AnsweredFromCache);
        assert!(node.forwarder.pit().is_empty());
        assert!(node.sent_to(upstream).is_empty());
        assert_eq!(node.sent_to(bob), vec![answer]);
        assert_eq!(node.forwarder.store().lookup(&name(Suite::NdnTlv, &["a", "b"])).unwrap().served(), 1);
    }
}

#[test]
fn test_unsolicited_content_is_not_cached() {
    for backend in BACKENDS {
        let mut node = Node::caching(backend);
        let upstream = node.upstream;
        assert_eq!(
            node.receive(upstream, &content(Suite::NdnTlv, &["a", "z"], b"spam")),
            Outcome::Dropped(DropReason::Unsolicited)
        );
        assert!(node.forwarder.store().is_empty());
        assert_eq!(node.forwarder.metrics().drops(DropReason::Unsolicited), 1);
    }
}

#[test]
fn test_duplicate_content_is_dropped() {
    for backend in BACKENDS {
        let mut node = Node::caching(backend);
        let (alice, upstream) = (node.alice, node.upstream);
        let answer = content(Suite::CcnTlv, &["a", "b"], b"once");
        node.receive(alice, &interest(Suite::CcnTlv, &["a", "b"], &InterestFields::default()));
        assert_eq!(node.receive(upstream, &answer), Outcome::Delivered { faces: 1 });
        assert_eq!(
            node.receive(upstream, &answer),
            Outcome::Dropped(DropReason::AlreadyCached)
        );
        assert_eq!(node.forwarder.store().len(), 1);
    }
}

#[test]
fn test_caching_disabled() {
    let mut node = Node::new(ForwarderConfig::default());
    let (alice, upstream) = (node.alice, node.upstream);
    node.receive(alice, &interest(Suite::NdnTlv, &["a"], &InterestFields::default()));
    assert_eq!(
        node.receive(upstream, &content(Suite::NdnTlv, &["a"], b"x")),
        Outcome::Delivered { faces: 1 }
    );
    assert!(node.forwarder.store().is_empty());
}

#[test]
fn test_static_content_served_without_cache() {
    let mut node = Node::new(ForwarderConfig::default());
    let alice = node.alice;
    let produced = content(Suite::Ccnb, &["a", "local"], b"mine");
    let (packet, _) = suite::decode(&produced).unwrap();
    node.forwarder.add_static_content(packet).unwrap();

    let request = interest(Suite::Ccnb, &["a", "local"], &InterestFields::default());
    assert_eq!(node.receive(alice, &request), Outcome::AnsweredFromCache);
    assert_eq!(node.sent_to(alice), vec![produced]);

    // Idle for ages, still there
    node.forwarder.clock_mut().advance(10_000_000);
    node.forwarder.age();
    assert_eq!(node.forwarder.store().len(), 1);
}

#[test]
fn test_duplicate_nonce_is_dropped() {
    let mut node = Node::caching(StoreBackend::List);
    let (alice, bob) = (node.alice, node.bob);
    let request = interest(Suite::NdnTlv, &["a"], &InterestFields::default().with_nonce(&[1, 2, 3, 4]));
    assert_eq!(node.receive(alice, &request), Outcome::Forwarded { faces: 1 });
    assert_eq!(
        node.receive(bob, &request),
        Outcome::Dropped(DropReason::DuplicateNonce)
    );
    assert!(!node.forwarder.pit().entries().next().unwrap().is_pending_on(bob));
    assert_eq!(node.forwarder.nonces().len(), 1);
}

#[test]
fn test_link_local_scope_is_not_propagated() {
    let mut node = Node::caching(StoreBackend::Hashed);
    let (alice, upstream) = (node.alice, node.upstream);
    let request = interest(Suite::Ccnb, &["a"], &InterestFields::default().with_scope(1));
    assert_eq!(node.receive(alice, &request), Outcome::Forwarded { faces: 0 });
    assert_eq!(node.forwarder.pit().len(), 1);
    assert!(node.sent_to(upstream).is_empty());
}

#[test]
fn test_ccnx_hop_limit() {
    let mut node = Node::caching(StoreBackend::List);
    let (alice, upstream) = (node.alice, node.upstream);
    let fields = InterestFields {
        hop_limit: Some(1),
        ..InterestFields::default()
    };
    assert_eq!(
        node.receive(alice, &interest(Suite::CcnTlv, &["a"], &fields)),
        Outcome::Dropped(DropReason::HopLimitExpired)
    );
    assert!(node.forwarder.pit().is_empty());

    let fields = InterestFields {
        hop_limit: Some(5),
        ..InterestFields::default()
    };
    assert_eq!(
        node.receive(alice, &interest(Suite::CcnTlv, &["a"], &fields)),
        Outcome::Forwarded { faces: 1 }
    );
    let forwarded = node.sent_to(upstream);
    assert_eq!(forwarded[0][4], 4);
}

#[test]
fn test_local_delivery() {
    let mut faces = QueuedFaces::new();
    let upstream = faces.add_face(FaceOptions::default()).unwrap();
    let app = faces.add_face(FaceOptions::local()).unwrap();
    faces.register_route(name(Suite::NdnTlv, &["a"]), upstream);
    let mut forwarder = Forwarder::new(
        faces,
        ManualClock::starting_at(0),
        CountingMetrics::default(),
        ForwarderConfig::default(),
    );

    forwarder.receive(app, &interest(Suite::NdnTlv, &["a", "b"], &InterestFields::default()));
    forwarder.receive(upstream, &content(Suite::NdnTlv, &["a", "b"], b"for you"));

    assert!(forwarder.faces_mut().take_sent(app).is_empty());
    let delivered = forwarder.faces_mut().take_delivered(app);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), Some(&b"for you"[..]));
    assert_eq!(forwarder.metrics().contents_sent, 1);
}

#[test]
fn test_forward_all_faces() {
    let mut faces = QueuedFaces::new();
    let upstream = faces.add_face(FaceOptions::default()).unwrap();
    let alice = faces.add_face(FaceOptions::default()).unwrap();
    let eager = faces
        .add_face(FaceOptions::default().forwarding_all_interests())
        .unwrap();
    faces.register_route(name(Suite::NdnTlv, &["a"]), upstream);
    let mut forwarder = Forwarder::new(
        faces,
        ManualClock::starting_at(0),
        CountingMetrics::default(),
        ForwarderConfig::default(),
    );

    let request = interest(Suite::NdnTlv, &["a"], &InterestFields::default());
    forwarder.receive(alice, &request);
    assert_eq!(forwarder.receive(alice, &request), vec![Outcome::Aggregated]);
    assert_eq!(forwarder.faces_mut().take_sent(upstream).len(), 1);

    assert_eq!(forwarder.receive(eager, &request), vec![Outcome::Aggregated]);
    assert_eq!(forwarder.faces_mut().take_sent(upstream).len(), 1);
}

#[test]
fn test_ageing_retransmits_then_expires() {
    for backend in BACKENDS {
        let mut node = Node::new(
            ForwarderConfig::default()
                .with_store_backend(backend)
                .with_interest_timeout_ms(1_000),
        );
        let (alice, upstream) = (node.alice, node.upstream);
        node.receive(alice, &interest(Suite::NdnTlv, &["a"], &InterestFields::default()));
        node.sent_to(upstream);

        node.forwarder.clock_mut().advance(500);
        let report = node.forwarder.age();
        assert_eq!(report.interests, 0);
        assert_eq!(report.retransmitted, 1);
        assert_eq!(node.sent_to(upstream).len(), 1);
        assert!(node.sent_to(alice).is_empty());

        node.forwarder.clock_mut().advance(600);
        let report = node.forwarder.age();
        assert_eq!(report.interests, 1);
        assert!(node.forwarder.pit().is_empty());
    }
}

#[test]
fn test_ageing_drops_idle_content() {
    let mut node = Node::new(
        ForwarderConfig::default()
            .with_cache_limit(CacheLimit::bounded(8))
            .with_content_timeout_ms(1_000),
    );
    let (alice, upstream) = (node.alice, node.upstream);
    node.receive(alice, &interest(Suite::NdnTlv, &["a"], &InterestFields::default()));
    node.receive(upstream, &content(Suite::NdnTlv, &["a"], b"x"));
    assert_eq!(node.forwarder.store().len(), 1);

    node.forwarder.clock_mut().advance(2_000);
    assert_eq!(node.forwarder.age().contents, 1);
    assert!(node.forwarder.store().is_empty());
}

#[test]
fn test_remove_face() {
    let mut node = Node::caching(StoreBackend::List);
    let (alice, bob) = (node.alice, node.bob);
    node.receive(alice, &interest(Suite::NdnTlv, &["a", "1"], &InterestFields::default()));
    node.receive(bob, &interest(Suite::NdnTlv, &["a", "1"], &InterestFields::default()));
    node.receive(alice, &interest(Suite::NdnTlv, &["a", "2"], &InterestFields::default()));
    assert_eq!(node.forwarder.pit().len(), 2);

    assert_eq!(node.forwarder.remove_face(alice), 1);
    assert_eq!(node.forwarder.pit().len(), 1);
    assert_eq!(node.forwarder.remove_face(bob), 1);
    assert!(node.forwarder.pit().is_empty());
}

#[test]
fn test_several_packets_per_datagram() {
    let mut node = Node::caching(StoreBackend::Hashed);
    let alice = node.alice;
    let mut datagram = Vec::new();
    datagram.extend_from_slice(&interest(Suite::NdnTlv, &["a", "1"], &InterestFields::default()));
    datagram.extend_from_slice(&interest(Suite::NdnTlv, &["a", "2"], &InterestFields::default()));
    datagram.extend_from_slice(&[0x05, 0xff]);

    assert_eq!(
        node.forwarder.receive(alice, &datagram),
        vec![
            Outcome::Forwarded { faces: 1 },
            Outcome::Forwarded { faces: 1 },
            Outcome::Dropped(DropReason::Malformed),
        ]
    );
    assert_eq!(node.forwarder.metrics().interests_received, 2);
}

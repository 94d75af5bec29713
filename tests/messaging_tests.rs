//! Channel contract tests: delivery patterns, backpressure, timeouts and
//! the bind/connect failure modes.

mod common;

use common::fast_config;
use std::time::Duration;
use wheelhouse_core::error::{Error, ProtocolError, TransportError};
use wheelhouse_core::messaging::{Envelope, MessagingContext};
use wheelhouse_core::MasterConfig;

fn ctx() -> MessagingContext {
    MessagingContext::new(&fast_config())
}

#[tokio::test]
async fn queue_preserves_per_producer_order() {
    // All six envelopes are buffered before the first recv, so the queue
    // needs room for them; backpressure itself is covered by
    // `send_blocks_at_high_water_mark`.
    let config = MasterConfig {
        high_water_mark: 6,
        ..fast_config()
    };
    let ctx = MessagingContext::new(&config);
    let mut rx = ctx.bind_queue("inproc://order").unwrap();
    let a = ctx.connect_queue("inproc://order").unwrap();
    let b = ctx.connect_queue("inproc://order").unwrap();

    for i in 0..3 {
        a.send(Envelope::new(format!("A{i}"))).await.unwrap();
        b.send(Envelope::new(format!("B{i}"))).await.unwrap();
    }

    let mut verbs = Vec::new();
    for _ in 0..6 {
        let envelope = rx.recv(Duration::from_millis(200)).await.unwrap().unwrap();
        verbs.push(envelope.verb);
    }
    let from_a: Vec<_> = verbs.iter().filter(|v| v.starts_with('A')).collect();
    let from_b: Vec<_> = verbs.iter().filter(|v| v.starts_with('B')).collect();
    assert_eq!(from_a, ["A0", "A1", "A2"]);
    assert_eq!(from_b, ["B0", "B1", "B2"]);
}

#[tokio::test]
async fn send_blocks_at_high_water_mark() {
    let config = MasterConfig {
        high_water_mark: 1,
        send_timeout: Duration::from_millis(100),
        ..fast_config()
    };
    let ctx = MessagingContext::new(&config);
    let mut rx = ctx.bind_queue("inproc://hwm").unwrap();
    let tx = ctx.connect_queue("inproc://hwm").unwrap();

    tx.send(Envelope::new("FIRST")).await.unwrap();
    // Queue full: the next send blocks until the timeout, never drops.
    let err = tx.send(Envelope::new("SECOND")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::SendTimeout { .. })
    ));

    // Draining one slot unblocks the producer.
    rx.recv(Duration::from_millis(100)).await.unwrap().unwrap();
    tx.send(Envelope::new("SECOND")).await.unwrap();
}

#[tokio::test]
async fn recv_timeout_is_not_an_error() {
    let ctx = ctx();
    let mut rx = ctx.bind_queue("inproc://quiet").unwrap();
    let got = rx.recv(Duration::from_millis(50)).await.unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn bind_conflict_and_unreachable_connect() {
    let ctx = ctx();
    ctx.bind_queue("inproc://taken").unwrap();
    let err = ctx.bind_queue("inproc://taken").unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::AddressInUse { .. })
    ));

    let err = ctx.connect_queue("inproc://nowhere").unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::Unreachable { .. })
    ));
}

#[tokio::test]
async fn connect_with_wrong_pattern_is_refused() {
    let ctx = ctx();
    ctx.bind_queue("inproc://mixed").unwrap();
    let err = ctx.connect_req("inproc://mixed").unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::PatternMismatch { .. })
    ));
}

#[tokio::test]
async fn pair_is_symmetric_and_admits_one_peer() {
    let ctx = ctx();
    let mut bound = ctx.bind_pair("inproc://pair").unwrap();
    let mut peer = ctx.connect_pair("inproc://pair").unwrap();

    bound.send(Envelope::new("PING")).await.unwrap();
    let got = peer.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert_eq!(got.verb, "PING");
    peer.send(Envelope::new("PONG")).await.unwrap();
    let got = bound.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert_eq!(got.verb, "PONG");

    let err = ctx.connect_pair("inproc://pair").unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::AddressInUse { .. })
    ));
}

#[tokio::test]
async fn req_socket_enforces_alternation() {
    let ctx = ctx();
    let mut router = ctx.bind_router("inproc://rr").unwrap();
    let mut req = ctx.connect_req("inproc://rr").unwrap();

    // Receive before any send is out of turn.
    let err = req.recv(Duration::from_millis(10)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::AlternationViolated { .. })
    ));

    req.send(Envelope::new("ASK")).await.unwrap();
    // A second send before the reply is out of turn.
    let err = req.send(Envelope::new("ASK")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::AlternationViolated { .. })
    ));

    let (peer, envelope) = router
        .recv(Duration::from_millis(200))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.verb, "ASK");
    router.send(peer, Envelope::ok()).await.unwrap();
    let reply = req.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert!(reply.is_ok());
}

#[tokio::test]
async fn router_forgets_disconnected_peers() {
    let ctx = ctx();
    let mut router = ctx.bind_router("inproc://churn").unwrap();

    let mut req = ctx.connect_req("inproc://churn").unwrap();
    req.send(Envelope::new("HELLO")).await.unwrap();
    let (peer, _) = router.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    router.send(peer, Envelope::ok()).await.unwrap();
    req.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert_eq!(router.peer_count(), 1);

    // A reconnect mints a fresh identity; the old entry must not linger.
    drop(req);
    let mut req = ctx.connect_req("inproc://churn").unwrap();
    req.send(Envelope::new("AGAIN")).await.unwrap();
    router.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert_eq!(router.peer_count(), 2);

    router.prune_peers();
    assert_eq!(router.peer_count(), 1);
}

#[tokio::test]
async fn router_replies_reach_the_right_peer() {
    let ctx = ctx();
    let mut router = ctx.bind_router("inproc://many").unwrap();
    let mut alice = ctx.connect_req("inproc://many").unwrap();
    let mut bob = ctx.connect_req("inproc://many").unwrap();

    alice.send(Envelope::new("ALICE")).await.unwrap();
    bob.send(Envelope::new("BOB")).await.unwrap();

    for _ in 0..2 {
        let (peer, envelope) = router
            .recv(Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();
        let reply = Envelope::new(format!("{}-REPLY", envelope.verb));
        router.send(peer, reply).await.unwrap();
    }

    let reply = alice.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert_eq!(reply.verb, "ALICE-REPLY");
    let reply = bob.recv(Duration::from_millis(200)).await.unwrap().unwrap();
    assert_eq!(reply.verb, "BOB-REPLY");
}

use std::time::Duration;

use crate::net::link::{RECEIVER_ADDR, SENDER_ADDR};
use crate::net::wire;
use crate::net::{
    DelayRange, EmulatedLink, LinkConfig, ReceiverAction, ReceiverEmulator, RecvOutcome,
    Transport, Verdict,
};
use crate::sim::{Clock, ManualClock, SimTime};

fn fixed_delay(ms: f64) -> LinkConfig {
    LinkConfig {
        loss_probability: 0.0,
        extended_delay_probability: 0.0,
        normal_delay: DelayRange::new(ms, ms),
        ..LinkConfig::default()
    }
}

#[test]
fn same_seed_gives_same_verdicts() {
    let cfg = LinkConfig {
        loss_probability: 0.3,
        extended_delay_probability: 0.2,
        seed: 99,
        ..LinkConfig::default()
    };
    let mut a = ReceiverEmulator::new(cfg.clone());
    let mut b = ReceiverEmulator::new(cfg);
    let va: Vec<Verdict> = (0..200).map(|_| a.verdict()).collect();
    let vb: Vec<Verdict> = (0..200).map(|_| b.verdict()).collect();
    assert_eq!(va, vb);
}

#[test]
fn full_loss_drops_every_data_unit() {
    let mut rx = ReceiverEmulator::new(LinkConfig {
        loss_probability: 1.0,
        ..LinkConfig::default()
    });
    for id in 1..=20u64 {
        assert_eq!(rx.on_unit(&wire::encode_data(id, b"x")), ReceiverAction::Drop { id });
    }
    let stats = rx.stats();
    assert_eq!(stats.data_units, 20);
    assert_eq!(stats.dropped, 20);
    assert_eq!(stats.delivered, 0);
    assert_eq!(rx.received_count(), 0);
    assert!(!rx.has_received(1));
}

#[test]
fn delivered_units_are_remembered() {
    let mut rx = ReceiverEmulator::new(fixed_delay(2.0));
    assert_eq!(rx.config().normal_delay.max_ms, 2.0);
    assert_eq!(
        rx.on_unit(&wire::encode_data(5, b"x")),
        ReceiverAction::Ack { ack: b"00000005".to_vec(), delay: Duration::from_millis(2) }
    );
    assert!(rx.has_received(5));
    assert!(!rx.has_received(6));
    assert_eq!(rx.received_count(), 1);
}

#[test]
fn delays_stay_within_configured_ranges() {
    let mut rx = ReceiverEmulator::new(LinkConfig {
        loss_probability: 0.0,
        extended_delay_probability: 0.5,
        normal_delay: DelayRange::new(1.0, 10.0),
        extended_delay: DelayRange::new(150.0, 500.0),
        seed: 3,
    });
    for _ in 0..500 {
        match rx.verdict() {
            Verdict::Deliver { delay, extended: false } => {
                assert!(delay >= Duration::from_millis(1) && delay <= Duration::from_millis(10));
            }
            Verdict::Deliver { delay, extended: true } => {
                assert!(delay >= Duration::from_millis(150) && delay <= Duration::from_millis(500));
            }
            Verdict::Drop => panic!("loss probability is zero"),
        }
    }
}

#[test]
fn markers_and_end_unit() {
    let mut rx = ReceiverEmulator::new(LinkConfig::default());
    assert_eq!(rx.on_unit(&wire::encode_start()), ReceiverAction::Marker);
    assert_eq!(rx.on_unit(&wire::encode_eof()), ReceiverAction::Marker);
    assert_eq!(rx.on_unit(b"junk"), ReceiverAction::Malformed);
    assert!(!rx.is_closed());
    assert_eq!(
        rx.on_unit(&wire::encode_end()),
        ReceiverAction::Close { ack: b"-0000002".to_vec() }
    );
    assert!(rx.is_closed());

    let stats = rx.stats();
    assert_eq!(stats.rounds_started, 1);
    assert_eq!(stats.streams_finished, 1);
    assert_eq!(stats.malformed, 1);
}

#[test]
fn link_config_validation() {
    assert!(LinkConfig::default().validate().is_ok());
    let bad = [
        LinkConfig { loss_probability: 1.5, ..LinkConfig::default() },
        LinkConfig { extended_delay_probability: -0.1, ..LinkConfig::default() },
        LinkConfig { normal_delay: DelayRange::new(10.0, 1.0), ..LinkConfig::default() },
    ];
    for cfg in bad {
        assert!(cfg.validate().is_err(), "{cfg:?} should be rejected");
    }
}

#[test]
fn emulated_link_delivers_connect_first() {
    let clock = ManualClock::new();
    let mut link = EmulatedLink::new(LinkConfig::default(), clock.clone());
    assert_eq!(link.local_addr().ok(), Some(SENDER_ADDR));
    match link.recv_timeout(Duration::ZERO) {
        Ok(RecvOutcome::Datagram { data, from }) => {
            assert_eq!(data, wire::CONNECT.to_vec());
            assert_eq!(from, RECEIVER_ADDR);
        }
        other => panic!("expected CONNECT, got {other:?}"),
    }
    assert_eq!(clock.now(), SimTime::ZERO);
}

#[test]
fn emulated_link_advances_virtual_time() {
    let clock = ManualClock::new();
    let mut link = EmulatedLink::new(fixed_delay(5.0), clock.clone());
    let _ = link.recv_timeout(Duration::ZERO);

    link.send_to(&wire::encode_data(1, b"abc"), RECEIVER_ADDR)
        .expect("send");
    match link.recv_timeout(Duration::from_millis(10)) {
        Ok(RecvOutcome::Datagram { data, .. }) => assert_eq!(data, b"00000001".to_vec()),
        other => panic!("expected ack, got {other:?}"),
    }
    assert_eq!(clock.now(), SimTime::from_millis(5));

    assert_eq!(
        link.recv_timeout(Duration::from_millis(10)).ok(),
        Some(RecvOutcome::TimedOut)
    );
    assert_eq!(clock.now(), SimTime::from_millis(15));
}

#[test]
fn emulated_link_does_not_deliver_before_arrival() {
    let clock = ManualClock::new();
    let mut link = EmulatedLink::new(fixed_delay(50.0), clock.clone());
    let _ = link.recv_timeout(Duration::ZERO);

    link.send_to(&wire::encode_data(1, b"abc"), RECEIVER_ADDR)
        .expect("send");
    assert_eq!(
        link.recv_timeout(Duration::from_millis(20)).ok(),
        Some(RecvOutcome::TimedOut)
    );
    assert_eq!(link.pending_len(), 1);
    assert!(matches!(
        link.recv_timeout(Duration::from_millis(40)),
        Ok(RecvOutcome::Datagram { .. })
    ));
    assert_eq!(clock.now(), SimTime::from_millis(50));
}

#[test]
fn emulated_link_close_is_idempotent() {
    let mut link = EmulatedLink::new(LinkConfig::default(), ManualClock::new());
    assert!(link.close().is_ok());
    assert!(link.close().is_ok());
    assert!(link.send_to(b"00000001x", RECEIVER_ADDR).is_err());
    assert!(link.recv_timeout(Duration::ZERO).is_err());
}

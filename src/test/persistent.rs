use std::time::Duration;

use crate::proto::persistent::PersistentCongestionDetector;
use crate::sim::SimTime;

const PERIOD: Duration = Duration::from_millis(100);

#[test]
fn single_loss_is_never_persistent() {
    let mut d = PersistentCongestionDetector::new();
    assert!(!d.on_lost(1, SimTime::ZERO, Duration::ZERO));
    assert_eq!(d.run_len(), 1);
    assert_eq!(d.last_lost(), Some(1));
}

#[test]
fn short_span_is_not_persistent() {
    let mut d = PersistentCongestionDetector::new();
    assert!(!d.on_lost(1, SimTime::from_millis(0), PERIOD));
    assert!(!d.on_lost(2, SimTime::from_millis(60), PERIOD));
    assert!(!d.on_lost(3, SimTime::from_millis(100), PERIOD), "span must exceed the period");
    assert_eq!(d.run_len(), 3);
}

#[test]
fn long_span_is_persistent_and_restarts_the_run() {
    let mut d = PersistentCongestionDetector::new();
    assert!(!d.on_lost(1, SimTime::from_millis(0), PERIOD));
    assert!(d.on_lost(2, SimTime::from_millis(150), PERIOD));
    assert_eq!(d.run_len(), 0);

    // the next run starts from scratch
    assert!(!d.on_lost(3, SimTime::from_millis(300), PERIOD));
    assert_eq!(d.run_len(), 1);
}

#[test]
fn ack_breaks_the_run() {
    let mut d = PersistentCongestionDetector::new();
    d.on_lost(1, SimTime::from_millis(0), PERIOD);
    d.on_ack();
    assert_eq!(d.run_len(), 0);
    assert!(!d.on_lost(2, SimTime::from_millis(500), PERIOD));
}

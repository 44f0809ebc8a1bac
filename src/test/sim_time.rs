use std::time::Duration;

use crate::sim::{Clock, ManualClock, SimTime};

#[test]
fn sim_time_unit_conversions() {
    assert_eq!(SimTime::from_millis(1), SimTime(1_000_000));
    assert_eq!(SimTime::from_duration(Duration::from_millis(3)), SimTime::from_millis(3));
}

#[test]
fn sim_time_unit_conversions_saturate_on_overflow() {
    assert_eq!(SimTime::from_millis(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime(u64::MAX).saturating_add(Duration::from_secs(1)), SimTime(u64::MAX));
}

#[test]
fn saturating_since_never_goes_negative() {
    let early = SimTime::from_millis(5);
    let late = SimTime::from_millis(12);
    assert_eq!(late.saturating_since(early), Duration::from_millis(7));
    assert_eq!(early.saturating_since(late), Duration::ZERO);
}

#[test]
fn manual_clock_handles_share_time_and_never_rewind() {
    let clock = ManualClock::new();
    let other = clock.clone();
    assert_eq!(clock.now(), SimTime::ZERO);

    clock.advance(Duration::from_millis(10));
    assert_eq!(other.now(), SimTime::from_millis(10));

    other.advance_to(SimTime::from_millis(4));
    assert_eq!(clock.now(), SimTime::from_millis(10), "advance_to must not rewind");

    other.advance_to(SimTime::from_millis(25));
    assert_eq!(clock.now(), SimTime::from_millis(25));
}

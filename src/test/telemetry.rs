use std::time::Duration;

use crate::proto::newreno::CongestionController;
use crate::proto::report::{RoundReport, RttSample};
use crate::sim::SimTime;
use crate::telemetry::{TelemetryEvent, TelemetryEventKind, TelemetryLog};

#[test]
fn snapshot_serializes_flat_with_kind_tag() {
    let cc = CongestionController::default();
    let ev = TelemetryEvent::snapshot(
        SimTime::from_millis(3),
        &cc,
        TelemetryEventKind::Ack {
            packet_id: 9,
            rtt_ms: 4.5,
        },
    );
    let v = serde_json::to_value(&ev).expect("serialize");
    assert_eq!(v["kind"], "ack");
    assert_eq!(v["packet_id"], 9);
    assert_eq!(v["t_ns"], 3_000_000);
    assert_eq!(v["cwnd_bytes"], 3000);
    assert_eq!(v["state"], "slow_start");
    assert!(v["ssthresh_bytes"].is_null(), "unbounded threshold is null");

    let back: TelemetryEvent = serde_json::from_value(v).expect("deserialize");
    assert_eq!(back, ev);
}

#[test]
fn loss_event_reports_threshold_and_omits_missing_retransmit() {
    let mut cc = CongestionController::default();
    cc.on_loss(1, SimTime::ZERO, SimTime::from_millis(750));
    let ev = TelemetryEvent::snapshot(
        SimTime::from_millis(750),
        &cc,
        TelemetryEventKind::Loss {
            packet_id: 1,
            persistent: false,
            retransmitted_as: None,
        },
    );
    let v = serde_json::to_value(&ev).expect("serialize");
    assert_eq!(v["kind"], "loss");
    assert_eq!(v["ssthresh_bytes"], 3000);
    assert_eq!(v["state"], "recovery");
    assert_eq!(v["loss_detected"], true);
    assert!(v.get("retransmitted_as").is_none());
}

#[test]
fn log_series_follows_push_order() {
    let mut cc = CongestionController::default();
    let mut log = TelemetryLog::default();
    assert!(log.is_empty());
    for i in 1..=3u64 {
        let now = SimTime::from_millis(i * 10);
        cc.on_ack(i, 1500, Duration::from_millis(10), now);
        log.push(TelemetryEvent::snapshot(
            now,
            &cc,
            TelemetryEventKind::Ack {
                packet_id: i,
                rtt_ms: 10.0,
            },
        ));
    }
    let cwnds: Vec<u64> = log.series().map(|(_, cwnd, _, _)| cwnd).collect();
    assert_eq!(cwnds, vec![4500, 6000, 7500]);

    let parsed: serde_json::Value =
        serde_json::from_str(&log.to_json_pretty().expect("json")).expect("parse");
    assert_eq!(parsed.as_array().map(Vec::len), Some(3));
}

#[test]
fn round_report_min_rtt_and_goodput() {
    let mut report = RoundReport::new(0, SimTime::ZERO);
    for (i, rtt) in [8.0, 5.0, 9.0, 3.0].into_iter().enumerate() {
        report.rtt_samples.push(RttSample {
            packet_id: i as u64 + 1,
            t_ns: 0,
            rtt_ms: rtt,
        });
    }
    assert_eq!(report.min_rtt_over_time(), vec![8.0, 5.0, 5.0, 3.0]);
    assert_eq!(report.goodput_mbps(), None);

    report.bytes_delivered = 1_000_000;
    report.finished_ns = Some(1_000_000_000);
    let mbps = report.goodput_mbps().expect("finished");
    assert!((mbps - 8.0).abs() < 1e-9);
}

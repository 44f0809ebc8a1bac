use crate::error::ConfigError;
use crate::sim::{DEFAULT_NUM_PACKETS, DEFAULT_PORT, SessionSpec};

#[test]
fn empty_json_yields_defaults() {
    let spec = SessionSpec::from_json_str("{}").expect("parse");
    assert_eq!(spec, SessionSpec::default());
    assert_eq!(spec.port, DEFAULT_PORT);
    assert_eq!(spec.num_packets, DEFAULT_NUM_PACKETS);
    assert_eq!(spec.rounds, 1);
    assert_eq!(spec.congestion.mss, 1500);
    assert_eq!(spec.sender.ack_timeout_ms, 750);
    assert_eq!(spec.sender.persistent_congestion_ms, None);
}

#[test]
fn partial_json_overrides_nested_fields() {
    let raw = r#"{
        "num_packets": 10,
        "rounds": 3,
        "congestion": { "rtt_alpha": 0.25 },
        "sender": { "retransmit": true, "persistent_congestion_ms": 2000 },
        "link": { "loss_probability": 0.2, "normal_delay": { "min_ms": 2.0, "max_ms": 4.0 } }
    }"#;
    let spec = SessionSpec::from_json_str(raw).expect("parse");
    assert_eq!(spec.num_packets, 10);
    assert_eq!(spec.rounds, 3);
    assert_eq!(spec.congestion.rtt_alpha, 0.25);
    assert_eq!(spec.congestion.rtt_beta, 0.25);
    assert!(spec.sender.retransmit);
    assert_eq!(spec.sender.persistent_congestion_ms, Some(2000));
    assert_eq!(spec.link.loss_probability, 0.2);
    assert_eq!(spec.link.normal_delay.max_ms, 4.0);
    assert_eq!(spec.link.extended_delay.min_ms, 150.0);
}

#[test]
fn invalid_values_are_reported() {
    for raw in [
        r#"{ "rounds": 0 }"#,
        r#"{ "link": { "loss_probability": 1.5 } }"#,
        r#"{ "congestion": { "mss": 0 } }"#,
        r#"{ "sender": { "ack_timeout_ms": 0 } }"#,
    ] {
        assert!(
            matches!(SessionSpec::from_json_str(raw), Err(ConfigError::Invalid(_))),
            "{raw} should be invalid"
        );
    }
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(
        SessionSpec::from_json_str("{ not json"),
        Err(ConfigError::Json(_))
    ));
    assert!(matches!(
        SessionSpec::load(std::path::Path::new("/nonexistent/newreno-session.json")),
        Err(ConfigError::Io(_))
    ));
}

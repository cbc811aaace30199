//! Tests for identifier newtypes and the epoch-millisecond timestamp.

use super::*;

#[test]
fn test_timestamp_rfc3339_round_trip() {
    let ts = Timestamp::from_rfc3339("2026-02-18T10:00:00Z").expect("parse");
    assert_eq!(ts.as_millis(), 1_771_408_800_000);
    assert_eq!(ts.to_rfc3339(), "2026-02-18T10:00:00+00:00");
}

#[test]
fn test_timestamp_ordering_matches_wall_clock() {
    let earlier = Timestamp::from_rfc3339("2026-02-18T10:00:00Z").expect("parse");
    let later = Timestamp::from_rfc3339("2026-02-18T12:00:00Z").expect("parse");
    assert!(earlier < later);
}

#[test]
fn test_timestamp_arithmetic() {
    let ts = Timestamp::from_millis(10_000);
    assert_eq!(
        ts.saturating_add(Duration::from_secs(5)).as_millis(),
        15_000
    );
    assert_eq!(ts.saturating_sub(Duration::from_secs(5)).as_millis(), 5_000);
}

#[test]
fn test_invalid_rfc3339_is_rejected() {
    assert!(Timestamp::from_rfc3339("yesterday").is_err());
}

#[test]
fn test_delivery_id_rejects_empty() {
    assert!(DeliveryId::new("").is_err());
    assert!(DeliveryId::new("d-1").is_ok());
}

#[test]
fn test_delivery_id_accepts_bootstrap_keyspace() {
    let id = DeliveryId::new("bootstrap-pulls:12345:chunk-3").expect("valid");
    assert_eq!(id.as_str(), "bootstrap-pulls:12345:chunk-3");
}

#[test]
fn test_correlation_id_validation() {
    assert!(CorrelationId::new("").is_err());
    assert!(CorrelationId::new("c".repeat(129)).is_err());
    let id = CorrelationId::new("c1").expect("valid");
    assert_eq!(id.as_str(), "c1");
}

#[test]
fn test_repository_id_parses_from_string() {
    let id: RepositoryId = "12345".parse().expect("parse");
    assert_eq!(id.as_u64(), 12345);
    assert!("not-a-number".parse::<RepositoryId>().is_err());
}

#[test]
fn test_job_id_display_round_trip() {
    let id = JobId::new();
    let parsed: JobId = id.to_string().parse().expect("parse");
    assert_eq!(parsed, id);
}

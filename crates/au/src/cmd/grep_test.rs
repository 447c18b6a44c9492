//! Tests for grep argument handling

use super::{parse_interval, parse_time_point};

const DAY: i64 = 86_400_000_000_000;

#[test]
fn test_parse_date_only() {
    assert_eq!(parse_time_point("1970-01-01").unwrap(), 0);
    assert_eq!(parse_time_point("1970-01-02").unwrap(), DAY);
}

#[test]
fn test_parse_seconds_and_fraction() {
    assert_eq!(parse_time_point("1970-01-01T00:00:01").unwrap(), 1_000_000_000);
    assert_eq!(
        parse_time_point("1970-01-01T00:00:00.123456").unwrap(),
        123_456_000
    );
}

#[test]
fn test_parse_interval_with_end() {
    let (lo, hi) = parse_interval("1970-01-01,1970-01-02").unwrap();
    assert_eq!(lo, 0);
    assert_eq!(hi, DAY);
}

#[test]
fn test_parse_interval_open_ended() {
    let (lo, hi) = parse_interval("1970-01-02").unwrap();
    assert_eq!(lo, DAY);
    assert_eq!(hi, i64::MAX);
}

#[test]
fn test_empty_interval_rejected() {
    assert!(parse_interval("1970-01-02,1970-01-01").is_err());
    assert!(parse_interval("1970-01-01,1970-01-01").is_err());
}

#[test]
fn test_garbage_timestamp_rejected() {
    assert!(parse_time_point("yesterday").is_err());
    assert!(parse_time_point("01/02/2024").is_err());
}

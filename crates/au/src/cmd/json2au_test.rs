//! Tests for JSON to au conversion

use std::collections::HashSet;

use au_format::{
    Dictionary, Encoder, EncoderConfig, InternHint, JsonRecordHandler, MemSource, RecordParser,
};

use super::{parse_time_string, write_value};

fn convert(json_lines: &str, no_intern: &[&str]) -> String {
    let no_intern: HashSet<&str> = no_intern.iter().copied().collect();
    let mut encoder =
        Encoder::with_config(Vec::new(), "test", EncoderConfig::default()).unwrap();
    let stream =
        serde_json::Deserializer::from_str(json_lines).into_iter::<serde_json::Value>();
    let (mut attempts, mut failures) = (0u64, 0u64);
    for value in stream {
        let value = value.unwrap();
        encoder
            .encode(|w| {
                write_value(
                    w,
                    &value,
                    &no_intern,
                    InternHint::Auto,
                    &mut attempts,
                    &mut failures,
                )
            })
            .unwrap();
    }
    let bytes = encoder.into_inner().unwrap();

    let mut source = MemSource::buffered(bytes);
    let mut dictionary = Dictionary::new();
    let mut out = Vec::new();
    let mut handler = JsonRecordHandler::new(&mut out);
    RecordParser::new(&mut source, &mut dictionary, &mut handler)
        .parse_stream()
        .unwrap();
    drop(handler);
    String::from_utf8(out).unwrap()
}

#[test]
fn test_scalar_round_trip() {
    let json = "{\"a\":1,\"b\":-2,\"c\":true,\"d\":null,\"e\":\"text\"}\n";
    assert_eq!(convert(json, &[]), json);
}

#[test]
fn test_multiple_records() {
    let json = "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n";
    assert_eq!(convert(json, &[]), json);
}

#[test]
fn test_nested_structures() {
    let json = "{\"xs\":[1,[2,3],{\"y\":\"z\"}]}\n";
    assert_eq!(convert(json, &[]), json);
}

#[test]
fn test_time_string_becomes_timestamp() {
    // A 26-byte timestamp string converts to a time value and renders back
    // in the same canonical form.
    let json = "{\"logTime\":\"2024-01-02T03:04:05.678901\"}\n";
    assert_eq!(convert(json, &[]), json);
}

#[test]
fn test_near_time_strings_stay_strings() {
    // Wrong length or shape: left untouched.
    let json = "{\"a\":\"2024-01-02T03:04:05.678\",\"b\":\"not-a-time-but-26-chars-xx\"}\n";
    assert_eq!(convert(json, &[]), json);
}

#[test]
fn test_no_intern_keys_round_trip() {
    let json = "{\"execId\":\"abc-123\"}\n{\"execId\":\"abc-123\"}\n";
    assert_eq!(convert(json, &["execId"]), json);
}

#[test]
fn test_parse_time_string() {
    assert_eq!(parse_time_string("1970-01-01T00:00:00.000000"), Some(0));
    assert_eq!(
        parse_time_string("1970-01-01T00:00:00.123456"),
        Some(123_456_000)
    );
    assert_eq!(parse_time_string("totally-not-a-valid-time!!"), None);
}

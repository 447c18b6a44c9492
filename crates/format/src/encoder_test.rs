//! Tests for the encoder and intern cache

use crate::dictionary::Dictionary;
use crate::record::{RecordHandler, RecordParser};
use crate::source::{ByteSource, MemSource};
use crate::test_util::{decode_to_json, encode_stream};
use crate::{Encoder, EncoderConfig, InternHint, Result};

/// Counts dict records in an encoded stream
#[derive(Default)]
struct DictActivity {
    clears: usize,
    adds: Vec<Vec<String>>,
}

impl<S: ByteSource> RecordHandler<S> for DictActivity {
    fn on_dict_clear(&mut self, _dict: &Dictionary) -> Result<()> {
        self.clears += 1;
        Ok(())
    }

    fn on_dict_add(&mut self, dict: &Dictionary, added: usize) -> Result<()> {
        let start = dict.len() - added;
        self.adds.push(
            (start..dict.len())
                .map(|i| dict.at(i).unwrap().to_string())
                .collect(),
        );
        Ok(())
    }

    fn on_value(&mut self, len: usize, source: &mut S, _dict: &Dictionary) -> Result<()> {
        source.skip(len as u64)
    }
}

fn dict_activity(bytes: &[u8]) -> DictActivity {
    let mut source = MemSource::buffered(bytes.to_vec());
    let mut dictionary = Dictionary::new();
    let mut handler = DictActivity::default();
    RecordParser::new(&mut source, &mut dictionary, &mut handler)
        .parse_stream()
        .unwrap();
    handler
}

// =============================================================================
// Key interning (seed scenario: {"k":"v"} twice)
// =============================================================================

#[test]
fn test_repeated_object_interns_key_once() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for _ in 0..2 {
            encoder
                .encode(|w| {
                    w.start_map();
                    w.key("k");
                    w.string("v", InternHint::Auto);
                    w.end_map();
                })
                .unwrap();
        }
    });

    let activity = dict_activity(&bytes);
    assert_eq!(activity.clears, 1, "only the preamble clear");
    assert_eq!(activity.adds, vec![vec!["k".to_string()]]);

    // "v" stayed inline both times: it never entered the dictionary.
    assert_eq!(decode_to_json(&bytes), "{\"k\":\"v\"}\n{\"k\":\"v\"}\n");
}

#[test]
fn test_stats_track_records_and_dict() {
    let mut encoder = Encoder::new(Vec::new(), "stats test").unwrap();
    for i in 0..5 {
        encoder
            .encode(|w| {
                w.start_map();
                w.key("n");
                w.uint(i);
                w.end_map();
            })
            .unwrap();
    }
    let stats = encoder.stats();
    assert_eq!(stats.records, 5);
    assert_eq!(stats.dict_size, 1);
    assert_eq!(stats.hash_size, 1);
    assert_eq!(stats.cache_size, 0, "the key was promoted");
    assert!(stats.hash_buckets >= stats.hash_size);
}

// =============================================================================
// Auto interning threshold
// =============================================================================

#[test]
fn test_auto_string_promoted_at_threshold() {
    let bytes = encode_stream(
        EncoderConfig::default().with_intern_threshold(3),
        |encoder| {
            for _ in 0..5 {
                encoder
                    .encode(|w| w.string("hot", InternHint::Auto))
                    .unwrap();
            }
        },
    );

    let activity = dict_activity(&bytes);
    assert_eq!(activity.adds, vec![vec!["hot".to_string()]]);
    assert_eq!(decode_to_json(&bytes), "\"hot\"\n".repeat(5));
}

#[test]
fn test_force_no_intern_never_promotes() {
    let bytes = encode_stream(
        EncoderConfig::default().with_intern_threshold(1),
        |encoder| {
            for _ in 0..10 {
                encoder
                    .encode(|w| w.string("id-123", InternHint::ForceNoIntern))
                    .unwrap();
            }
        },
    );
    assert!(dict_activity(&bytes).adds.is_empty());
    assert_eq!(decode_to_json(&bytes), "\"id-123\"\n".repeat(10));
}

#[test]
fn test_force_intern_promotes_immediately() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| w.string("once", InternHint::ForceIntern))
            .unwrap();
    });
    assert_eq!(dict_activity(&bytes).adds, vec![vec!["once".to_string()]]);
    assert_eq!(decode_to_json(&bytes), "\"once\"\n");
}

#[test]
fn test_key_position_overrides_no_intern_hint() {
    // Inline string keys are not representable; the writer must coerce.
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_map();
                w.string("key", InternHint::ForceNoIntern);
                w.string("value", InternHint::ForceNoIntern);
                w.end_map();
            })
            .unwrap();
    });
    assert_eq!(decode_to_json(&bytes), "{\"key\":\"value\"}\n");
}

// =============================================================================
// Dictionary soft cap
// =============================================================================

#[test]
fn test_soft_cap_triggers_clear_and_rebuild() {
    let bytes = encode_stream(EncoderConfig::default().with_soft_cap(4), |encoder| {
        for i in 0..20 {
            encoder
                .encode(|w| {
                    w.start_map();
                    w.key(&format!("key{i}"));
                    w.uint(i);
                    w.end_map();
                })
                .unwrap();
        }
    });

    let activity = dict_activity(&bytes);
    assert!(activity.clears > 1, "cap must force extra dict clears");

    // The stream still decodes in full.
    let json = decode_to_json(&bytes);
    assert_eq!(json.lines().count(), 20);
    assert!(json.contains("{\"key19\":19}"));
}

#[test]
fn test_dict_size_resets_after_cap_clear() {
    let mut encoder = Encoder::with_config(
        Vec::new(),
        "cap test",
        EncoderConfig::default().with_soft_cap(4),
    )
    .unwrap();
    for i in 0..6 {
        encoder
            .encode(|w| {
                w.start_map();
                w.key(&format!("key{i}"));
                w.boolean(true);
                w.end_map();
            })
            .unwrap();
    }
    let stats = encoder.stats();
    assert!(stats.dict_size <= 5);
}

// =============================================================================
// Full round trip
// =============================================================================

#[test]
fn test_all_types_round_trip() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_map();
                w.key("null");
                w.null();
                w.key("bools");
                w.start_array();
                w.boolean(true);
                w.boolean(false);
                w.end_array();
                w.key("int");
                w.int(-7);
                w.key("uint");
                w.uint(u64::MAX);
                w.key("double");
                w.double(2.5);
                w.key("time");
                w.time(123_456_789);
                w.key("str");
                w.string("text \"quoted\"", InternHint::Auto);
                w.end_map();
            })
            .unwrap();
    });

    assert_eq!(
        decode_to_json(&bytes),
        concat!(
            "{\"null\":null,\"bools\":[true,false],\"int\":-7,",
            "\"uint\":18446744073709551615,\"double\":2.5,",
            "\"time\":\"1970-01-01T00:00:00.123456\",",
            "\"str\":\"text \\\"quoted\\\"\"}\n"
        )
    );
}

#[test]
fn test_empty_containers() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_array();
                w.start_map();
                w.end_map();
                w.start_array();
                w.end_array();
                w.end_array();
            })
            .unwrap();
    });
    assert_eq!(decode_to_json(&bytes), "[{},[]]\n");
}

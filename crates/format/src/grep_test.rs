//! Tests for pattern matching, context emission, and bisect

use crate::source::MemSource;
use crate::test_util::{decode_to_json, encode_stream, log_stream};
use crate::{
    bisect, grep, Dictionary, EncoderConfig, GrepHandler, InternHint, Pattern, RecordParser,
    StrPattern,
};

fn run_grep(pattern: &Pattern, bytes: &[u8]) -> (u64, String) {
    let mut source = MemSource::buffered(bytes.to_vec());
    let mut dictionary = Dictionary::new();
    let mut out = Vec::new();
    let outcome = grep(pattern, &mut dictionary, &mut source, &mut out).unwrap();
    (outcome.matches, String::from_utf8(out).unwrap())
}

/// Ten records, each the bare unsigned value 1..=10
fn bare_uints() -> Vec<u8> {
    encode_stream(EncoderConfig::default(), |encoder| {
        for i in 1..=10u64 {
            encoder.encode(|w| w.uint(i)).unwrap();
        }
    })
}

// =============================================================================
// Typed predicates
// =============================================================================

#[test]
fn test_uint_equality() {
    let pattern = Pattern {
        uint_value: Some(5),
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bare_uints());
    assert_eq!(matches, 1);
    assert_eq!(out, "5\n");
}

#[test]
fn test_int_equality() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for i in [-3i64, 0, 7] {
            encoder.encode(|w| w.int(i)).unwrap();
        }
    });
    let pattern = Pattern {
        int_value: Some(-3),
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 1);
    assert_eq!(out, "-3\n");
}

#[test]
fn test_double_equality() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for v in [1.5f64, 2.5] {
            encoder.encode(|w| w.double(v)).unwrap();
        }
    });
    let pattern = Pattern {
        double_value: Some(2.5),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&pattern, &bytes).0, 1);
}

#[test]
fn test_string_substring_and_full() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for s in ["error: disk full", "error", "all fine"] {
            encoder.encode(|w| w.string(s, InternHint::Auto)).unwrap();
        }
    });

    let substring = Pattern {
        str_value: Some(StrPattern {
            pattern: "error".to_string(),
            full_match: false,
        }),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&substring, &bytes).0, 2);

    let full = Pattern {
        str_value: Some(StrPattern {
            pattern: "error".to_string(),
            full_match: true,
        }),
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&full, &bytes);
    assert_eq!(matches, 1);
    assert_eq!(out, "\"error\"\n");
}

#[test]
fn test_interned_strings_match_too() {
    // Above the threshold the string travels as a dict ref; matching must
    // dereference it.
    let bytes = encode_stream(
        EncoderConfig::default().with_intern_threshold(2),
        |encoder| {
            for _ in 0..4 {
                encoder
                    .encode(|w| w.string("repeated", InternHint::Auto))
                    .unwrap();
            }
        },
    );
    let pattern = Pattern {
        str_value: Some(StrPattern {
            pattern: "repeated".to_string(),
            full_match: true,
        }),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&pattern, &bytes).0, 4);
}

// =============================================================================
// Key filtering
// =============================================================================

#[test]
fn test_key_filter_restricts_value_checks() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_map();
                w.key("a");
                w.uint(1);
                w.key("b");
                w.uint(2);
                w.end_map();
            })
            .unwrap();
    });

    let hit = Pattern {
        key: Some("a".to_string()),
        uint_value: Some(1),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&hit, &bytes).0, 1);

    // The value 2 exists, but under key "b".
    let miss = Pattern {
        key: Some("a".to_string()),
        uint_value: Some(2),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&miss, &bytes).0, 0);
}

#[test]
fn test_key_filter_without_typed_predicate() {
    // A bare key filter with no value predicate never matches values.
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_map();
                w.key("a");
                w.uint(1);
                w.end_map();
            })
            .unwrap();
    });
    let pattern = Pattern {
        key: Some("a".to_string()),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&pattern, &bytes).0, 0);
}

#[test]
fn test_array_inherits_check_value() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_map();
                w.key("xs");
                w.start_array();
                w.uint(4);
                w.uint(5);
                w.end_array();
                w.key("other");
                w.uint(6);
                w.end_map();
            })
            .unwrap();
    });

    let inside = Pattern {
        key: Some("xs".to_string()),
        uint_value: Some(5),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&inside, &bytes).0, 1);

    let outside = Pattern {
        key: Some("xs".to_string()),
        uint_value: Some(6),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&outside, &bytes).0, 0);
}

// =============================================================================
// Timestamp interval
// =============================================================================

#[test]
fn test_timestamp_interval_is_half_open() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for nanos in [999, 1000, 1999, 2000] {
            encoder.encode(|w| w.time(nanos)).unwrap();
        }
    });
    let pattern = Pattern {
        timestamp: Some((1000, 2000)),
        ..Pattern::default()
    };
    assert_eq!(run_grep(&pattern, &bytes).0, 2);
}

#[test]
fn test_count_over_time_window() {
    // 1,000 records spanning two days; count the ones in day one.
    let day = 86_400_000_000_000i64;
    let step = 2 * day / 1000;
    let bytes = log_stream(1000, 0, step);

    let pattern = Pattern {
        key: Some("logTime".to_string()),
        timestamp: Some((0, day)),
        count: true,
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 500);
    assert!(out.is_empty(), "count mode must not emit records");
}

// =============================================================================
// Context emission
// =============================================================================

#[test]
fn test_before_and_after_context() {
    let pattern = Pattern {
        uint_value: Some(5),
        before_context: 2,
        after_context: 2,
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bare_uints());
    assert_eq!(matches, 1);
    assert_eq!(out, "3\n4\n5\n6\n7\n");
}

#[test]
fn test_before_context_clipped_at_start_of_stream() {
    let pattern = Pattern {
        uint_value: Some(2),
        before_context: 5,
        ..Pattern::default()
    };
    let (_, out) = run_grep(&pattern, &bare_uints());
    assert_eq!(out, "1\n2\n");
}

#[test]
fn test_overlapping_context_windows() {
    // Two matches one record apart; the shared record appears in the after
    // context of the first match and again before the second.
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for i in [1u64, 9, 2, 9, 3] {
            encoder.encode(|w| w.uint(i)).unwrap();
        }
    });
    let pattern = Pattern {
        uint_value: Some(9),
        before_context: 1,
        after_context: 1,
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 2);
    assert_eq!(out, "1\n9\n2\n2\n9\n3\n");
}

#[test]
fn test_context_across_dict_records() {
    // Records intern fresh keys, so dict-add records sit between value
    // records; rewinding over them must not corrupt the dictionary.
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for i in 0..6 {
            encoder
                .encode(|w| {
                    w.start_map();
                    w.key(&format!("k{i}"));
                    w.uint(i);
                    w.end_map();
                })
                .unwrap();
        }
    });
    let pattern = Pattern {
        uint_value: Some(3),
        before_context: 2,
        after_context: 1,
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 1);
    assert_eq!(
        out,
        "{\"k1\":1}\n{\"k2\":2}\n{\"k3\":3}\n{\"k4\":4}\n"
    );
}

#[test]
fn test_context_across_dict_clear() {
    // A tiny soft cap forces dict-clears between records; a context window
    // spanning a clear must still resolve pre-clear keys from the retained
    // epoch.
    let bytes = encode_stream(EncoderConfig::default().with_soft_cap(4), |encoder| {
        for i in 0..10 {
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

    let pattern = Pattern {
        uint_value: Some(3),
        before_context: 2,
        after_context: 1,
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 1);
    assert_eq!(
        out,
        "{\"key1\":1}\n{\"key2\":2}\n{\"key3\":3}\n{\"key4\":4}\n"
    );
}

// =============================================================================
// Match budget and scan suffix
// =============================================================================

#[test]
fn test_num_matches_stops_early() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        for _ in 0..10 {
            encoder.encode(|w| w.uint(1)).unwrap();
        }
    });
    let pattern = Pattern {
        uint_value: Some(1),
        num_matches: Some(3),
        ..Pattern::default()
    };
    let (matches, out) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 3);
    assert_eq!(out, "1\n1\n1\n");
}

#[test]
fn test_scan_suffix_bounds_the_tail() {
    // A match at the start, then a long run of non-matches, then another
    // match far beyond the suffix budget.
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder.encode(|w| w.uint(7)).unwrap();
        for _ in 0..2000 {
            encoder.encode(|w| w.uint(0)).unwrap();
        }
        encoder.encode(|w| w.uint(7)).unwrap();
    });
    let pattern = Pattern {
        uint_value: Some(7),
        scan_suffix_amount: Some(64),
        ..Pattern::default()
    };
    let (matches, _) = run_grep(&pattern, &bytes);
    assert_eq!(matches, 1);
}

// =============================================================================
// Bisect
// =============================================================================

#[test]
fn test_record_precedes_pattern_flag() {
    let bytes = encode_stream(EncoderConfig::default(), |encoder| {
        encoder
            .encode(|w| {
                w.start_map();
                w.key("logTime");
                w.time(500);
                w.end_map();
            })
            .unwrap();
    });
    let pattern = Pattern {
        key: Some("logTime".to_string()),
        timestamp: Some((1000, 2000)),
        ..Pattern::default()
    };
    let mut source = MemSource::buffered(bytes);
    let mut dictionary = Dictionary::new();
    let mut handler = GrepHandler::new(&pattern);
    assert!(RecordParser::new(&mut source, &mut dictionary, &mut handler)
        .parse_until_value()
        .unwrap());
    assert!(!handler.matched());
    assert!(handler.record_precedes_pattern());
}

#[test]
fn test_bisect_matches_linear_grep() {
    // A sorted stream big enough to force real binary-search probes.
    let step = 1_000_000i64; // 1ms per record
    let n = 40_000;
    let bytes = log_stream(n, 0, step);
    assert!(bytes.len() > 512 * 1024, "stream must exceed SCAN_THRESHOLD");

    // A one-second window in the middle.
    let lo = 20_000 * step;
    let hi = lo + 1_000_000_000;
    let pattern = Pattern {
        key: Some("logTime".to_string()),
        timestamp: Some((lo, hi)),
        ..Pattern::default()
    };

    let (linear_count, linear_out) = run_grep(&pattern, &bytes);
    assert_eq!(linear_count, 1000);

    let mut source = MemSource::buffered(bytes);
    let mut dictionary = Dictionary::new();
    let mut out = Vec::new();
    let mut bisect_pattern = pattern.clone();
    bisect_pattern.bisect = true;
    let outcome = bisect(&bisect_pattern, &mut dictionary, &mut source, &mut out).unwrap();
    assert_eq!(outcome.matches, linear_count);
    assert_eq!(String::from_utf8(out).unwrap(), linear_out);
}

#[test]
fn test_bisect_interval_before_all_records() {
    let bytes = log_stream(40_000, 1_000_000_000, 1_000_000);
    let pattern = Pattern {
        key: Some("logTime".to_string()),
        timestamp: Some((0, 500)),
        bisect: true,
        ..Pattern::default()
    };
    let mut source = MemSource::buffered(bytes.clone());
    let mut dictionary = Dictionary::new();
    let mut out = Vec::new();
    let outcome = bisect(&pattern, &mut dictionary, &mut source, &mut out).unwrap();
    assert_eq!(outcome.matches, 0);
    assert!(out.is_empty());
}

// Keep the JSON fixture helper exercised from this module as well.
#[test]
fn test_decode_of_log_stream_shape() {
    let json = decode_to_json(&log_stream(2, 0, 1_000_000_000));
    let mut lines = json.lines();
    assert_eq!(
        lines.next().unwrap(),
        "{\"logTime\":\"1970-01-01T00:00:00.000000\",\"level\":\"info\",\"seq\":0}"
    );
    assert_eq!(
        lines.next().unwrap(),
        "{\"logTime\":\"1970-01-01T00:00:01.000000\",\"level\":\"info\",\"seq\":1}"
    );
}

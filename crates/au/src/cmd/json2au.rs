//! Json2au command - convert line-delimited JSON to au
//!
//! Reads concatenated or line-delimited JSON values and encodes each one as
//! a value record. Strings shaped exactly like
//! `yyyy-mm-ddThh:mm:ss.uuuuuu` become timestamp values; everything else
//! follows the encoder's interning policy. High-cardinality fields can be
//! excluded from interning with `--no-intern KEY`.
//!
//! # Usage
//!
//! ```bash
//! au json2au events.json events.au
//! au json2au - out.au < events.json
//! au json2au --no-intern execId --no-intern px events.json events.au
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Args;

use au_format::{Encoder, EncoderConfig, FieldWriter, InternHint};

/// Length of `yyyy-mm-ddThh:mm:ss.uuuuuu`; only strings of exactly this
/// shape are candidates for timestamp conversion
const TIME_STRING_LEN: usize = 26;

/// Json2au command arguments
#[derive(Args, Debug)]
pub struct Json2AuArgs {
    /// Input JSON file; `-` reads stdin
    #[arg(value_name = "INPUT", default_value = "-")]
    input: String,

    /// Output au file; `-` writes stdout
    #[arg(value_name = "OUTPUT", default_value = "-")]
    output: String,

    /// Stop after N records
    #[arg(long = "max-records", value_name = "N")]
    max_records: Option<u64>,

    /// Never intern values of this key (repeatable)
    #[arg(long = "no-intern", value_name = "KEY")]
    no_intern: Vec<String>,

    /// References needed before a string is promoted into the dictionary
    #[arg(long = "intern-threshold", value_name = "N")]
    intern_threshold: Option<usize>,

    /// Combined dictionary/cache entry cap before a dictionary reset
    #[arg(long = "dict-cap", value_name = "N")]
    dict_cap: Option<usize>,
}

/// Run the json2au command
pub fn run(args: Json2AuArgs) -> Result<()> {
    let reader: Box<dyn Read> = if args.input == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(&args.input).with_context(|| format!("failed to open {}", args.input))?)
    };
    let reader = BufReader::new(reader);

    let writer: Box<dyn Write> = if args.output == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(
            File::create(&args.output)
                .with_context(|| format!("failed to create {}", args.output))?,
        )
    };
    let writer = BufWriter::new(writer);

    let mut config = EncoderConfig::default();
    if let Some(threshold) = args.intern_threshold {
        config = config.with_intern_threshold(threshold);
    }
    if let Some(cap) = args.dict_cap {
        config = config.with_soft_cap(cap);
    }

    let display = if args.input == "-" {
        "<stdin>"
    } else {
        args.input.as_str()
    };
    let metadata = format!("Encoded from json file {display} by au");
    let mut encoder = Encoder::with_config(writer, &metadata, config)?;

    let no_intern: HashSet<&str> = args.no_intern.iter().map(String::as_str).collect();
    let max_records = args.max_records.unwrap_or(u64::MAX);
    let mut processed: u64 = 0;
    let mut time_attempts: u64 = 0;
    let mut time_failures: u64 = 0;

    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<serde_json::Value>();
    for value in stream {
        let value = value.with_context(|| format!("bad JSON in {display}"))?;
        encoder.encode(|w| {
            write_value(
                w,
                &value,
                &no_intern,
                InternHint::Auto,
                &mut time_attempts,
                &mut time_failures,
            )
        })?;

        processed += 1;
        if processed % 10_000 == 0 {
            let stats = encoder.stats();
            tracing::info!(
                records = stats.records,
                dict_size = stats.dict_size,
                hash_size = stats.hash_size,
                hash_buckets = stats.hash_buckets,
                cache_size = stats.cache_size,
                "conversion progress"
            );
        }
        if processed >= max_records {
            break;
        }
    }

    encoder.flush()?;
    if time_attempts > 0 {
        tracing::info!(
            attempts = time_attempts,
            failures = time_failures,
            "time conversion summary"
        );
    }
    Ok(())
}

/// Encode one JSON value through the field writer
fn write_value(
    w: &mut FieldWriter<'_>,
    value: &serde_json::Value,
    no_intern: &HashSet<&str>,
    hint: InternHint,
    time_attempts: &mut u64,
    time_failures: &mut u64,
) {
    match value {
        serde_json::Value::Null => w.null(),
        serde_json::Value::Bool(b) => w.boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                w.uint(u);
            } else if let Some(i) = n.as_i64() {
                w.int(i);
            } else {
                w.double(n.as_f64().unwrap_or(f64::NAN));
            }
        }
        serde_json::Value::String(s) => {
            if s.len() == TIME_STRING_LEN {
                *time_attempts += 1;
                if let Some(nanos) = parse_time_string(s) {
                    w.time(nanos);
                    return;
                }
                *time_failures += 1;
            }
            w.string(s, hint);
        }
        serde_json::Value::Array(items) => {
            w.start_array();
            for item in items {
                write_value(w, item, no_intern, InternHint::Auto, time_attempts, time_failures);
            }
            w.end_array();
        }
        serde_json::Value::Object(entries) => {
            w.start_map();
            for (key, item) in entries {
                w.key(key);
                let child_hint = if no_intern.contains(key.as_str()) {
                    InternHint::ForceNoIntern
                } else {
                    InternHint::Auto
                };
                write_value(w, item, no_intern, child_hint, time_attempts, time_failures);
            }
            w.end_map();
        }
    }
}

/// Parse a microsecond-precision timestamp string to epoch nanoseconds
fn parse_time_string(s: &str) -> Option<i64> {
    let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.6f").ok()?;
    parsed.and_utc().timestamp_nanos_opt()
}

#[cfg(test)]
#[path = "json2au_test.rs"]
mod json2au_test;

//! Grep command - search au files for matching records
//!
//! # Usage
//!
//! ```bash
//! au grep -u 42 file.au                     # records containing uint 42
//! au grep -k user -s alice file.au          # substring under key "user"
//! au grep -k logTime -t 2024-01-01T00:00:00,2024-01-02T00:00:00 file.au
//! au grep -b -k logTime -t 2024-01-01T00:00:00 file.au   # bisect
//! au grep -c -i 7 file.au                   # count only
//! ```
//!
//! Timestamps accept `%Y-%m-%dT%H:%M:%S[.frac]` or a bare `%Y-%m-%d`; a
//! missing interval end leaves it open.

use std::io::{self, BufWriter, Write};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;

use au_format::{bisect, grep, open_input, Dictionary, Pattern, SourceConfig, StrPattern};

/// Grep command arguments
#[derive(Args, Debug)]
pub struct GrepArgs {
    /// Restrict matches to values whose enclosing object key equals KEY
    #[arg(short = 'k', long = "key", value_name = "KEY")]
    key: Option<String>,

    /// Match signed integer values equal to N
    #[arg(short = 'i', long = "int", value_name = "N")]
    int_value: Option<i64>,

    /// Match unsigned integer values equal to N
    #[arg(short = 'u', long = "uint", value_name = "N")]
    uint_value: Option<u64>,

    /// Match double values equal to X
    #[arg(short = 'd', long = "double", value_name = "X")]
    double_value: Option<f64>,

    /// Match string values containing STR
    #[arg(short = 's', long = "string", value_name = "STR")]
    substring: Option<String>,

    /// Match string values equal to STR
    #[arg(short = 'S', long = "string-full", value_name = "STR", conflicts_with = "substring")]
    full_string: Option<String>,

    /// Match timestamps in the half-open interval START[,END]
    #[arg(short = 't', long = "time", value_name = "START[,END]")]
    time: Option<String>,

    /// Stop after N matches
    #[arg(short = 'm', long = "max-matches", value_name = "N")]
    num_matches: Option<u64>,

    /// Emit N records of context before each match
    #[arg(short = 'B', long = "before-context", value_name = "N", default_value_t = 0)]
    before: u32,

    /// Emit N records of context after each match
    #[arg(short = 'A', long = "after-context", value_name = "N", default_value_t = 0)]
    after: u32,

    /// Emit N records of context around each match
    #[arg(short = 'C', long = "context", value_name = "N")]
    context: Option<u32>,

    /// Print the match count instead of the records
    #[arg(short = 'c', long = "count")]
    count: bool,

    /// Binary-search a sorted timestamp field instead of scanning
    #[arg(short = 'b', long = "bisect")]
    bisect: bool,

    /// Input files; `-` reads stdin
    #[arg(value_name = "FILE", default_value = "-")]
    files: Vec<String>,
}

/// Run the grep command
///
/// A file that fails to parse is reported and abandoned; remaining files
/// are still searched.
pub fn run(args: GrepArgs) -> Result<()> {
    let pattern = build_pattern(&args)?;

    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);

    let mut failed = false;
    for file in &args.files {
        if let Err(e) = grep_file(file, &pattern, &mut out) {
            eprintln!("{file}: {e:#}");
            failed = true;
        }
    }

    out.flush()?;
    anyhow::ensure!(!failed, "one or more files failed to search");
    Ok(())
}

fn grep_file(file: &str, pattern: &Pattern, out: &mut impl Write) -> Result<()> {
    if pattern.bisect && file == "-" {
        bail!("bisect requires a seekable file, not stdin");
    }
    let mut source = open_input(file, SourceConfig::default())
        .with_context(|| format!("failed to open {file}"))?;
    let mut dictionary = Dictionary::new();

    let outcome = if pattern.bisect {
        bisect(pattern, &mut dictionary, &mut source, out)
    } else {
        grep(pattern, &mut dictionary, &mut source, out)
    }?;

    if pattern.count {
        writeln!(out, "{}", outcome.matches)?;
    }
    Ok(())
}

fn build_pattern(args: &GrepArgs) -> Result<Pattern> {
    let str_value = match (&args.substring, &args.full_string) {
        (Some(s), None) => Some(StrPattern {
            pattern: s.clone(),
            full_match: false,
        }),
        (None, Some(s)) => Some(StrPattern {
            pattern: s.clone(),
            full_match: true,
        }),
        (None, None) => None,
        (Some(_), Some(_)) => unreachable!("clap enforces the conflict"),
    };

    let timestamp = args.time.as_deref().map(parse_interval).transpose()?;

    if args.bisect && timestamp.is_none() && args.int_value.is_none() && args.uint_value.is_none()
    {
        bail!("bisect needs an ordered predicate: -t, -i or -u");
    }

    let (before, after) = match args.context {
        Some(n) => (n, n),
        None => (args.before, args.after),
    };

    Ok(Pattern {
        key: args.key.clone(),
        int_value: args.int_value,
        uint_value: args.uint_value,
        double_value: args.double_value,
        str_value,
        timestamp,
        num_matches: args.num_matches,
        scan_suffix_amount: None,
        before_context: before,
        after_context: after,
        bisect: args.bisect,
        count: args.count,
    })
}

/// Parse `START[,END]` into a half-open nanosecond interval
fn parse_interval(raw: &str) -> Result<(i64, i64)> {
    let (lo, hi) = match raw.split_once(',') {
        Some((a, b)) => (parse_time_point(a)?, parse_time_point(b)?),
        None => (parse_time_point(raw)?, i64::MAX),
    };
    if hi <= lo {
        bail!("empty timestamp interval: {raw}");
    }
    Ok((lo, hi))
}

/// Parse one timestamp in `%Y-%m-%dT%H:%M:%S[.frac]` or `%Y-%m-%d` form
fn parse_time_point(s: &str) -> Result<i64> {
    let s = s.trim();
    let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        })
        .with_context(|| format!("unrecognized timestamp: {s}"))?;
    parsed
        .and_utc()
        .timestamp_nanos_opt()
        .with_context(|| format!("timestamp out of range: {s}"))
}

#[cfg(test)]
#[path = "grep_test.rs"]
mod grep_test;

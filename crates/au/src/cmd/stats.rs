//! Stats command - report stream statistics
//!
//! # Usage
//!
//! ```bash
//! au stats file.au            # record counts and totals
//! au stats -i file.au         # integer encoded-size histogram
//! au stats -d file.au         # dump dictionary activity
//! ```

use anyhow::{Context, Result};
use clap::Args;

use au_format::varint::{zigzag, MAX_VARINT_LEN};
use au_format::{
    open_input, ByteSource, Dictionary, RecordHandler, RecordParser, SourceConfig, ValueHandler,
    ValueParser,
};

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Dump dictionary activity while parsing
    #[arg(short = 'd', long = "dict")]
    dict: bool,

    /// Report integer encoded sizes
    #[arg(short = 'i', long = "ints")]
    ints: bool,

    /// Input files; `-` reads stdin
    #[arg(value_name = "FILE", default_value = "-")]
    files: Vec<String>,
}

/// Run the stats command
///
/// A file that fails to parse is reported and abandoned; remaining files
/// are still summarized.
pub fn run(args: StatsArgs) -> Result<()> {
    let mut failed = false;
    for file in &args.files {
        if let Err(e) = stats_file(file, &args) {
            eprintln!("{file}: {e:#}");
            failed = true;
        }
    }
    anyhow::ensure!(!failed, "one or more files failed to parse");
    Ok(())
}

fn stats_file(file: &str, args: &StatsArgs) -> Result<()> {
    let mut source = open_input(file, SourceConfig::default())
        .with_context(|| format!("failed to open {file}"))?;
    let mut dictionary = Dictionary::new();
    let mut stats = StreamStats {
        dump_dict: args.dict,
        ..StreamStats::default()
    };

    RecordParser::new(&mut source, &mut dictionary, &mut stats).parse_stream()?;

    println!("Stats for {file}:");
    println!("  Total read: {}", pretty_bytes(source.pos()));
    println!("  Records: {}", commafy(stats.records));
    println!("     Version headers: {}", commafy(stats.headers));
    println!("     Dictionary resets: {}", commafy(stats.clears));
    println!("     Dictionary adds: {}", commafy(stats.adds));
    println!("     Values: {}", commafy(stats.values));
    println!(
        "  Dictionary entries at end: {}",
        commafy(dictionary.len() as u64)
    );
    if args.ints {
        stats.print_int_report();
    }
    Ok(())
}

/// Record handler collecting stream totals
#[derive(Default)]
struct StreamStats {
    dump_dict: bool,
    records: u64,
    headers: u64,
    clears: u64,
    adds: u64,
    values: u64,
    doubles: u64,
    times: u64,
    int_sizes: [u64; MAX_VARINT_LEN],
}

impl StreamStats {
    fn print_int_report(&self) {
        let total: u64 = self.int_sizes.iter().sum();
        println!("  Values:");
        println!("     Doubles: {}", commafy(self.doubles));
        println!("     Timestamps: {}", commafy(self.times));
        println!("     Integers: {}", commafy(total));
        if total == 0 {
            return;
        }
        println!("       By encoded length:");
        for (i, &count) in self.int_sizes.iter().enumerate() {
            if count > 0 {
                println!(
                    "        {:3}: {} ({}%)",
                    i + 1,
                    commafy(count),
                    100 * count / total
                );
            }
        }
    }
}

impl<S: ByteSource> RecordHandler<S> for StreamStats {
    fn on_record_start(&mut self, _pos: u64) -> au_format::Result<()> {
        self.records += 1;
        Ok(())
    }

    fn on_header(&mut self, _version: u64, _metadata: &str) -> au_format::Result<()> {
        self.headers += 1;
        Ok(())
    }

    fn on_dict_clear(&mut self, dict: &Dictionary) -> au_format::Result<()> {
        self.clears += 1;
        if self.dump_dict && !dict.is_empty() {
            println!("Dictionary cleared ({} entries dropped)", dict.len());
        }
        Ok(())
    }

    fn on_dict_add(&mut self, dict: &Dictionary, added: usize) -> au_format::Result<()> {
        self.adds += 1;
        if self.dump_dict {
            println!("Dictionary appended:");
            for i in (dict.len() - added)..dict.len() {
                println!("\t{}", dict.at(i).unwrap_or("<missing>"));
            }
        }
        Ok(())
    }

    fn on_value(
        &mut self,
        _len: usize,
        source: &mut S,
        _dict: &Dictionary,
    ) -> au_format::Result<()> {
        self.values += 1;
        let mut visitor = IntSizeVisitor {
            int_sizes: &mut self.int_sizes,
            doubles: &mut self.doubles,
            times: &mut self.times,
        };
        ValueParser::new(source, &mut visitor).parse()
    }
}

/// Counts integer widths and double/timestamp occurrences
struct IntSizeVisitor<'a> {
    int_sizes: &'a mut [u64; MAX_VARINT_LEN],
    doubles: &'a mut u64,
    times: &'a mut u64,
}

impl ValueHandler for IntSizeVisitor<'_> {
    fn on_int(&mut self, _pos: u64, value: i64) -> au_format::Result<()> {
        self.int_sizes[uvarint_len(zigzag(value)) - 1] += 1;
        Ok(())
    }

    fn on_uint(&mut self, _pos: u64, value: u64) -> au_format::Result<()> {
        self.int_sizes[uvarint_len(value) - 1] += 1;
        Ok(())
    }

    fn on_double(&mut self, _pos: u64, _value: f64) -> au_format::Result<()> {
        *self.doubles += 1;
        Ok(())
    }

    fn on_time(&mut self, _pos: u64, _nanos: i64) -> au_format::Result<()> {
        *self.times += 1;
        Ok(())
    }
}

/// Encoded length of an unsigned varint
fn uvarint_len(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize).div_ceil(7)
    }
}

/// Render an integer with thousands separators
fn commafy(value: u64) -> String {
    let digits = value.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Humanize a byte count
fn pretty_bytes(bytes: u64) -> String {
    const SUFFIXES: [&str; 7] = [" bytes", "K", "M", "G", "T", "P", "E"];
    let mut count = bytes as f64;
    let mut suffix = 0;
    while count >= 1024.0 && suffix < SUFFIXES.len() - 1 {
        count /= 1024.0;
        suffix += 1;
    }
    if count.fract() == 0.0 {
        format!("{}{}", count as u64, SUFFIXES[suffix])
    } else {
        format!("{:.1}{}", count, SUFFIXES[suffix])
    }
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;

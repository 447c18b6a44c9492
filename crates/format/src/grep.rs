//! Pattern matching over au streams
//!
//! [`GrepHandler`] evaluates a [`Pattern`] against each value record while
//! it streams past, without materializing values. The [`grep`] driver adds
//! before/after context emission: it keeps a ring of recent record start
//! positions, pins the oldest so the byte source retains that history, and
//! rewinds to re-emit matched records through the JSON handler. [`bisect`]
//! layers a log-time binary search over a monotonically ordered timestamp
//! field on top of the same handler.

use std::collections::VecDeque;
use std::io::Write;

use memchr::memmem;

use crate::dictionary::Dictionary;
use crate::json::JsonRecordHandler;
use crate::record::{RecordHandler, RecordParser};
use crate::source::ByteSource;
use crate::tail::seek_sync;
use crate::value::{ValueHandler, ValueParser};
use crate::{AuError, Result};

/// String predicate: substring or whole-string equality
#[derive(Debug, Clone)]
pub struct StrPattern {
    pub pattern: String,
    pub full_match: bool,
}

/// Record predicate; any combination of fields may be set
///
/// With `key` set, typed predicates only apply to values whose nearest
/// enclosing object key equals it.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    pub key: Option<String>,
    pub int_value: Option<i64>,
    pub uint_value: Option<u64>,
    pub double_value: Option<f64>,
    pub str_value: Option<StrPattern>,
    /// Half-open interval of nanoseconds since the epoch: `[lo, hi)`
    pub timestamp: Option<(i64, i64)>,
    /// Stop after this many matches
    pub num_matches: Option<u64>,
    /// Stop after scanning this many bytes past the last match
    pub scan_suffix_amount: Option<u64>,
    pub before_context: u32,
    pub after_context: u32,
    /// Binary-search mode over a sorted timestamp field
    pub bisect: bool,
    /// Report the match count only; no emission
    pub count: bool,
}

impl Pattern {
    fn requires_key_match(&self) -> bool {
        self.key.is_some()
    }

    fn matches_key(&self, key: &[u8]) -> bool {
        match &self.key {
            Some(k) => k.as_bytes() == key,
            None => true,
        }
    }

    fn matches_int(&self, value: i64) -> bool {
        self.int_value == Some(value)
    }

    fn matches_uint(&self, value: u64) -> bool {
        self.uint_value == Some(value)
    }

    fn matches_double(&self, value: f64) -> bool {
        self.double_value == Some(value)
    }

    fn matches_time(&self, nanos: i64) -> bool {
        match self.timestamp {
            Some((lo, hi)) => nanos >= lo && nanos < hi,
            None => false,
        }
    }

    fn matches_str(&self, value: &[u8]) -> bool {
        match &self.str_value {
            Some(StrPattern {
                pattern,
                full_match: true,
            }) => pattern.as_bytes() == value,
            Some(StrPattern {
                pattern,
                full_match: false,
            }) => memmem::find(value, pattern.as_bytes()).is_some(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Bare,
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    context: Context,
    count: usize,
    check_value: bool,
}

/// Record handler that evaluates a [`Pattern`] against each value record
pub struct GrepHandler<'p> {
    pattern: &'p Pattern,
    matched: bool,
    precedes: bool,
    collecting: bool,
    str_buf: Vec<u8>,
    frames: Vec<Frame>,
}

impl<'p> GrepHandler<'p> {
    pub fn new(pattern: &'p Pattern) -> Self {
        Self {
            pattern,
            matched: false,
            precedes: false,
            collecting: false,
            str_buf: Vec::with_capacity(1 << 16),
            frames: Vec::new(),
        }
    }

    /// Whether the most recently parsed record matched the pattern
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Whether the record's checked ordering field was strictly below the
    /// pattern's low bound; drives the bisect search direction
    pub fn record_precedes_pattern(&self) -> bool {
        self.precedes
    }
}

impl<S: ByteSource> RecordHandler<S> for GrepHandler<'_> {
    fn on_value(&mut self, _len: usize, source: &mut S, dict: &Dictionary) -> Result<()> {
        self.matched = false;
        self.precedes = false;
        self.collecting = false;
        self.frames.clear();
        self.frames.push(Frame {
            context: Context::Bare,
            count: 0,
            check_value: !self.pattern.requires_key_match(),
        });
        let mut visitor = GrepVisitor {
            handler: self,
            dict,
        };
        ValueParser::new(source, &mut visitor).parse()
    }
}

struct GrepVisitor<'a, 'p> {
    handler: &'a mut GrepHandler<'p>,
    dict: &'a Dictionary,
}

impl GrepVisitor<'_, '_> {
    fn is_key(&self) -> bool {
        let top = self.handler.frames.last().expect("context frame");
        top.context == Context::Object && top.count % 2 == 0
    }

    fn check_value(&self) -> bool {
        self.handler.frames.last().expect("context frame").check_value
    }

    fn bump(&mut self) {
        if let Some(top) = self.handler.frames.last_mut() {
            top.count += 1;
        }
    }

    /// A completed string: keys gate `check_value`, values match
    fn check_string(&mut self, s: &[u8]) {
        if self.is_key() {
            let check = self.handler.pattern.matches_key(s);
            self.handler.frames.last_mut().expect("context frame").check_value = check;
        } else if self.check_value() && self.handler.pattern.matches_str(s) {
            self.handler.matched = true;
        }
    }

    /// Whether this string needs collecting at all
    fn wants_string(&self) -> bool {
        self.handler.pattern.str_value.is_some()
            || (self.handler.pattern.requires_key_match() && self.is_key())
    }
}

impl ValueHandler for GrepVisitor<'_, '_> {
    fn on_null(&mut self, _pos: u64) -> Result<()> {
        self.bump();
        Ok(())
    }

    fn on_bool(&mut self, _pos: u64, _value: bool) -> Result<()> {
        self.bump();
        Ok(())
    }

    fn on_int(&mut self, _pos: u64, value: i64) -> Result<()> {
        if self.check_value() {
            if self.handler.pattern.matches_int(value) {
                self.handler.matched = true;
            }
            if let Some(target) = self.handler.pattern.int_value {
                if value < target {
                    self.handler.precedes = true;
                }
            }
        }
        self.bump();
        Ok(())
    }

    fn on_uint(&mut self, _pos: u64, value: u64) -> Result<()> {
        if self.check_value() {
            if self.handler.pattern.matches_uint(value) {
                self.handler.matched = true;
            }
            if let Some(target) = self.handler.pattern.uint_value {
                if value < target {
                    self.handler.precedes = true;
                }
            }
        }
        self.bump();
        Ok(())
    }

    fn on_double(&mut self, _pos: u64, value: f64) -> Result<()> {
        if self.check_value() && self.handler.pattern.matches_double(value) {
            self.handler.matched = true;
        }
        self.bump();
        Ok(())
    }

    fn on_time(&mut self, _pos: u64, nanos: i64) -> Result<()> {
        if self.check_value() {
            if self.handler.pattern.matches_time(nanos) {
                self.handler.matched = true;
            }
            if let Some((lo, _)) = self.handler.pattern.timestamp {
                if nanos < lo {
                    self.handler.precedes = true;
                }
            }
        }
        self.bump();
        Ok(())
    }

    fn on_dict_ref(&mut self, pos: u64, index: usize) -> Result<()> {
        let entry = self.dict.at(index).ok_or_else(|| {
            AuError::malformed(
                pos,
                format!(
                    "dictionary reference {index} out of range (dictionary has {} entries)",
                    self.dict.len()
                ),
            )
        })?;
        self.check_string(entry.as_bytes());
        self.bump();
        Ok(())
    }

    fn on_string_start(&mut self, _pos: u64, len: usize) -> Result<()> {
        self.handler.collecting = self.wants_string();
        if self.handler.collecting {
            self.handler.str_buf.clear();
            self.handler.str_buf.reserve(len.min(1 << 16));
        }
        Ok(())
    }

    fn on_string_fragment(&mut self, fragment: &[u8]) -> Result<()> {
        if self.handler.collecting {
            self.handler.str_buf.extend_from_slice(fragment);
        }
        Ok(())
    }

    fn on_string_end(&mut self) -> Result<()> {
        if self.handler.collecting {
            let buf = std::mem::take(&mut self.handler.str_buf);
            self.check_string(&buf);
            self.handler.str_buf = buf;
            self.handler.collecting = false;
        } else if self.is_key() {
            // Uncollected key: no key filter is set, so it passes.
            self.handler.frames.last_mut().expect("context frame").check_value = true;
        }
        self.bump();
        Ok(())
    }

    fn on_object_start(&mut self) -> Result<()> {
        self.handler.frames.push(Frame {
            context: Context::Object,
            count: 0,
            check_value: false,
        });
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<()> {
        self.handler.frames.pop();
        self.bump();
        Ok(())
    }

    fn on_array_start(&mut self) -> Result<()> {
        let inherit = self.check_value();
        self.handler.frames.push(Frame {
            context: Context::Array,
            count: 0,
            check_value: inherit,
        });
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<()> {
        self.handler.frames.pop();
        self.bump();
        Ok(())
    }
}

/// Result of a grep run
#[derive(Debug, Clone, Copy, Default)]
pub struct GrepOutcome {
    /// Records that matched the pattern
    pub matches: u64,
}

/// Scan `source`, emitting matching records (with context) as JSON lines
///
/// With `count` set, nothing is emitted and only the total is returned.
pub fn grep<S: ByteSource, W: Write>(
    pattern: &Pattern,
    dictionary: &mut Dictionary,
    source: &mut S,
    out: &mut W,
) -> Result<GrepOutcome> {
    let mut pattern = pattern.clone();
    if pattern.count {
        pattern.before_context = 0;
        pattern.after_context = 0;
    }
    let ring_len = pattern.before_context as usize + 1;
    let num_matches = pattern.num_matches.unwrap_or(u64::MAX);
    let suffix = pattern.scan_suffix_amount.unwrap_or(u64::MAX);

    let mut json = JsonRecordHandler::new(&mut *out);
    let mut handler = GrepHandler::new(&pattern);
    let mut positions: VecDeque<u64> = VecDeque::with_capacity(ring_len);
    let mut force: u32 = 0;
    let mut total: u64 = 0;
    let mut match_pos = source.pos();

    while source.peek()?.is_some() {
        if force == 0 {
            if total >= num_matches {
                break;
            }
            if source.pos() - match_pos > suffix {
                break;
            }
        }

        if positions.len() == ring_len {
            positions.pop_front();
        }
        positions.push_back(source.pos());
        if !pattern.count {
            // The source must retain history back to the oldest context
            // record in case this record matches.
            source.set_pin(*positions.front().expect("ring is non-empty"));
        }

        if !RecordParser::new(source, dictionary, &mut handler).parse_until_value()? {
            break;
        }

        if handler.matched() && total < num_matches {
            match_pos = *positions.back().expect("ring is non-empty");
            total += 1;
            if pattern.count {
                continue;
            }
            source.seek(*positions.front().expect("ring is non-empty"))?;
            while !positions.is_empty() {
                RecordParser::new(source, dictionary, &mut json).parse_until_value()?;
                positions.pop_back();
            }
            force = pattern.after_context;
        } else if force > 0 {
            source.seek(*positions.back().expect("ring is non-empty"))?;
            RecordParser::new(source, dictionary, &mut json).parse_until_value()?;
            force -= 1;
        }
    }
    source.clear_pin();

    Ok(GrepOutcome { matches: total })
}

/// Bytes below which bisection hands over to a linear scan
const SCAN_THRESHOLD: u64 = 256 * 1024;
/// Linear scan starts this far before the located region
const PREFIX_AMOUNT: u64 = 512 * 1024;
/// Scan-suffix budget for the final linear pass; must cover the whole
/// uncertain region so the first match cannot be missed
const SUFFIX_AMOUNT: u64 = SCAN_THRESHOLD + PREFIX_AMOUNT + 266 * 1024;
const _: () = assert!(SUFFIX_AMOUNT > PREFIX_AMOUNT + SCAN_THRESHOLD);

/// Binary-search a seekable source for records whose timestamp field lies
/// in the pattern interval, then grep the located region linearly
///
/// Requires the timestamp field to be monotonically non-decreasing across
/// records. Emits exactly what a linear [`grep`] with the same pattern
/// would.
pub fn bisect<S: ByteSource, W: Write>(
    pattern: &Pattern,
    dictionary: &mut Dictionary,
    source: &mut S,
    out: &mut W,
) -> Result<GrepOutcome> {
    let mut handler = GrepHandler::new(pattern);
    let mut start: u64 = 0;
    let mut end = source.end_pos()?;

    while end > start {
        if end - start <= SCAN_THRESHOLD {
            seek_sync(source, dictionary, start.saturating_sub(PREFIX_AMOUNT))?;
            let mut linear = pattern.clone();
            linear.bisect = false;
            linear.scan_suffix_amount = Some(SUFFIX_AMOUNT);
            return grep(&linear, dictionary, source, out);
        }

        let mid = start + (end - start) / 2;
        seek_sync(source, dictionary, mid)?;
        let sor = source.pos();
        tracing::debug!(start, end, probe = sor, "bisect probe");
        if !RecordParser::new(source, dictionary, &mut handler).parse_until_value()? {
            break;
        }

        // A record strictly preceding the pattern pushes the window right;
        // anything else (match or beyond) pulls it left.
        if handler.record_precedes_pattern() {
            start = sor;
        } else {
            end = sor;
        }
    }

    Ok(GrepOutcome::default())
}

//! Dictionary-aware record encoder
//!
//! The encoder is invoked once per record: `encode` hands the caller a
//! [`FieldWriter`] mirroring the decoder's event set, buffers the value
//! payload, and then flushes any newly promoted dictionary strings as a
//! dict-add record immediately before the value record that references
//! them.
//!
//! # Interning
//!
//! Strings written with [`InternHint::Auto`] pass through a bounded intern
//! cache. A string is inlined until its reference count reaches the
//! threshold, at which point it is promoted into the dictionary and emitted
//! as a reference from then on. Object keys are always interned; the wire
//! format does not permit inline string keys. When the combined cache and
//! dictionary size would exceed the soft cap, the encoder emits a
//! dict-clear and rebuilds incrementally.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::marker::{record_tag, value_tag, FORMAT_VERSION, RECORD_TERMINATOR};
use crate::varint;
use crate::{Result, DEFAULT_DICT_SOFT_CAP, DEFAULT_INTERN_THRESHOLD};

/// Interning policy for one string value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InternHint {
    /// Consult the intern cache and promote at the reference threshold
    #[default]
    Auto,
    /// Promote immediately and emit a dictionary reference
    ForceIntern,
    /// Always emit inline; never counts toward promotion
    ForceNoIntern,
}

/// Encoder tuning knobs
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Combined cache + dictionary entry count that triggers a dict-clear
    pub soft_cap: usize,

    /// Reference count at which an auto string is promoted
    pub intern_threshold: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            soft_cap: DEFAULT_DICT_SOFT_CAP,
            intern_threshold: DEFAULT_INTERN_THRESHOLD,
        }
    }
}

impl EncoderConfig {
    pub fn with_soft_cap(mut self, soft_cap: usize) -> Self {
        self.soft_cap = soft_cap;
        self
    }

    pub fn with_intern_threshold(mut self, intern_threshold: usize) -> Self {
        self.intern_threshold = intern_threshold;
        self
    }
}

/// Point-in-time encoder counters
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderStats {
    /// Value records emitted
    pub records: u64,
    /// Entries in the current dictionary epoch
    pub dict_size: usize,
    /// Entries in the intern cache (promoted and candidates)
    pub hash_size: usize,
    /// Allocated capacity of the intern cache table
    pub hash_buckets: usize,
    /// Unpromoted candidate entries
    pub cache_size: usize,
}

#[derive(Debug)]
struct CacheEntry {
    count: usize,
    index: Option<u32>,
    last_used: u64,
}

/// Bounded string -> (index, refcount) map with recent-use ordering
struct InternCache {
    map: FxHashMap<String, CacheEntry>,
    /// Monotonic use counter backing the recent-use ordering
    tick: u64,
    /// Unpromoted entries currently held
    candidates: usize,
    /// Candidate count at which the least recently used one is evicted
    candidate_cap: usize,
}

impl InternCache {
    fn new(candidate_cap: usize) -> Self {
        Self {
            map: FxHashMap::default(),
            tick: 0,
            candidates: 0,
            candidate_cap,
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.candidates = 0;
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    /// Insert a fresh candidate, evicting the stalest one at the cap
    fn insert_candidate(&mut self, s: &str, tick: u64) {
        if self.candidates >= self.candidate_cap {
            let evict = self
                .map
                .iter()
                .filter(|(_, e)| e.index.is_none())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(key) = evict {
                self.map.remove(&key);
                self.candidates -= 1;
            }
        }
        self.map.insert(
            s.to_string(),
            CacheEntry {
                count: 1,
                index: None,
                last_used: tick,
            },
        );
        self.candidates += 1;
    }
}

/// Streaming encoder writing au records to `out`
///
/// The encoder owns the output from stream offset 0: it emits the version
/// header and the initial dict-clear on construction.
pub struct Encoder<W: Write> {
    out: W,
    config: EncoderConfig,
    cache: InternCache,
    /// Entry count of the dictionary mirror
    dict_len: usize,
    /// Bytes written so far; the next record starts here
    pos: u64,
    last_dict_event_pos: u64,
    records: u64,
    value_buf: Vec<u8>,
    record_buf: Vec<u8>,
    pending: Vec<String>,
    frames: Vec<Frame>,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder with default tuning and write the stream preamble
    pub fn new(out: W, metadata: &str) -> Result<Self> {
        Self::with_config(out, metadata, EncoderConfig::default())
    }

    /// Create an encoder with explicit tuning and write the stream preamble
    pub fn with_config(out: W, metadata: &str, config: EncoderConfig) -> Result<Self> {
        let candidate_cap = config.soft_cap;
        let mut encoder = Self {
            out,
            config,
            cache: InternCache::new(candidate_cap),
            dict_len: 0,
            pos: 0,
            last_dict_event_pos: 0,
            records: 0,
            value_buf: Vec::with_capacity(4096),
            record_buf: Vec::with_capacity(4096),
            pending: Vec::new(),
            frames: Vec::new(),
        };
        encoder.write_header(metadata)?;
        encoder.write_dict_clear()?;
        Ok(encoder)
    }

    /// Encode one value record
    ///
    /// The closure receives a [`FieldWriter`] and emits exactly one value.
    /// Dict-add records for strings promoted while building the value are
    /// flushed before the value record itself.
    pub fn encode<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut FieldWriter<'_>),
    {
        self.maybe_clear()?;
        self.value_buf.clear();
        self.frames.clear();
        {
            let mut writer = FieldWriter {
                buf: &mut self.value_buf,
                cache: &mut self.cache,
                pending: &mut self.pending,
                frames: &mut self.frames,
                dict_len: self.dict_len,
                threshold: self.config.intern_threshold,
            };
            build(&mut writer);
        }
        self.flush_pending_adds()?;
        self.write_value_record()?;
        Ok(())
    }

    /// Current counters
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            records: self.records,
            dict_size: self.dict_len,
            hash_size: self.cache.len(),
            hash_buckets: self.cache.map.capacity(),
            cache_size: self.cache.candidates,
        }
    }

    /// Bytes written so far
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    /// Emit a dict-clear when the soft cap is breached
    ///
    /// Checked at record boundaries only; one record may overshoot the cap.
    fn maybe_clear(&mut self) -> Result<()> {
        if self.dict_len + self.cache.len() > self.config.soft_cap {
            tracing::debug!(
                dict = self.dict_len,
                cache = self.cache.len(),
                cap = self.config.soft_cap,
                "dictionary soft cap reached, emitting clear"
            );
            self.cache.clear();
            self.dict_len = 0;
            self.write_dict_clear()?;
        }
        Ok(())
    }

    fn write_header(&mut self, metadata: &str) -> Result<()> {
        self.record_buf.clear();
        self.record_buf.push(record_tag::HEADER);
        varint::encode_u64(FORMAT_VERSION, &mut self.record_buf);
        varint::encode_u64(metadata.len() as u64, &mut self.record_buf);
        self.record_buf.extend_from_slice(metadata.as_bytes());
        self.record_buf.extend_from_slice(RECORD_TERMINATOR);
        self.flush_record_buf()
    }

    fn write_dict_clear(&mut self) -> Result<()> {
        let pos = self.pos;
        self.record_buf.clear();
        self.record_buf.push(record_tag::DICT_CLEAR);
        self.record_buf.extend_from_slice(RECORD_TERMINATOR);
        self.flush_record_buf()?;
        self.last_dict_event_pos = pos;
        Ok(())
    }

    fn flush_pending_adds(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pos = self.pos;
        self.record_buf.clear();
        self.record_buf.push(record_tag::DICT_ADD);
        varint::encode_u64(pos - self.last_dict_event_pos, &mut self.record_buf);
        varint::encode_u64(self.pending.len() as u64, &mut self.record_buf);
        for entry in &self.pending {
            varint::encode_u64(entry.len() as u64, &mut self.record_buf);
            self.record_buf.extend_from_slice(entry.as_bytes());
        }
        self.record_buf.extend_from_slice(RECORD_TERMINATOR);
        self.dict_len += self.pending.len();
        self.pending.clear();
        self.flush_record_buf()?;
        self.last_dict_event_pos = pos;
        Ok(())
    }

    fn write_value_record(&mut self) -> Result<()> {
        let pos = self.pos;
        self.record_buf.clear();
        self.record_buf.push(record_tag::VALUE);
        varint::encode_u64(pos - self.last_dict_event_pos, &mut self.record_buf);
        varint::encode_u64(self.value_buf.len() as u64, &mut self.record_buf);
        self.record_buf.extend_from_slice(&self.value_buf);
        self.record_buf.extend_from_slice(RECORD_TERMINATOR);
        self.flush_record_buf()?;
        self.records += 1;
        Ok(())
    }

    fn flush_record_buf(&mut self) -> Result<()> {
        self.out.write_all(&self.record_buf)?;
        self.pos += self.record_buf.len() as u64;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Items emitted in this frame; in objects, even positions are keys
    count: usize,
}

/// Per-record value emitter handed to the `encode` closure
///
/// Operations mirror the decoder's event set. Strings at object key
/// positions are interned regardless of hint.
pub struct FieldWriter<'a> {
    buf: &'a mut Vec<u8>,
    cache: &'a mut InternCache,
    pending: &'a mut Vec<String>,
    frames: &'a mut Vec<Frame>,
    dict_len: usize,
    threshold: usize,
}

impl FieldWriter<'_> {
    pub fn null(&mut self) {
        self.buf.push(value_tag::NULL);
        self.bump();
    }

    pub fn boolean(&mut self, value: bool) {
        self.buf.push(if value {
            value_tag::TRUE
        } else {
            value_tag::FALSE
        });
        self.bump();
    }

    pub fn int(&mut self, value: i64) {
        self.buf.push(value_tag::INT);
        varint::encode_i64(value, self.buf);
        self.bump();
    }

    pub fn uint(&mut self, value: u64) {
        self.buf.push(value_tag::UINT);
        varint::encode_u64(value, self.buf);
        self.bump();
    }

    pub fn double(&mut self, value: f64) {
        self.buf.push(value_tag::DOUBLE);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.bump();
    }

    /// Timestamp value, nanoseconds since the Unix epoch
    pub fn time(&mut self, nanos: i64) {
        self.buf.push(value_tag::TIME);
        varint::encode_i64(nanos, self.buf);
        self.bump();
    }

    /// Write a string, inline or as a dictionary reference per `hint`
    pub fn string(&mut self, value: &str, hint: InternHint) {
        let force = match hint {
            _ if self.at_key_position() => true,
            InternHint::ForceIntern => true,
            InternHint::Auto => false,
            InternHint::ForceNoIntern => {
                self.write_inline(value);
                self.bump();
                return;
            }
        };
        match self.intern_index(value, force) {
            Some(idx) => {
                self.buf.push(value_tag::DICT_REF);
                varint::encode_u64(idx as u64, self.buf);
            }
            None => self.write_inline(value),
        }
        self.bump();
    }

    /// Write an object key; keys are always interned
    pub fn key(&mut self, key: &str) {
        self.string(key, InternHint::ForceIntern);
    }

    pub fn start_map(&mut self) {
        self.buf.push(value_tag::OBJECT_START);
        self.frames.push(Frame {
            kind: FrameKind::Object,
            count: 0,
        });
    }

    pub fn end_map(&mut self) {
        self.buf.push(value_tag::OBJECT_END);
        self.frames.pop();
        self.bump();
    }

    pub fn start_array(&mut self) {
        self.buf.push(value_tag::ARRAY_START);
        self.frames.push(Frame {
            kind: FrameKind::Array,
            count: 0,
        });
    }

    pub fn end_array(&mut self) {
        self.buf.push(value_tag::ARRAY_END);
        self.frames.pop();
        self.bump();
    }

    fn at_key_position(&self) -> bool {
        matches!(
            self.frames.last(),
            Some(Frame {
                kind: FrameKind::Object,
                count,
            }) if count % 2 == 0
        )
    }

    fn bump(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.count += 1;
        }
    }

    fn write_inline(&mut self, value: &str) {
        self.buf.push(value_tag::STRING);
        varint::encode_u64(value.len() as u64, self.buf);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Resolve a string to a dictionary index, promoting if warranted
    fn intern_index(&mut self, value: &str, force: bool) -> Option<u32> {
        self.cache.tick += 1;
        let tick = self.cache.tick;
        if let Some(entry) = self.cache.map.get_mut(value) {
            entry.last_used = tick;
            if let Some(idx) = entry.index {
                return Some(idx);
            }
            entry.count += 1;
            if force || entry.count >= self.threshold {
                let idx = (self.dict_len + self.pending.len()) as u32;
                entry.index = Some(idx);
                self.cache.candidates -= 1;
                self.pending.push(value.to_string());
                return Some(idx);
            }
            return None;
        }
        if force {
            let idx = (self.dict_len + self.pending.len()) as u32;
            self.cache.map.insert(
                value.to_string(),
                CacheEntry {
                    count: 1,
                    index: Some(idx),
                    last_used: tick,
                },
            );
            self.pending.push(value.to_string());
            return Some(idx);
        }
        self.cache.insert_candidate(value, tick);
        None
    }
}

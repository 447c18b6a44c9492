//! Record framing
//!
//! Drives the value parser over record boundaries: reads the one-byte record
//! tag, maintains the dictionary across clear/add records, validates
//! back-offsets, and hands value payloads to a [`RecordHandler`].
//!
//! # Back-offsets
//!
//! Every dict-add and value record carries a varuint distance backward to
//! the dict event that governs it. In plain forward parsing that is always
//! the most recent event; during a grep context rewind the parser re-reads
//! records it has already applied, so validation accepts any applied event
//! of a retained epoch (selecting it for the record's lookups) and dict
//! records replay idempotently.

use crate::dictionary::Dictionary;
use crate::marker::{record_tag, FORMAT_VERSION, RECORD_TERMINATOR};
use crate::source::ByteSource;
use crate::varint;
use crate::{AuError, Result};

/// Cap on scratch pre-allocation for header/dict strings
const MAX_STRING_RESERVE: usize = 64 * 1024;

/// Receiver for record-level events
///
/// The handler owns value decoding: `on_value` is expected to consume
/// exactly `len` bytes from the source, either by running a
/// [`ValueParser`](crate::ValueParser) or by skipping the payload.
pub trait RecordHandler<S: ByteSource> {
    /// A record begins at `pos`
    fn on_record_start(&mut self, pos: u64) -> Result<()> {
        let _ = pos;
        Ok(())
    }

    /// Version header; `version` has already been validated
    fn on_header(&mut self, version: u64, metadata: &str) -> Result<()> {
        let _ = (version, metadata);
        Ok(())
    }

    /// A dict-clear record; fires before the dictionary resets
    fn on_dict_clear(&mut self, dict: &Dictionary) -> Result<()> {
        let _ = dict;
        Ok(())
    }

    /// A dict-add record; fires after `added` entries were appended
    fn on_dict_add(&mut self, dict: &Dictionary, added: usize) -> Result<()> {
        let _ = (dict, added);
        Ok(())
    }

    /// A value record of `len` payload bytes, positioned at the payload
    fn on_value(&mut self, len: usize, source: &mut S, dict: &Dictionary) -> Result<()>;

    /// The stream ended cleanly
    fn on_parse_end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Skips value payloads; used when only dictionary state matters
pub struct SkipValueHandler;

impl<S: ByteSource> RecordHandler<S> for SkipValueHandler {
    fn on_value(&mut self, len: usize, source: &mut S, _dict: &Dictionary) -> Result<()> {
        source.skip(len as u64)
    }
}

/// Parser over record framing
pub struct RecordParser<'a, S: ByteSource, H: RecordHandler<S>> {
    source: &'a mut S,
    dictionary: &'a mut Dictionary,
    handler: &'a mut H,
}

impl<'a, S: ByteSource, H: RecordHandler<S>> RecordParser<'a, S, H> {
    pub fn new(source: &'a mut S, dictionary: &'a mut Dictionary, handler: &'a mut H) -> Self {
        Self {
            source,
            dictionary,
            handler,
        }
    }

    /// Parse records until end of data
    pub fn parse_stream(&mut self) -> Result<()> {
        while self.source.peek()?.is_some() {
            self.parse_record()?;
        }
        self.handler.on_parse_end()
    }

    /// Parse records until one value record has been handled
    ///
    /// Returns false if the data ended before a value record.
    pub fn parse_until_value(&mut self) -> Result<bool> {
        while self.source.peek()?.is_some() {
            if self.parse_record()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Parse exactly one record; true if it was a value record
    pub fn parse_record(&mut self) -> Result<bool> {
        let pos = self.source.pos();
        self.handler.on_record_start(pos)?;
        let tag = self
            .source
            .next()?
            .ok_or_else(|| AuError::eof(pos, "expected a record"))?;
        match tag {
            record_tag::HEADER => {
                let version = varint::read_u64(self.source)?;
                if version != FORMAT_VERSION {
                    return Err(AuError::UnsupportedVersion { pos, version });
                }
                let metadata = self.read_string()?;
                self.handler.on_header(version, &metadata)?;
                self.expect_terminator()?;
                Ok(false)
            }
            record_tag::DICT_CLEAR => {
                // A rewound, already-applied clear keeps its epoch.
                if !self.is_replay(pos)? {
                    self.handler.on_dict_clear(self.dictionary)?;
                    self.dictionary.clear(pos);
                }
                self.expect_terminator()?;
                Ok(false)
            }
            record_tag::DICT_ADD => {
                let backoff = varint::read_u64(self.source)?;
                let count = varint::read_u64(self.source)? as usize;
                let replay = self.is_replay(pos)?;
                if !replay {
                    self.validate_chained_event(pos, backoff)?;
                    self.dictionary.begin_add(pos);
                }
                for _ in 0..count {
                    let entry = self.read_string()?;
                    if !replay {
                        self.dictionary.append(entry);
                    }
                }
                if !replay {
                    self.handler.on_dict_add(self.dictionary, count)?;
                }
                self.expect_terminator()?;
                Ok(false)
            }
            record_tag::VALUE => {
                let backoff = varint::read_u64(self.source)?;
                let len = varint::read_u64(self.source)? as usize;
                self.validate_governing_event(pos, backoff)?;
                let payload_start = self.source.pos();
                self.handler.on_value(len, self.source, self.dictionary)?;
                let consumed = self.source.pos() - payload_start;
                if consumed != len as u64 {
                    return Err(AuError::malformed(
                        pos,
                        format!("value payload is {len} bytes but {consumed} were consumed"),
                    ));
                }
                self.expect_terminator()?;
                Ok(true)
            }
            other => Err(AuError::malformed(
                pos,
                format!("unknown record tag 0x{other:02x}"),
            )),
        }
    }

    /// Whether a dict record at `pos` was already applied (context rewind)
    fn is_replay(&self, pos: u64) -> Result<bool> {
        match self.dictionary.last_event_pos() {
            Some(last) if pos <= last => {
                if self.dictionary.is_applied_event(pos) {
                    Ok(true)
                } else {
                    Err(AuError::dict_inconsistent(
                        pos,
                        "dict record at a position that is not an applied dict event",
                    ))
                }
            }
            _ => Ok(false),
        }
    }

    /// A new dict-add must extend the most recent dict event
    fn validate_chained_event(&self, pos: u64, backoff: u64) -> Result<()> {
        let governing = pos
            .checked_sub(backoff)
            .ok_or_else(|| AuError::malformed(pos, "back-offset larger than stream position"))?;
        match self.dictionary.last_event_pos() {
            Some(last) if last == governing => Ok(()),
            Some(last) => Err(AuError::dict_inconsistent(
                pos,
                format!("dict add names event at {governing}, last event is at {last}"),
            )),
            None => Err(AuError::dict_inconsistent(
                pos,
                "dict add before any dict event",
            )),
        }
    }

    /// A value record may be governed by any applied event of a retained
    /// epoch; lookups for this record resolve against that epoch
    fn validate_governing_event(&mut self, pos: u64, backoff: u64) -> Result<()> {
        let governing = pos
            .checked_sub(backoff)
            .ok_or_else(|| AuError::malformed(pos, "back-offset larger than stream position"))?;
        if self.dictionary.activate_event(governing) {
            Ok(())
        } else {
            Err(AuError::dict_inconsistent(
                pos,
                format!("value names dict event at {governing}, which is not applied"),
            ))
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let len = varint::read_u64(self.source)? as usize;
        let mut bytes = Vec::with_capacity(len.min(MAX_STRING_RESERVE));
        self.source.read_exact(len, |frag| {
            bytes.extend_from_slice(frag);
            Ok(())
        })?;
        // Strings are not validated by the codec; invalid UTF-8 is replaced
        // rather than rejected.
        Ok(match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    fn expect_terminator(&mut self) -> Result<()> {
        let pos = self.source.pos();
        for &expected in RECORD_TERMINATOR {
            match self.source.next()? {
                Some(b) if b == expected => {}
                Some(b) => {
                    return Err(AuError::malformed(
                        pos,
                        format!("missing record terminator, got 0x{b:02x}"),
                    ))
                }
                None => return Err(AuError::eof(pos, "stream ended inside record terminator")),
            }
        }
        Ok(())
    }
}

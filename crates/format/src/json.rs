//! JSON rendering of decoded events
//!
//! Renders each value record as one line of canonical JSON: standard
//! escapes, integers in decimal, doubles in shortest round-trip form
//! (non-finite values become `null`), timestamps as ISO-8601 with
//! microsecond precision, and dictionary references dereferenced to their
//! string. Output streams straight to the writer; strings are escaped
//! fragment by fragment without buffering.

use std::io::Write;

use chrono::DateTime;

use crate::dictionary::Dictionary;
use crate::record::RecordHandler;
use crate::source::ByteSource;
use crate::value::{ValueHandler, ValueParser};
use crate::{AuError, Result};

/// Record handler that renders value records as JSON lines
pub struct JsonRecordHandler<W: Write> {
    out: W,
    frames: Vec<Frame>,
}

impl<W: Write> JsonRecordHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames: Vec::new(),
        }
    }

    /// Return the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write, S: ByteSource> RecordHandler<S> for JsonRecordHandler<W> {
    fn on_value(&mut self, _len: usize, source: &mut S, dict: &Dictionary) -> Result<()> {
        self.frames.clear();
        let mut visitor = JsonVisitor {
            out: &mut self.out,
            dict,
            frames: &mut self.frames,
        };
        ValueParser::new(source, &mut visitor).parse()?;
        writeln!(self.out)?;
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
    count: usize,
}

struct JsonVisitor<'a, W: Write> {
    out: &'a mut W,
    dict: &'a Dictionary,
    frames: &'a mut Vec<Frame>,
}

impl<W: Write> JsonVisitor<'_, W> {
    /// Write the separator owed before the next item: `,` between array
    /// elements and object members, `:` between a key and its value
    fn separator(&mut self) -> Result<()> {
        match self.frames.last() {
            Some(Frame {
                kind: FrameKind::Object,
                count,
            }) => {
                if count % 2 == 1 {
                    self.out.write_all(b":")?;
                } else if *count > 0 {
                    self.out.write_all(b",")?;
                }
            }
            Some(Frame {
                kind: FrameKind::Array,
                count,
            }) => {
                if *count > 0 {
                    self.out.write_all(b",")?;
                }
            }
            None => {}
        }
        Ok(())
    }

    fn bump(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.count += 1;
        }
    }
}

impl<W: Write> ValueHandler for JsonVisitor<'_, W> {
    fn on_null(&mut self, _pos: u64) -> Result<()> {
        self.separator()?;
        self.out.write_all(b"null")?;
        self.bump();
        Ok(())
    }

    fn on_bool(&mut self, _pos: u64, value: bool) -> Result<()> {
        self.separator()?;
        let token: &[u8] = if value { b"true" } else { b"false" };
        self.out.write_all(token)?;
        self.bump();
        Ok(())
    }

    fn on_int(&mut self, _pos: u64, value: i64) -> Result<()> {
        self.separator()?;
        write!(self.out, "{value}")?;
        self.bump();
        Ok(())
    }

    fn on_uint(&mut self, _pos: u64, value: u64) -> Result<()> {
        self.separator()?;
        write!(self.out, "{value}")?;
        self.bump();
        Ok(())
    }

    fn on_double(&mut self, _pos: u64, value: f64) -> Result<()> {
        self.separator()?;
        if value.is_finite() {
            write!(self.out, "{value}")?;
        } else {
            self.out.write_all(b"null")?;
        }
        self.bump();
        Ok(())
    }

    fn on_time(&mut self, _pos: u64, nanos: i64) -> Result<()> {
        self.separator()?;
        self.out.write_all(b"\"")?;
        write_iso8601_micros(&mut self.out, nanos)?;
        self.out.write_all(b"\"")?;
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
        self.separator()?;
        self.out.write_all(b"\"")?;
        write_json_escaped(&mut self.out, entry.as_bytes())?;
        self.out.write_all(b"\"")?;
        self.bump();
        Ok(())
    }

    fn on_string_start(&mut self, _pos: u64, _len: usize) -> Result<()> {
        self.separator()?;
        self.out.write_all(b"\"")?;
        Ok(())
    }

    fn on_string_fragment(&mut self, fragment: &[u8]) -> Result<()> {
        write_json_escaped(&mut self.out, fragment)
    }

    fn on_string_end(&mut self) -> Result<()> {
        self.out.write_all(b"\"")?;
        self.bump();
        Ok(())
    }

    fn on_object_start(&mut self) -> Result<()> {
        self.separator()?;
        self.out.write_all(b"{")?;
        self.frames.push(Frame {
            kind: FrameKind::Object,
            count: 0,
        });
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<()> {
        self.out.write_all(b"}")?;
        self.frames.pop();
        self.bump();
        Ok(())
    }

    fn on_array_start(&mut self) -> Result<()> {
        self.separator()?;
        self.out.write_all(b"[")?;
        self.frames.push(Frame {
            kind: FrameKind::Array,
            count: 0,
        });
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<()> {
        self.out.write_all(b"]")?;
        self.frames.pop();
        self.bump();
        Ok(())
    }
}

/// Render nanoseconds since the epoch as `1970-01-01T00:00:00.123456`,
/// truncating sub-microsecond precision toward zero
pub fn write_iso8601_micros<W: Write>(out: &mut W, nanos: i64) -> Result<()> {
    let micros = nanos / 1000;
    let secs = micros.div_euclid(1_000_000);
    let frac = micros.rem_euclid(1_000_000) as u32;
    match DateTime::from_timestamp(secs, frac * 1000) {
        Some(dt) => write!(out, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6f"))?,
        // Out of chrono's representable range; fall back to raw nanos.
        None => write!(out, "{nanos}ns")?,
    }
    Ok(())
}

/// Write bytes with standard JSON escapes, passing non-ASCII through
fn write_json_escaped<W: Write>(out: &mut W, bytes: &[u8]) -> Result<()> {
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let escape: Option<&[u8]> = match b {
            b'"' => Some(b"\\\""),
            b'\\' => Some(b"\\\\"),
            b'\n' => Some(b"\\n"),
            b'\r' => Some(b"\\r"),
            b'\t' => Some(b"\\t"),
            0x08 => Some(b"\\b"),
            0x0c => Some(b"\\f"),
            _ => None,
        };
        if let Some(esc) = escape {
            out.write_all(&bytes[start..i])?;
            out.write_all(esc)?;
            start = i + 1;
        } else if b < 0x20 {
            out.write_all(&bytes[start..i])?;
            write!(out, "\\u{b:04x}")?;
            start = i + 1;
        }
    }
    out.write_all(&bytes[start..])?;
    Ok(())
}

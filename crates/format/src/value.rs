//! Pull parser for value payloads
//!
//! Reads one value off a byte source and dispatches typed events to a
//! caller-supplied [`ValueHandler`]. Dispatch is static; the parser performs
//! no per-event allocation. Strings are delivered as one or more raw byte
//! fragments - a string that crosses a buffer refill arrives in pieces.
//!
//! `pos` arguments are the absolute position of the value's tag byte.

use crate::marker::value_tag;
use crate::source::ByteSource;
use crate::varint;
use crate::{AuError, Result, DEFAULT_MAX_DEPTH};

/// Receiver for value parse events
///
/// All methods default to no-ops so collectors can implement only what they
/// observe.
pub trait ValueHandler {
    fn on_null(&mut self, pos: u64) -> Result<()> {
        let _ = pos;
        Ok(())
    }

    fn on_bool(&mut self, pos: u64, value: bool) -> Result<()> {
        let _ = (pos, value);
        Ok(())
    }

    fn on_int(&mut self, pos: u64, value: i64) -> Result<()> {
        let _ = (pos, value);
        Ok(())
    }

    fn on_uint(&mut self, pos: u64, value: u64) -> Result<()> {
        let _ = (pos, value);
        Ok(())
    }

    fn on_double(&mut self, pos: u64, value: f64) -> Result<()> {
        let _ = (pos, value);
        Ok(())
    }

    /// Timestamp value, nanoseconds since the Unix epoch
    fn on_time(&mut self, pos: u64, nanos: i64) -> Result<()> {
        let _ = (pos, nanos);
        Ok(())
    }

    fn on_dict_ref(&mut self, pos: u64, index: usize) -> Result<()> {
        let _ = (pos, index);
        Ok(())
    }

    fn on_string_start(&mut self, pos: u64, len: usize) -> Result<()> {
        let _ = (pos, len);
        Ok(())
    }

    /// Raw bytes of an inline string; may fire multiple times per string
    fn on_string_fragment(&mut self, fragment: &[u8]) -> Result<()> {
        let _ = fragment;
        Ok(())
    }

    fn on_string_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_object_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_array_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Parser for a single value payload
pub struct ValueParser<'a, S: ByteSource, H: ValueHandler> {
    source: &'a mut S,
    handler: &'a mut H,
    max_depth: usize,
}

impl<'a, S: ByteSource, H: ValueHandler> ValueParser<'a, S, H> {
    pub fn new(source: &'a mut S, handler: &'a mut H) -> Self {
        Self {
            source,
            handler,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the container nesting bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse exactly one value, dispatching events to the handler
    pub fn parse(&mut self) -> Result<()> {
        self.value(0)
    }

    fn value(&mut self, depth: usize) -> Result<()> {
        if depth >= self.max_depth {
            return Err(AuError::NestingExceeded {
                pos: self.source.pos(),
                max: self.max_depth,
            });
        }
        let pos = self.source.pos();
        let tag = self
            .source
            .next()?
            .ok_or_else(|| AuError::eof(pos, "expected a value"))?;
        match tag {
            value_tag::NULL => self.handler.on_null(pos),
            value_tag::TRUE => self.handler.on_bool(pos, true),
            value_tag::FALSE => self.handler.on_bool(pos, false),
            value_tag::INT => {
                let v = varint::read_i64(self.source)?;
                self.handler.on_int(pos, v)
            }
            value_tag::UINT => {
                let v = varint::read_u64(self.source)?;
                self.handler.on_uint(pos, v)
            }
            value_tag::DOUBLE => {
                let v = self.read_double()?;
                self.handler.on_double(pos, v)
            }
            value_tag::TIME => {
                let nanos = varint::read_i64(self.source)?;
                self.handler.on_time(pos, nanos)
            }
            value_tag::STRING => {
                let len = varint::read_u64(self.source)? as usize;
                self.handler.on_string_start(pos, len)?;
                let handler = &mut *self.handler;
                self.source
                    .read_exact(len, |frag| handler.on_string_fragment(frag))?;
                self.handler.on_string_end()
            }
            value_tag::DICT_REF => {
                let idx = varint::read_u64(self.source)? as usize;
                self.handler.on_dict_ref(pos, idx)
            }
            value_tag::ARRAY_START => {
                self.handler.on_array_start()?;
                loop {
                    match self.source.peek()? {
                        None => return Err(AuError::eof(self.source.pos(), "unterminated array")),
                        Some(value_tag::ARRAY_END) => {
                            self.source.next()?;
                            return self.handler.on_array_end();
                        }
                        Some(_) => self.value(depth + 1)?,
                    }
                }
            }
            value_tag::OBJECT_START => {
                self.handler.on_object_start()?;
                loop {
                    match self.source.peek()? {
                        None => return Err(AuError::eof(self.source.pos(), "unterminated object")),
                        Some(value_tag::OBJECT_END) => {
                            self.source.next()?;
                            return self.handler.on_object_end();
                        }
                        Some(_) => {
                            self.key()?;
                            self.value(depth + 1)?;
                        }
                    }
                }
            }
            other => Err(AuError::malformed(
                pos,
                format!("unknown value tag 0x{other:02x}"),
            )),
        }
    }

    /// Object keys are always dictionary references
    fn key(&mut self) -> Result<()> {
        let pos = self.source.pos();
        let tag = self
            .source
            .next()?
            .ok_or_else(|| AuError::eof(pos, "expected an object key"))?;
        if tag != value_tag::DICT_REF {
            return Err(AuError::malformed(
                pos,
                format!("object key must be a dictionary reference, got tag 0x{tag:02x}"),
            ));
        }
        let idx = varint::read_u64(self.source)? as usize;
        self.handler.on_dict_ref(pos, idx)
    }

    fn read_double(&mut self) -> Result<f64> {
        let mut bytes = [0u8; 8];
        let mut filled = 0;
        self.source.read_exact(8, |frag| {
            bytes[filled..filled + frag.len()].copy_from_slice(frag);
            filled += frag.len();
            Ok(())
        })?;
        Ok(f64::from_le_bytes(bytes))
    }
}

//! Buffered byte source with bounded seek-back
//!
//! Decoding needs more than a forward reader: grep rewinds to a record start
//! after matching, bisect seeks across the file, and tail scans for record
//! boundaries on a growing stream. [`BufferedSource`] provides all of that
//! over a minimal [`RawSource`] (file, stdin, or an in-memory buffer).
//!
//! # Buffer management
//!
//! The working buffer keeps at least [`MIN_HISTORY`](crate::MIN_HISTORY)
//! bytes of consumed data resident so short rewinds never touch the
//! underlying stream, even on pipes. A *pin* extends that guarantee to an
//! arbitrary earlier position; grep pins the oldest record start in its
//! context window. On refill, consumed bytes beyond the history window are
//! shifted out; if no free space remains the buffer grows by a fixed
//! 256 KiB step.
//!
//! Callers must not hold slices handed out by `read_exact` across any other
//! source call; a refill may move the buffer.

mod file;
mod mem;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memchr::memmem;

use crate::{AuError, Result, DEFAULT_BUFFER_CHUNK, MIN_HISTORY};

pub use file::{open_input, FileSource, InputSource, StdinSource};
pub use mem::MemSource;

/// Sleep granularity between retries in `wait_for_data` mode
const WAIT_RETRY: Duration = Duration::from_secs(1);

/// Raw byte supplier underneath a [`BufferedSource`]
///
/// Implementations only provide sequential reads plus (optionally) absolute
/// seeks; all buffering, history retention, and scanning lives in
/// [`BufferedSource`].
pub trait RawSource {
    /// Read up to `buf.len()` bytes, returning 0 only at end of data
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Seek to an absolute position
    fn seek(&mut self, abspos: u64) -> std::io::Result<()>;

    /// Whether [`RawSource::seek`] can succeed
    fn is_seekable(&self) -> bool;

    /// Current total length of the underlying data
    fn end_pos(&self) -> std::io::Result<u64>;
}

/// Positioned, buffered reader used by every parser in this crate
pub trait ByteSource {
    /// Display name of the source (file path or `<stdin>`)
    fn name(&self) -> &str;

    /// Absolute byte position of the cursor in the underlying stream
    fn pos(&self) -> u64;

    /// Consume and return the next byte, or `None` at end of data
    fn next(&mut self) -> Result<Option<u8>>;

    /// Return the next byte without consuming it, or `None` at end of data
    fn peek(&mut self) -> Result<Option<u8>>;

    /// Deliver exactly `len` bytes to `sink` as one or more contiguous slices
    ///
    /// Slices are only valid for the duration of the callback.
    fn read_exact<F>(&mut self, len: usize, sink: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>;

    /// Advance the cursor by `len` bytes
    fn skip(&mut self, len: u64) -> Result<()>;

    /// Move the cursor to an absolute position
    ///
    /// Positions within retained history rewind in place. Anything else
    /// requires the underlying source to seek and clears any pin.
    fn seek(&mut self, abspos: u64) -> Result<()>;

    /// Require history back to `abspos` to stay resident across reads
    ///
    /// `abspos` must lie within the currently retained history. A new pin
    /// supersedes the old one.
    fn set_pin(&mut self, abspos: u64);

    /// Drop the pin requirement
    fn clear_pin(&mut self);

    /// Advance until `needle` starts at the cursor; false if data runs out
    fn scan_to(&mut self, needle: &[u8]) -> Result<bool>;

    /// Whether [`ByteSource::seek`] outside the buffer can succeed
    fn is_seekable(&self) -> bool;

    /// Current total length of the underlying data
    fn end_pos(&self) -> Result<u64>;
}

/// Byte source construction options
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Buffer allocation unit and growth step; 0 means the 256 KiB default
    pub buffer_chunk: usize,

    /// Sleep and retry on zero-byte reads instead of reporting EOF
    pub wait_for_data: bool,

    /// Flag checked between reads in `wait_for_data` mode; setting it makes
    /// the next retry report EOF instead of sleeping again
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl SourceConfig {
    /// Config for tail/follow mode
    pub fn waiting() -> Self {
        Self {
            wait_for_data: true,
            ..Self::default()
        }
    }

    /// Attach an interrupt flag
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }
}

/// Buffered implementation of [`ByteSource`] over a [`RawSource`]
pub struct BufferedSource<R: RawSource> {
    raw: R,
    name: String,
    /// Working buffer; `buf.len()` is the allocated size
    buf: Vec<u8>,
    /// Allocation unit and linear growth step
    chunk: usize,
    /// Absolute position of the cursor in the underlying stream
    pos: u64,
    /// Cursor index into `buf`
    cur: usize,
    /// End of valid data in `buf`
    limit: usize,
    pin: Option<u64>,
    wait_for_data: bool,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<R: RawSource> BufferedSource<R> {
    /// Wrap a raw source with default options
    pub fn new(raw: R, name: impl Into<String>) -> Self {
        Self::with_config(raw, name, SourceConfig::default())
    }

    /// Wrap a raw source with explicit options
    pub fn with_config(raw: R, name: impl Into<String>, config: SourceConfig) -> Self {
        let chunk = if config.buffer_chunk == 0 {
            DEFAULT_BUFFER_CHUNK
        } else {
            config.buffer_chunk
        };
        Self {
            raw,
            name: name.into(),
            buf: vec![0; chunk],
            chunk,
            pos: 0,
            cur: 0,
            limit: 0,
            pin: None,
            wait_for_data: config.wait_for_data,
            interrupt: config.interrupt,
        }
    }

    /// Unconsumed bytes currently buffered
    #[inline]
    fn avail(&self) -> usize {
        self.limit - self.cur
    }

    #[inline]
    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Pull more data from the raw source
    ///
    /// Keeps the history window (and any pinned suffix) resident, growing
    /// the buffer by `chunk` when full. Returns false when the source has
    /// no more bytes (or the interrupt flag was raised in wait mode).
    fn refill(&mut self) -> Result<bool> {
        let mut hist = MIN_HISTORY;
        if let Some(pin) = self.pin {
            if pin < self.pos {
                hist = hist.max((self.pos - pin) as usize);
            }
        }
        if self.cur > hist {
            let start = self.cur - hist;
            self.buf.copy_within(start..self.limit, 0);
            self.cur -= start;
            self.limit -= start;
        }

        if self.limit == self.buf.len() {
            let grown = self.buf.len() + self.chunk;
            self.buf.resize(grown, 0);
        }

        loop {
            let n = self.raw.read(&mut self.buf[self.limit..])?;
            if n == 0 && self.wait_for_data {
                if self.interrupted() {
                    return Ok(false);
                }
                std::thread::sleep(WAIT_RETRY);
                continue;
            }
            if n == 0 {
                return Ok(false);
            }
            self.limit += n;
            return Ok(true);
        }
    }
}

impl<R: RawSource> ByteSource for BufferedSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn pos(&self) -> u64 {
        self.pos
    }

    fn next(&mut self) -> Result<Option<u8>> {
        while self.cur == self.limit {
            if !self.refill()? {
                return Ok(None);
            }
        }
        let byte = self.buf[self.cur];
        self.cur += 1;
        self.pos += 1;
        Ok(Some(byte))
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        while self.cur == self.limit {
            if !self.refill()? {
                return Ok(None);
            }
        }
        Ok(Some(self.buf[self.cur]))
    }

    fn read_exact<F>(&mut self, mut len: usize, mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        while len > 0 {
            while self.cur == self.limit {
                if !self.refill()? {
                    return Err(AuError::eof(
                        self.pos,
                        format!("reached end of stream with {len} bytes left to read"),
                    ));
                }
            }
            let take = len.min(self.avail());
            sink(&self.buf[self.cur..self.cur + take])?;
            self.cur += take;
            self.pos += take as u64;
            len -= take;
        }
        Ok(())
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        self.seek(self.pos + len)
    }

    fn seek(&mut self, abspos: u64) -> Result<()> {
        if abspos <= self.pos && self.pos - abspos <= self.cur as u64 {
            // Within retained history: rewind in place.
            let back = (self.pos - abspos) as usize;
            self.cur -= back;
            self.pos = abspos;
            return Ok(());
        }
        if abspos > self.pos && abspos - self.pos <= self.avail() as u64 {
            // Target already buffered: step forward without touching the
            // raw source, preserving history and any pin.
            let fwd = (abspos - self.pos) as usize;
            self.cur += fwd;
            self.pos = abspos;
            return Ok(());
        }
        if !self.raw.is_seekable() {
            return Err(AuError::seek_failed(
                abspos,
                format!("{} is not seekable", self.name),
            ));
        }
        self.raw
            .seek(abspos)
            .map_err(|e| AuError::seek_failed(abspos, e.to_string()))?;
        self.cur = 0;
        self.limit = 0;
        self.pos = abspos;
        // The retained window is gone; a pin past this point is a lie.
        self.clear_pin();
        if !self.refill()? {
            return Err(AuError::eof(abspos, "no data at seek target"));
        }
        Ok(())
    }

    fn set_pin(&mut self, abspos: u64) {
        debug_assert!(abspos >= self.pos - self.cur as u64);
        self.pin = Some(abspos);
    }

    fn clear_pin(&mut self) {
        self.pin = None;
    }

    fn scan_to(&mut self, needle: &[u8]) -> Result<bool> {
        loop {
            while self.avail() < needle.len() {
                // A prior failed scan may have left fewer than
                // len(needle) - 1 bytes buffered; keep reading until there is
                // enough to search or the source is truly dry.
                if !self.refill()? {
                    return Ok(false);
                }
            }
            match memmem::find(&self.buf[self.cur..self.limit], needle) {
                Some(offset) => {
                    self.cur += offset;
                    self.pos += offset as u64;
                    return Ok(true);
                }
                None => {
                    let keep = needle.len() - 1;
                    let advance = (self.avail() - keep) as u64;
                    self.skip(advance)?;
                }
            }
        }
    }

    fn is_seekable(&self) -> bool {
        self.raw.is_seekable()
    }

    fn end_pos(&self) -> Result<u64> {
        Ok(self.raw.end_pos()?)
    }
}

//! In-memory raw source
//!
//! Backs the codec tests and lets callers decode byte buffers they already
//! hold. `max_chunk` caps how many bytes each raw read returns, which forces
//! buffer refills and string fragmentation at arbitrary offsets.

use std::io;

use super::{BufferedSource, RawSource, SourceConfig};

/// Raw source over an owned byte buffer
pub struct MemSource {
    data: Vec<u8>,
    at: usize,
    max_chunk: usize,
}

impl MemSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            at: 0,
            max_chunk: usize::MAX,
        }
    }

    /// Cap the number of bytes returned by each raw read
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        assert!(max_chunk > 0);
        self.max_chunk = max_chunk;
        self
    }

    /// Convenience: a buffered source over `data` named `<mem>`
    pub fn buffered(data: Vec<u8>) -> BufferedSource<MemSource> {
        BufferedSource::new(Self::new(data), "<mem>")
    }

    /// Convenience: a buffered source with explicit options
    pub fn buffered_with(data: Vec<u8>, config: SourceConfig) -> BufferedSource<MemSource> {
        BufferedSource::with_config(Self::new(data), "<mem>", config)
    }
}

impl RawSource for MemSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf
            .len()
            .min(self.data.len().saturating_sub(self.at))
            .min(self.max_chunk);
        buf[..n].copy_from_slice(&self.data[self.at..self.at + n]);
        self.at += n;
        Ok(n)
    }

    fn seek(&mut self, abspos: u64) -> io::Result<()> {
        // Seeking past the end is allowed, as with a file; reads there
        // return no data.
        self.at = abspos as usize;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn end_pos(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

//! File and stdin raw sources

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::{BufferedSource, RawSource, SourceConfig};
use crate::Result;

/// Raw source over a regular file
pub struct FileSource {
    file: File,
}

impl FileSource {
    /// Open a file for sequential decoding
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }
}

impl RawSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, abspos: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(abspos))?;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn end_pos(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Raw source over the process's standard input
pub struct StdinSource {
    stdin: io::Stdin,
}

impl StdinSource {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSource for StdinSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.read(buf)
    }

    fn seek(&mut self, _abspos: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stdin is not seekable",
        ))
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn end_pos(&self) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stdin has no known length",
        ))
    }
}

/// Either kind of CLI input
pub enum InputSource {
    File(FileSource),
    Stdin(StdinSource),
}

impl RawSource for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(buf),
            Self::Stdin(s) => s.read(buf),
        }
    }

    fn seek(&mut self, abspos: u64) -> io::Result<()> {
        match self {
            Self::File(f) => RawSource::seek(f, abspos),
            Self::Stdin(s) => RawSource::seek(s, abspos),
        }
    }

    fn is_seekable(&self) -> bool {
        match self {
            Self::File(f) => f.is_seekable(),
            Self::Stdin(s) => s.is_seekable(),
        }
    }

    fn end_pos(&self) -> io::Result<u64> {
        match self {
            Self::File(f) => f.end_pos(),
            Self::Stdin(s) => s.end_pos(),
        }
    }
}

/// Open `path` as a buffered byte source; `-` means stdin
pub fn open_input(path: &str, config: SourceConfig) -> Result<BufferedSource<InputSource>> {
    let (raw, name) = if path == "-" {
        (InputSource::Stdin(StdinSource::new()), "<stdin>".to_string())
    } else {
        (
            InputSource::File(FileSource::open(path)?),
            path.to_string(),
        )
    };
    Ok(BufferedSource::with_config(raw, name, config))
}

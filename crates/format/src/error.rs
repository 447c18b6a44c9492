//! Codec error types
//!
//! Parse-side errors carry the absolute stream position at which they were
//! detected, so user-visible failures render as `<position>: <message>`.

use thiserror::Error;

/// Errors that can occur while encoding or decoding an au stream
#[derive(Debug, Error)]
pub enum AuError {
    /// I/O error from the underlying reader or writer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a record
    #[error("{pos}: unexpected end of stream: {msg}")]
    UnexpectedEof { pos: u64, msg: String },

    /// A record or value payload violates the format grammar
    #[error("{pos}: malformed record: {msg}")]
    MalformedRecord { pos: u64, msg: String },

    /// Header declares a format version this decoder does not speak
    #[error("{pos}: unsupported format version {version}")]
    UnsupportedVersion { pos: u64, version: u64 },

    /// A back-offset does not name an applied dictionary event
    #[error("{pos}: dictionary inconsistent: {msg}")]
    DictInconsistent { pos: u64, msg: String },

    /// Varint exceeds 10 bytes or does not fit in 64 bits
    #[error("{pos}: varint overflow")]
    Overflow { pos: u64 },

    /// Value nesting exceeds the configured depth bound
    #[error("{pos}: nesting depth exceeds {max}")]
    NestingExceeded { pos: u64, max: usize },

    /// The underlying source cannot seek but a seek was required
    #[error("seek to {pos} failed: {msg}")]
    SeekFailed { pos: u64, msg: String },

    /// No valid record boundary was found within the resync window
    #[error("{pos}: failed to locate a record boundary")]
    ResyncFailed { pos: u64 },
}

impl AuError {
    /// Create an unexpected-EOF error
    #[inline]
    pub fn eof(pos: u64, msg: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            pos,
            msg: msg.into(),
        }
    }

    /// Create a malformed-record error
    #[inline]
    pub fn malformed(pos: u64, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            pos,
            msg: msg.into(),
        }
    }

    /// Create a dictionary-inconsistency error
    #[inline]
    pub fn dict_inconsistent(pos: u64, msg: impl Into<String>) -> Self {
        Self::DictInconsistent {
            pos,
            msg: msg.into(),
        }
    }

    /// Create a seek-failed error
    #[inline]
    pub fn seek_failed(pos: u64, msg: impl Into<String>) -> Self {
        Self::SeekFailed {
            pos,
            msg: msg.into(),
        }
    }

    /// Check whether resync may continue past this error
    ///
    /// Tail mode treats grammar and dictionary damage as recoverable: it
    /// resumes scanning from the next byte. I/O failures are terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. }
                | Self::DictInconsistent { .. }
                | Self::Overflow { .. }
                | Self::UnexpectedEof { .. }
                | Self::NestingExceeded { .. }
        )
    }
}

//! Au format - streaming dictionary-encoded binary records
//!
//! Au is a compact, self-describing replacement for line-delimited JSON in
//! high-volume log and event pipelines. Files are concatenations of framed
//! records; repeated strings and object keys are dictionary-encoded, and any
//! record is independently parseable given the dictionary state established
//! by the records before it.
//!
//! This crate is the stream codec:
//! - `varint` - LEB128/ZigZag variable-width integers
//! - `source` - buffered byte source with bounded seek-back, pin, and scan
//! - `dictionary` - append-only string table with reset epochs
//! - `value` - pull parser dispatching typed events to a [`ValueHandler`]
//! - `record` - record framing and header/dict/value demultiplexing
//! - `encoder` - dictionary-aware record writer with an intern cache
//! - `json` - JSON rendering of decoded events
//! - `grep` - pattern matching with context emission and bisect mode
//! - `tail` - record-boundary resync and follow support
//!
//! # Design Principles
//!
//! - **Static dispatch**: parsers are generic over their handlers; no
//!   per-event allocation in the decode path
//! - **Bounded rewind**: the byte source retains enough history (and honors
//!   pins) that grep can re-emit matched records without re-reading the file
//! - **Synchronous**: one decode or encode session runs on one thread; the
//!   only suspension point is a blocking read

mod dictionary;
mod encoder;
mod error;
mod grep;
mod json;
mod marker;
mod record;
mod source;
mod tail;
mod value;
pub mod varint;

pub use dictionary::Dictionary;
pub use encoder::{Encoder, EncoderConfig, EncoderStats, FieldWriter, InternHint};
pub use error::AuError;
pub use grep::{bisect, grep, GrepHandler, GrepOutcome, Pattern, StrPattern};
pub use json::JsonRecordHandler;
pub use marker::{record_tag, value_tag, FORMAT_VERSION, RECORD_TERMINATOR};
pub use record::{RecordHandler, RecordParser};
pub use source::{
    open_input, BufferedSource, ByteSource, FileSource, InputSource, MemSource, RawSource,
    SourceConfig, StdinSource,
};
pub use tail::{follow, seek_sync, sync, FollowOptions};
pub use value::{ValueHandler, ValueParser};

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, AuError>;

/// Default working-buffer chunk: allocation unit and linear growth step (256 KiB)
pub const DEFAULT_BUFFER_CHUNK: usize = 256 * 1024;

/// Minimum consumed history retained in the buffer for seek-back (1 KiB)
pub const MIN_HISTORY: usize = 1024;

/// Maximum nesting depth of arrays/objects accepted by the value parser
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Reference count at which an auto-interned string is promoted to the dictionary
pub const DEFAULT_INTERN_THRESHOLD: usize = 100;

/// Soft cap on combined intern-cache + dictionary entries before a dict clear
pub const DEFAULT_DICT_SOFT_CAP: usize = 250_000;

// Test modules - only compiled during testing
#[cfg(test)]
mod test_util;

#[cfg(test)]
mod dictionary_test;
#[cfg(test)]
mod encoder_test;
#[cfg(test)]
mod grep_test;

//! Wire-format tag bytes
//!
//! An au file is a concatenation of framed records, each starting with a
//! one-byte tag and ending with the two-byte terminator `E` `\n`. The
//! terminator doubles as the structural needle tail/resync scans for.
//!
//! ```text
//! H <version:varuint> <metadata: varuint len + bytes>            E \n
//! C                                                              E \n
//! A <backoff:varuint> <count:varuint> (<len:varuint> <bytes>)*   E \n
//! V <backoff:varuint> <len:varuint> <value payload>              E \n
//! ```

/// Format version emitted in headers and accepted by the decoder
pub const FORMAT_VERSION: u64 = 1;

/// Two-byte record terminator; also the resync scan needle
pub const RECORD_TERMINATOR: &[u8; 2] = b"E\n";

/// Record framing tags
pub mod record_tag {
    /// Version header with format metadata
    pub const HEADER: u8 = b'H';
    /// Dictionary clear: starts a new dictionary epoch
    pub const DICT_CLEAR: u8 = b'C';
    /// Dictionary add: appends strings to the current epoch
    pub const DICT_ADD: u8 = b'A';
    /// Value record: one value payload
    pub const VALUE: u8 = b'V';
    /// First byte of the record terminator
    pub const END: u8 = b'E';
}

/// Value payload tags
pub mod value_tag {
    pub const NULL: u8 = b'N';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    /// ZigZag varint signed integer
    pub const INT: u8 = b'I';
    /// Varuint unsigned integer
    pub const UINT: u8 = b'U';
    /// IEEE-754 double, 8 bytes little-endian
    pub const DOUBLE: u8 = b'D';
    /// ZigZag varint nanoseconds since the Unix epoch
    pub const TIME: u8 = b't';
    /// Varuint length + raw bytes, inline
    pub const STRING: u8 = b'S';
    /// Varuint index into the current dictionary epoch
    pub const DICT_REF: u8 = b'X';
    pub const ARRAY_START: u8 = b'[';
    pub const ARRAY_END: u8 = b']';
    pub const OBJECT_START: u8 = b'{';
    pub const OBJECT_END: u8 = b'}';
}

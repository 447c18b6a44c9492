//! Record-boundary resync and follow support
//!
//! After an arbitrary seek (a bisect probe, or the end of a growing file)
//! the decoder must find the next record boundary *and* reconstruct the
//! dictionary state that governs it. Records make this possible: every
//! dict-add and value record carries a back-offset naming the dict event it
//! extends, so the chain can be walked backward to the epoch's dict-clear
//! and replayed forward.
//!
//! [`seek_sync`] scans for the record terminator, treats the byte after it
//! as a candidate boundary, and validates the candidate by rebuilding the
//! dictionary along its event chain. A candidate that fails to parse
//! advances the scan by one byte; the search gives up after a bounded
//! window.

use std::io::Write;

use crate::dictionary::Dictionary;
use crate::json::JsonRecordHandler;
use crate::marker::{record_tag, RECORD_TERMINATOR};
use crate::record::{RecordParser, SkipValueHandler};
use crate::source::ByteSource;
use crate::varint;
use crate::{AuError, Result};

/// How far past the seek target the boundary scan will look
const SYNC_WINDOW: u64 = 64 * 1024;

/// Options for [`follow`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowOptions {
    /// Emit up to this many bytes of existing records before following
    pub lookback: u64,
}

/// Seek to `pos`, then resync to the next record boundary at or after it
///
/// On success the source is positioned at the boundary and the dictionary
/// reflects the stream state governing it. Fails with `ResyncFailed` when
/// no boundary validates within the scan window.
pub fn seek_sync<S: ByteSource>(
    source: &mut S,
    dictionary: &mut Dictionary,
    pos: u64,
) -> Result<()> {
    source.seek(pos)?;
    sync(source, dictionary)
}

/// Resync to the next record boundary at or after the current position
pub fn sync<S: ByteSource>(source: &mut S, dictionary: &mut Dictionary) -> Result<()> {
    let scan_start = source.pos();

    // The seek target itself may already be a boundary (start of file, or a
    // repeated sync); trying it first also makes sync idempotent.
    let mut candidate = scan_start;
    let mut next_scan_from = scan_start;
    loop {
        match establish(source, dictionary, candidate) {
            Ok(()) => {
                source.seek(candidate)?;
                return Ok(());
            }
            Err(e) if e.is_recoverable() => {}
            Err(e) => return Err(e),
        }

        match source.seek(next_scan_from) {
            Ok(()) => {}
            Err(AuError::UnexpectedEof { .. }) => {
                return Err(AuError::ResyncFailed {
                    pos: next_scan_from,
                })
            }
            Err(e) => return Err(e),
        }
        if !source.scan_to(RECORD_TERMINATOR)? {
            return Err(AuError::ResyncFailed { pos: source.pos() });
        }
        let found = source.pos();
        if found - scan_start > SYNC_WINDOW {
            return Err(AuError::ResyncFailed { pos: found });
        }
        candidate = found + RECORD_TERMINATOR.len() as u64;
        next_scan_from = found + 1;
    }
}

/// Validate `candidate` as a record boundary and rebuild dictionary state
///
/// Recoverable errors mean "not a boundary, keep scanning".
fn establish<S: ByteSource>(
    source: &mut S,
    dictionary: &mut Dictionary,
    candidate: u64,
) -> Result<()> {
    source.seek(candidate)?;
    let tag = source
        .peek()?
        .ok_or_else(|| AuError::eof(candidate, "no record at candidate boundary"))?;
    match tag {
        record_tag::HEADER | record_tag::DICT_CLEAR => {
            // Self-establishing records; verify they parse. Any stale
            // dictionary state is gone either way.
            dictionary.reset();
            let mut skip = SkipValueHandler;
            RecordParser::new(source, dictionary, &mut skip).parse_record()?;
            Ok(())
        }
        record_tag::DICT_ADD | record_tag::VALUE => {
            source.next()?;
            let backoff = varint::read_u64(source)?;
            let governing = candidate.checked_sub(backoff).ok_or_else(|| {
                AuError::malformed(candidate, "back-offset larger than stream position")
            })?;
            replay_chain(source, dictionary, governing)?;

            // Framing check on the candidate itself before we commit.
            source.seek(candidate)?;
            let mut skip = SkipValueHandler;
            RecordParser::new(source, dictionary, &mut skip).parse_record()?;
            Ok(())
        }
        other => Err(AuError::malformed(
            candidate,
            format!("unknown record tag 0x{other:02x}"),
        )),
    }
}

/// Walk the dict event chain backward from `governing` to its clear, then
/// replay the events forward into `dictionary`
fn replay_chain<S: ByteSource>(
    source: &mut S,
    dictionary: &mut Dictionary,
    governing: u64,
) -> Result<()> {
    let mut chain = Vec::new();
    let mut at = governing;
    loop {
        source.seek(at)?;
        let tag = source
            .next()?
            .ok_or_else(|| AuError::eof(at, "dict event chain points past end of data"))?;
        match tag {
            record_tag::DICT_CLEAR => {
                chain.push(at);
                break;
            }
            record_tag::DICT_ADD => {
                chain.push(at);
                let backoff = varint::read_u64(source)?;
                let prev = at.checked_sub(backoff).ok_or_else(|| {
                    AuError::malformed(at, "back-offset larger than stream position")
                })?;
                if prev >= at {
                    return Err(AuError::malformed(at, "dict event chain does not descend"));
                }
                at = prev;
            }
            other => {
                return Err(AuError::dict_inconsistent(
                    at,
                    format!("dict event chain hit record tag 0x{other:02x}"),
                ))
            }
        }
    }

    tracing::debug!(governing, events = chain.len(), "replaying dict event chain");
    dictionary.reset();
    let mut skip = SkipValueHandler;
    for &pos in chain.iter().rev() {
        source.seek(pos)?;
        RecordParser::new(source, dictionary, &mut skip).parse_record()?;
    }
    Ok(())
}

/// Follow a growing stream, emitting value records as JSON lines
///
/// The source should be opened in `wait_for_data` mode; EOF then only
/// surfaces when its interrupt flag is raised. Damaged regions (torn
/// writes) are skipped by resyncing.
pub fn follow<S: ByteSource, W: Write>(
    source: &mut S,
    dictionary: &mut Dictionary,
    out: &mut W,
    options: FollowOptions,
) -> Result<()> {
    let end = source.end_pos()?;
    let target = end.saturating_sub(options.lookback + RECORD_TERMINATOR.len() as u64);
    seek_sync(source, dictionary, target)?;

    let mut json = JsonRecordHandler::new(&mut *out);
    loop {
        match RecordParser::new(source, dictionary, &mut json).parse_until_value() {
            Ok(true) => {
                // Make the record visible before blocking on the next one.
                json.flush()?;
            }
            Ok(false) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(source = source.name(), error = %e, "parse damage, resyncing");
                match sync(source, dictionary) {
                    Ok(()) => {}
                    Err(AuError::ResyncFailed { pos }) => {
                        // Resume scanning from the next byte.
                        tracing::warn!(pos, "resync window exhausted, continuing scan");
                        source.skip(1)?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

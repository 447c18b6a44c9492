//! Decoder-side string dictionary
//!
//! An au stream dictionary-encodes repeated strings: dict-add records append
//! entries, dict-clear records start a fresh epoch, and value payloads refer
//! to entries by index. Indices are stable across appends and invalidated by
//! a clear.
//!
//! Every dict event (the clear plus each add) is remembered by its absolute
//! stream position. Back-offset validation checks membership in that set,
//! and re-parsing a record during a grep context rewind recognizes events it
//! has already applied instead of appending twice.
//!
//! A bounded number of past epochs is retained so a rewind that crosses a
//! dict-clear can still resolve references from records encoded before the
//! clear: [`Dictionary::activate_event`] selects which retained epoch
//! subsequent lookups read from.

use std::collections::VecDeque;

/// Past epochs kept around for rewinds across dict-clears
const RETAINED_EPOCHS: usize = 32;

/// One dictionary entry plus the position of the dict event that added it
#[derive(Debug)]
struct Entry {
    value: String,
    added_at: u64,
}

/// One dict-clear-to-dict-clear span of the stream
#[derive(Debug, Default)]
struct Epoch {
    entries: Vec<Entry>,
    /// Positions of applied dict events, ascending; the first is the
    /// epoch's clear (or the first event replayed by resync).
    event_positions: Vec<u64>,
}

/// Append-only string table with reset epochs
#[derive(Debug, Default)]
pub struct Dictionary {
    epochs: VecDeque<Epoch>,
    /// Epoch index lookups read from; selected by [`Dictionary::activate_event`]
    active: usize,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch at the clear record's position
    ///
    /// All previously issued indices are invalid from here on; the outgoing
    /// epoch is retained (up to a bound) for rewinds.
    pub fn clear(&mut self, pos: u64) {
        if self.epochs.len() == RETAINED_EPOCHS {
            self.epochs.pop_front();
        }
        let mut epoch = Epoch::default();
        epoch.event_positions.push(pos);
        self.epochs.push_back(epoch);
        self.active = self.epochs.len() - 1;
    }

    /// Forget all state, including the event history
    ///
    /// Used by resync before replaying a dict event chain; unlike
    /// [`Dictionary::clear`] this does not record an event.
    pub fn reset(&mut self) {
        self.epochs.clear();
        self.active = 0;
    }

    /// Record a dict-add event; subsequent [`Dictionary::append`] calls
    /// attribute entries to it
    pub fn begin_add(&mut self, pos: u64) {
        if let Some(epoch) = self.epochs.back_mut() {
            epoch.event_positions.push(pos);
        }
    }

    /// Append an entry to the newest epoch, returning its index
    pub fn append(&mut self, value: String) -> usize {
        let added_at = self.last_event_pos().unwrap_or(0);
        match self.epochs.back_mut() {
            Some(epoch) => {
                epoch.entries.push(Entry { value, added_at });
                epoch.entries.len() - 1
            }
            None => 0,
        }
    }

    /// Borrow the entry at `idx` in the active epoch
    #[inline]
    pub fn at(&self, idx: usize) -> Option<&str> {
        self.epochs
            .get(self.active)
            .and_then(|e| e.entries.get(idx))
            .map(|e| e.value.as_str())
    }

    /// Position of the dict event that added entry `idx` (active epoch)
    #[inline]
    pub fn added_at(&self, idx: usize) -> Option<u64> {
        self.epochs
            .get(self.active)
            .and_then(|e| e.entries.get(idx))
            .map(|e| e.added_at)
    }

    /// Number of entries in the active epoch
    #[inline]
    pub fn len(&self) -> usize {
        self.epochs.get(self.active).map_or(0, |e| e.entries.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the most recent dict event in the newest epoch
    #[inline]
    pub fn last_event_pos(&self) -> Option<u64> {
        self.epochs
            .back()
            .and_then(|e| e.event_positions.last().copied())
    }

    /// Whether a dict event at `pos` was applied in any retained epoch
    pub fn is_applied_event(&self, pos: u64) -> bool {
        self.epochs
            .iter()
            .any(|e| e.event_positions.binary_search(&pos).is_ok())
    }

    /// Select the retained epoch containing the dict event at `pos` for
    /// subsequent lookups; false if no retained epoch has it
    pub fn activate_event(&mut self, pos: u64) -> bool {
        for (i, epoch) in self.epochs.iter().enumerate().rev() {
            if epoch.event_positions.binary_search(&pos).is_ok() {
                self.active = i;
                return true;
            }
        }
        false
    }

    /// Whether any dict event has been seen yet
    #[inline]
    pub fn has_events(&self) -> bool {
        self.epochs
            .iter()
            .any(|e| !e.event_positions.is_empty())
    }
}

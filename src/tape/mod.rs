//! The looper tape: a bounded ledger of recorded notes.
//!
//! Notes live in a fixed pool of slots. Two circular orderings thread through
//! the pool, one by note-on position and one by note-off position, and
//! playback walks both from their heads as the loop position advances.
//! Independently, the ring remembers the order notes were recorded in and
//! decides which note to evict when every slot is taken.
//!
//! # Held notes
//! A note whose off has not been recorded by the time playback comes back
//! around to its on position has been held for a whole loop. It is not
//! retriggered; instead its off is placed at its own on position, so it
//! closes exactly one loop later.
//!
//! # Access
//! The tape is a plain value mutated through `&mut self`. Whoever owns it has
//! to make sure record, remove and advance calls never interleave, e.g. by
//! funnelling all of them through one thread (see [`crate::engine`]).

mod list;
mod pool;
mod ring;


use tracing::debug;

use crate::position::{passed, Position};
use list::NoteLists;
use pool::{Order, Slot, SlotIndex};
use ring::{Claim, Ring};

pub use pool::NoteHandle;

/// Slot count used by [`Tape`] unless another capacity is given.
pub const DEFAULT_CAPACITY: usize = 32;

/// Receiver of the notes a tape plays or silences.
///
/// Calls happen synchronously inside the tape operation that discovers the
/// transition. Dispatch is best-effort: the tape neither retries nor buffers.
pub trait NoteSink {
    fn note_on(&mut self, pitch: u8, velocity: u8);
    fn note_off(&mut self, pitch: u8);
}

/// A note dispatch, as captured by the `Vec` sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    On { pitch: u8, velocity: u8 },
    Off { pitch: u8 },
}

impl NoteSink for Vec<NoteEvent> {
    fn note_on(&mut self, pitch: u8, velocity: u8) {
        self.push(NoteEvent::On { pitch, velocity });
    }

    fn note_off(&mut self, pitch: u8) {
        self.push(NoteEvent::Off { pitch });
    }
}

/// A missing sink drops every note.
impl<S: NoteSink> NoteSink for Option<S> {
    fn note_on(&mut self, pitch: u8, velocity: u8) {
        if let Some(sink) = self {
            sink.note_on(pitch, velocity);
        }
    }

    fn note_off(&mut self, pitch: u8) {
        if let Some(sink) = self {
            sink.note_off(pitch);
        }
    }
}

/// Read-only view of a note on the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedNote {
    pub pitch: u8,
    pub velocity: u8,
    pub on_pos: Position,
    /// `None` while the note is still held.
    pub off_pos: Option<Position>,
}

impl RecordedNote {
    fn from_slot(slot: &Slot) -> Self {
        Self {
            pitch: slot.pitch,
            velocity: slot.velocity,
            on_pos: slot.on_pos,
            off_pos: slot.has_off().then_some(slot.off_pos),
        }
    }

    /// Whether playback at `pos` is inside this note's sounding interval.
    pub fn is_sounding_at(&self, pos: Position) -> bool {
        self.off_pos
            .is_some_and(|off_pos| passed(pos, self.on_pos, off_pos))
    }
}

/// Bounded note ledger for one looper track.
#[derive(Debug, Clone)]
pub struct Tape<const N: usize = DEFAULT_CAPACITY> {
    lists: NoteLists<N>,
    ring: Ring<N>,
}

impl<const N: usize> Tape<N> {
    pub fn new() -> Self {
        assert!(N > 0, "a tape needs at least one slot");
        Self {
            lists: NoteLists::new(),
            ring: Ring::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Notes in recording order, oldest first.
    pub fn notes(&self) -> impl Iterator<Item = RecordedNote> + '_ {
        self.ring
            .order()
            .map(|index| RecordedNote::from_slot(self.lists.slot(index)))
    }

    /// Look up the note a handle refers to, if it is still on the tape.
    pub fn note(&self, handle: NoteHandle) -> Option<RecordedNote> {
        self.lists.pool().resolve(handle).map(RecordedNote::from_slot)
    }

    /// Record a note-on at `pos`.
    ///
    /// When the tape is full the oldest note is evicted first; if playback at
    /// `pos` is inside that note, its note-off goes to `sink`.
    pub fn record_note_on<S: NoteSink>(
        &mut self,
        sink: &mut S,
        pos: Position,
        pitch: u8,
        velocity: u8,
    ) -> NoteHandle {
        let index = match self.ring.next_slot() {
            Claim::Free(index) => index,
            Claim::Evict(victim) => {
                debug!(slot = victim.get(), "tape full, evicting oldest note");
                self.release_slot(sink, pos, victim);
                victim
            }
        };

        self.lists.insert(Order::On, pos, index);
        let slot = self.lists.slot_mut(index);
        slot.pitch = pitch;
        slot.velocity = velocity;
        slot.off_pos = 0;
        slot.off_link = None;
        let generation = slot.generation;

        self.ring.claim(index);
        NoteHandle { index, generation }
    }

    /// Record the note-off for a note started by [`Tape::record_note_on`].
    ///
    /// Returns whether the caller should send the note-off. `false` means the
    /// note was held for a whole loop and playback already scheduled its off,
    /// so it keeps sounding. A handle whose note has been evicted records
    /// nothing and returns `true`: the live note is still sounding and nobody
    /// else will silence it.
    pub fn record_note_off(&mut self, pos: Position, handle: NoteHandle) -> bool {
        let Some(slot) = self.lists.pool().resolve(handle) else {
            debug!(slot = handle.index.get(), "note-off for a note no longer on tape");
            return true;
        };
        if slot.has_off() {
            return false;
        }
        self.lists.insert(Order::Off, pos, handle.index);
        true
    }

    /// Play everything due while moving from `old_pos` to `new_pos`.
    ///
    /// Offs go first, then ons. Each ordering is walked at most once around,
    /// so a jump spanning more than a loop still terminates. With `emit`
    /// unset the heads move without anything reaching `sink`.
    pub fn advance<S: NoteSink>(
        &mut self,
        sink: &mut S,
        old_pos: Position,
        new_pos: Position,
        emit: bool,
    ) {
        let mut first_seen = None;
        while let Some(next) = self.lists.peek_next(Order::Off) {
            if first_seen == Some(next) {
                break;
            }
            first_seen.get_or_insert(next);
            let slot = *self.lists.slot(next);
            if !passed(slot.off_pos, old_pos, new_pos) {
                break;
            }
            self.lists.set_head(Order::Off, Some(next));
            if emit {
                sink.note_off(slot.pitch);
            }
        }

        let mut first_seen = None;
        while let Some(next) = self.lists.peek_next(Order::On) {
            if first_seen == Some(next) {
                break;
            }
            first_seen.get_or_insert(next);
            let slot = *self.lists.slot(next);
            if !passed(slot.on_pos, old_pos, new_pos) {
                break;
            }
            self.lists.set_head(Order::On, Some(next));

            if !slot.has_off() {
                // Still held after a full loop: no retrigger, close it one
                // loop from now
                self.lists.insert(Order::Off, slot.on_pos, next);
                continue;
            }
            if emit {
                sink.note_on(slot.pitch, slot.velocity);
            }
        }
    }

    /// Realign both heads so the earliest entry of each ordering is next.
    ///
    /// Used when playback restarts from the top or jumps discontinuously.
    pub fn reset_heads(&mut self) {
        self.lists.reset_head(Order::On);
        self.lists.reset_head(Order::Off);
    }

    pub fn remove_oldest_note<S: NoteSink>(&mut self, sink: &mut S, current_pos: Position) {
        if let Some(index) = self.ring.oldest() {
            self.release_slot(sink, current_pos, index);
        }
    }

    pub fn remove_newest_note<S: NoteSink>(&mut self, sink: &mut S, current_pos: Position) {
        if let Some(index) = self.ring.newest() {
            self.release_slot(sink, current_pos, index);
        }
    }

    /// Remove one particular note. Returns `false` if it was already gone.
    pub fn remove_note<S: NoteSink>(
        &mut self,
        sink: &mut S,
        current_pos: Position,
        handle: NoteHandle,
    ) -> bool {
        if self.lists.pool().resolve(handle).is_none() {
            return false;
        }
        self.release_slot(sink, current_pos, handle.index);
        true
    }

    /// Drop every note. Nothing is sent to any sink.
    pub fn remove_all(&mut self) {
        self.lists.clear();
        self.ring = Ring::new();
    }

    /// Unlink and clear a slot, silencing it first if it is sounding.
    fn release_slot<S: NoteSink>(
        &mut self,
        sink: &mut S,
        current_pos: Position,
        index: SlotIndex,
    ) {
        let slot = *self.lists.slot(index);
        if !slot.is_occupied() {
            return;
        }
        if RecordedNote::from_slot(&slot).is_sounding_at(current_pos) {
            sink.note_off(slot.pitch);
        }

        self.lists.unlink(Order::On, index);
        if slot.has_off() {
            self.lists.unlink(Order::Off, index);
        }
        self.lists.slot_mut(index).release();
        self.ring.release(index);
    }
}

impl<const N: usize> Default for Tape<N> {
    fn default() -> Self {
        Self::new()
    }
}

//! Fixed-capacity note slot storage.

use crate::position::Position;

/// Index of a slot in a tape's pool.
///
/// Only the pool hands these out, so an index is always in range for the
/// tape that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Handle to a recorded note, returned by `Tape::record_note_on`.
///
/// Carries the slot's generation at the time the note was recorded. Once the
/// slot is evicted or removed the generation moves on and the handle stops
/// resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteHandle {
    pub(crate) index: SlotIndex,
    pub(crate) generation: u32,
}

/// Which of the two temporal orderings a link or head belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Order {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Slot {
    pub pitch: u8,
    pub velocity: u8,
    pub on_pos: Position,
    pub off_pos: Position,
    pub on_link: Option<SlotIndex>,
    pub off_link: Option<SlotIndex>,
    pub generation: u32,
}

impl Slot {
    /// Every occupied slot is linked into the on-ordering.
    pub fn is_occupied(&self) -> bool {
        self.on_link.is_some()
    }

    /// Whether the note-off has been recorded or synthesized.
    pub fn has_off(&self) -> bool {
        self.off_link.is_some()
    }

    pub fn pos(&self, order: Order) -> Position {
        match order {
            Order::On => self.on_pos,
            Order::Off => self.off_pos,
        }
    }

    pub fn set_pos(&mut self, order: Order, pos: Position) {
        match order {
            Order::On => self.on_pos = pos,
            Order::Off => self.off_pos = pos,
        }
    }

    pub fn link(&self, order: Order) -> Option<SlotIndex> {
        match order {
            Order::On => self.on_link,
            Order::Off => self.off_link,
        }
    }

    pub fn set_link(&mut self, order: Order, link: Option<SlotIndex>) {
        match order {
            Order::On => self.on_link = link,
            Order::Off => self.off_link = link,
        }
    }

    /// Clear the slot and invalidate outstanding handles to it.
    pub fn release(&mut self) {
        *self = Slot {
            generation: self.generation.wrapping_add(1),
            ..Slot::default()
        };
    }
}

/// The backing array shared by both orderings.
#[derive(Debug, Clone)]
pub(crate) struct Pool<const N: usize> {
    slots: [Slot; N],
}

impl<const N: usize> Pool<N> {
    pub fn new() -> Self {
        Self {
            slots: [Slot::default(); N],
        }
    }

    pub fn get(&self, index: SlotIndex) -> &Slot {
        &self.slots[index.0]
    }

    pub fn get_mut(&mut self, index: SlotIndex) -> &mut Slot {
        &mut self.slots[index.0]
    }

    /// Resolve a handle, or `None` if its slot has since been released.
    pub fn resolve(&self, handle: NoteHandle) -> Option<&Slot> {
        let slot = self.slots.get(handle.index.0)?;
        (slot.generation == handle.generation && slot.is_occupied()).then_some(slot)
    }

    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.release();
        }
    }
}

//! The two circular, singly linked orderings over the slot pool.
//!
//! Both orderings live inside the same [`Pool`]: each slot carries one link
//! per ordering, and each ordering keeps its own head. The head is the entry
//! playback passed most recently, so the entry after it is the next one due.
//!
//! Insertion always goes right after the head and never re-sorts. Callers
//! keep the ordering chronological by recording in forward time.

use super::pool::{Order, Pool, Slot, SlotIndex};
use crate::position::Position;

#[derive(Debug, Clone)]
pub(crate) struct NoteLists<const N: usize> {
    pool: Pool<N>,
    on_head: Option<SlotIndex>,
    off_head: Option<SlotIndex>,
}

impl<const N: usize> NoteLists<N> {
    pub fn new() -> Self {
        Self {
            pool: Pool::new(),
            on_head: None,
            off_head: None,
        }
    }

    pub fn pool(&self) -> &Pool<N> {
        &self.pool
    }

    pub fn slot(&self, index: SlotIndex) -> &Slot {
        self.pool.get(index)
    }

    pub fn slot_mut(&mut self, index: SlotIndex) -> &mut Slot {
        self.pool.get_mut(index)
    }

    pub fn head(&self, order: Order) -> Option<SlotIndex> {
        match order {
            Order::On => self.on_head,
            Order::Off => self.off_head,
        }
    }

    pub fn set_head(&mut self, order: Order, head: Option<SlotIndex>) {
        match order {
            Order::On => self.on_head = head,
            Order::Off => self.off_head = head,
        }
    }

    /// The entry after the head, i.e. the next one playback will reach.
    pub fn peek_next(&self, order: Order) -> Option<SlotIndex> {
        let head = self.head(order)?;
        self.slot(head).link(order)
    }

    /// Link `index` in right after the head and make it the new head.
    pub fn insert(&mut self, order: Order, pos: Position, index: SlotIndex) {
        let next = match self.head(order) {
            Some(head) => {
                let head_slot = self.pool.get_mut(head);
                let next = head_slot.link(order);
                head_slot.set_link(order, Some(index));
                next
            }
            // Sole entry links to itself
            None => Some(index),
        };
        let slot = self.pool.get_mut(index);
        slot.set_pos(order, pos);
        slot.set_link(order, next);
        self.set_head(order, Some(index));
    }

    /// Detach `index` from one ordering.
    ///
    /// Without back links the predecessor has to be found by walking the
    /// cycle, so this is linear in the ordering's length.
    pub fn unlink(&mut self, order: Order, index: SlotIndex) {
        let Some(prev) = self.find_prev(order, index) else {
            return;
        };
        let next = self.slot(index).link(order);
        self.slot_mut(prev).set_link(order, next);
        self.slot_mut(index).set_link(order, None);

        if prev == index {
            self.set_head(order, None);
        } else if self.head(order) == Some(index) {
            self.set_head(order, Some(prev));
        }
    }

    fn find_prev(&self, order: Order, index: SlotIndex) -> Option<SlotIndex> {
        let mut prev = index;
        for _ in 0..N {
            let next = self.slot(prev).link(order)?;
            if next == index {
                return Some(prev);
            }
            prev = next;
        }
        debug_assert!(false, "slot {:?} is not on its own cycle", index);
        None
    }

    /// Move the head onto the latest entry so the earliest one is next.
    ///
    /// Walks forward while the following entry sits strictly later than the
    /// head and stops at the first step backwards, which is where the
    /// ordering wraps.
    pub fn reset_head(&mut self, order: Order) {
        for _ in 0..N {
            let (Some(head), Some(next)) = (self.head(order), self.peek_next(order)) else {
                return;
            };
            if self.slot(head).pos(order) >= self.slot(next).pos(order) {
                return;
            }
            self.set_head(order, Some(next));
        }
    }

    pub fn clear(&mut self) {
        self.pool.release_all();
        self.on_head = None;
        self.off_head = None;
    }
}

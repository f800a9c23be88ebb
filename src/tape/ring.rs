//! Insertion-order bookkeeping used for capacity-bounded eviction.
//!
//! The ring knows nothing about positions. Each occupied slot carries the
//! stamp it was claimed with, so `oldest` and `newest` are the lowest and
//! highest stamps. Claims walk the pool cyclically from the newest slot to the
//! next free one; slots freed by removals are reused before anything is
//! evicted. The explicit count is what tells "empty" apart from "one note".

use super::pool::SlotIndex;

/// Where the next note goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    Free(SlotIndex),
    /// Every slot is taken; this one has to be evicted first.
    Evict(SlotIndex),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Ring<const N: usize> {
    stamps: [Option<u64>; N],
    next_stamp: u64,
    len: usize,
}

impl<const N: usize> Ring<N> {
    pub fn new() -> Self {
        Self {
            stamps: [None; N],
            next_stamp: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn oldest(&self) -> Option<SlotIndex> {
        (0..N)
            .filter(|&i| self.stamps[i].is_some())
            .min_by_key(|&i| self.stamps[i])
            .map(SlotIndex::new)
    }

    pub fn newest(&self) -> Option<SlotIndex> {
        (0..N)
            .filter(|&i| self.stamps[i].is_some())
            .max_by_key(|&i| self.stamps[i])
            .map(SlotIndex::new)
    }

    /// The slot the next note should claim.
    pub fn next_slot(&self) -> Claim {
        let start = self.newest().map_or(0, |i| i.get() + 1);
        let free = (0..N)
            .map(|k| (start + k) % N)
            .find(|&i| self.stamps[i].is_none());
        match free {
            Some(i) => Claim::Free(SlotIndex::new(i)),
            // Full, so every stamp is set
            None => Claim::Evict(SlotIndex::new(
                (1..N).fold(0, |best, i| if self.stamps[i] < self.stamps[best] { i } else { best }),
            )),
        }
    }

    pub fn claim(&mut self, index: SlotIndex) {
        if self.stamps[index.get()].replace(self.next_stamp).is_none() {
            self.len += 1;
        }
        self.next_stamp += 1;
    }

    pub fn release(&mut self, index: SlotIndex) {
        if self.stamps[index.get()].take().is_some() {
            self.len -= 1;
        }
    }

    /// Occupied slots from oldest to newest.
    pub fn order(&self) -> impl Iterator<Item = SlotIndex> {
        let mut occupied: Vec<(u64, usize)> = (0..N)
            .filter_map(|i| self.stamps[i].map(|stamp| (stamp, i)))
            .collect();
        occupied.sort_unstable();
        occupied.into_iter().map(|(_, i)| SlotIndex::new(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill<const N: usize>(ring: &mut Ring<N>, count: usize) {
        for _ in 0..count {
            match ring.next_slot() {
                Claim::Free(index) => ring.claim(index),
                Claim::Evict(index) => {
                    ring.release(index);
                    ring.claim(index);
                }
            }
        }
    }

    fn order<const N: usize>(ring: &Ring<N>) -> Vec<usize> {
        ring.order().map(|i| i.get()).collect()
    }

    #[test]
    fn test_empty_ring() {
        let ring: Ring<3> = Ring::new();
        assert!(ring.is_empty());
        assert_eq!(ring.oldest(), None);
        assert_eq!(ring.newest(), None);
        assert_eq!(ring.next_slot(), Claim::Free(SlotIndex::new(0)));
        assert_eq!(ring.order().count(), 0);
    }

    #[test]
    fn test_evicts_only_when_full() {
        let mut ring: Ring<3> = Ring::new();
        fill(&mut ring, 3);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.next_slot(), Claim::Evict(SlotIndex::new(0)));

        fill(&mut ring, 1);
        assert_eq!(ring.oldest(), Some(SlotIndex::new(1)));
        assert_eq!(ring.newest(), Some(SlotIndex::new(0)));
        assert_eq!(order(&ring), vec![1, 2, 0]);
    }

    #[test]
    fn test_freed_slot_is_reused_before_eviction() {
        let mut ring: Ring<4> = Ring::new();
        fill(&mut ring, 4);
        ring.release(SlotIndex::new(1));
        assert_eq!(ring.len(), 3);

        assert_eq!(ring.next_slot(), Claim::Free(SlotIndex::new(1)));
        fill(&mut ring, 1);
        assert_eq!(order(&ring), vec![0, 2, 3, 1]);
        assert_eq!(ring.next_slot(), Claim::Evict(SlotIndex::new(0)));
    }

    #[test]
    fn test_claims_continue_after_newest() {
        let mut ring: Ring<4> = Ring::new();
        fill(&mut ring, 2);
        ring.release(SlotIndex::new(0));
        assert_eq!(ring.next_slot(), Claim::Free(SlotIndex::new(2)));
    }

    #[test]
    fn test_release_last_empties() {
        let mut ring: Ring<4> = Ring::new();
        fill(&mut ring, 2);
        ring.release(SlotIndex::new(1));
        ring.release(SlotIndex::new(0));
        ring.release(SlotIndex::new(0));
        assert!(ring.is_empty());
        assert_eq!(ring.oldest(), None);
    }
}

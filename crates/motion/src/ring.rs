//! Fixed-capacity SPSC ring of motion blocks.
//!
//! One producer (the planner) appends at `head`; one consumer (the step
//! interrupt) executes at `tail`. `head == tail` means empty and
//! `next_head == tail` means full, so one slot is always unoccupied.
//!
//! The planner additionally re-visits already-queued blocks in both
//! directions while re-planning. That is safe under the claim discipline:
//! the consumer marks the tail block as executing via [`BlockRing::claim_tail`]
//! before tracing it, and re-planning never touches a claimed slot. The one
//! sanctioned exception is the feed-hold re-initialization, which rewrites
//! the claimed tail through [`BlockRing::tail_mut`] while the step timer is
//! idle.

use crate::block::Block;

/// Number of ring slots. One slot is a sentinel, so 17 blocks are usable.
pub const RING_CAPACITY: usize = 18;

#[derive(Debug)]
pub struct BlockRing {
    slots: [Block; RING_CAPACITY],
    head: usize,
    next_head: usize,
    tail: usize,
    /// Tail slot is checked out by the consumer.
    executing: bool,
}

impl Default for BlockRing {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRing {
    pub fn new() -> Self {
        Self {
            slots: [Block::default(); RING_CAPACITY],
            head: 0,
            next_head: 1,
            tail: 0,
            executing: false,
        }
    }

    /// Drop every queued block and the execution claim.
    pub fn clear(&mut self) {
        self.head = 0;
        self.next_head = 1;
        self.tail = 0;
        self.executing = false;
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.next_head == self.tail
    }

    /// Number of queued blocks.
    pub fn len(&self) -> usize {
        (self.head + RING_CAPACITY - self.tail) % RING_CAPACITY
    }

    #[inline]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % RING_CAPACITY
    }

    #[inline]
    pub fn prev_index(&self, index: usize) -> usize {
        (index + RING_CAPACITY - 1) % RING_CAPACITY
    }

    pub fn tail_index(&self) -> usize {
        self.tail
    }

    /// Index of the most recently committed block, if any.
    pub fn newest_index(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.prev_index(self.head))
        }
    }

    pub fn block(&self, index: usize) -> &Block {
        &self.slots[index]
    }

    pub fn block_mut(&mut self, index: usize) -> &mut Block {
        &mut self.slots[index]
    }

    // --- Producer side ---

    /// Writable slot at the next free position, or `None` when the ring is
    /// full. The slot is not visible to the consumer until
    /// [`BlockRing::commit_head`].
    pub fn prepare_head(&mut self) -> Option<&mut Block> {
        if self.is_full() {
            None
        } else {
            Some(&mut self.slots[self.head])
        }
    }

    /// Publish the slot written after [`BlockRing::prepare_head`].
    pub fn commit_head(&mut self) {
        debug_assert!(!self.is_full());
        self.head = self.next_head;
        self.next_head = self.next_index(self.next_head);
    }

    // --- Consumer side ---

    /// Borrow the block at `tail`, or `None` when the ring is empty.
    pub fn tail(&self) -> Option<&Block> {
        if self.is_empty() {
            None
        } else {
            Some(&self.slots[self.tail])
        }
    }

    /// Mutable borrow of the tail block. Only legal while the consumer is
    /// quiescent (feed-hold re-initialization).
    pub fn tail_mut(&mut self) -> Option<&mut Block> {
        if self.is_empty() {
            None
        } else {
            Some(&mut self.slots[self.tail])
        }
    }

    /// Mark the tail block as executing and borrow it. Re-planning excludes
    /// the claimed slot from then on.
    pub fn claim_tail(&mut self) -> Option<&Block> {
        if self.is_empty() {
            None
        } else {
            self.executing = true;
            Some(&self.slots[self.tail])
        }
    }

    /// Whether the tail block is checked out by the consumer.
    pub fn tail_claimed(&self) -> bool {
        self.executing && !self.is_empty()
    }

    /// Release the finished tail block and advance. Consumer-only.
    pub fn discard_tail(&mut self) {
        self.executing = false;
        if !self.is_empty() {
            self.tail = self.next_index(self.tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with_count(step_event_count: u32) -> Block {
        Block {
            step_event_count,
            ..Block::default()
        }
    }

    fn push(ring: &mut BlockRing, count: u32) -> bool {
        match ring.prepare_head() {
            Some(slot) => {
                *slot = block_with_count(count);
                ring.commit_head();
                true
            }
            None => false,
        }
    }

    #[test]
    fn starts_empty() {
        let ring = BlockRing::new();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert!(ring.tail().is_none());
    }

    #[test]
    fn fills_to_capacity_minus_one() {
        let mut ring = BlockRing::new();
        for i in 0..RING_CAPACITY - 1 {
            assert!(push(&mut ring, i as u32), "slot {i} should be free");
        }
        assert!(ring.is_full());
        assert!(ring.prepare_head().is_none());
        assert_eq!(ring.len(), RING_CAPACITY - 1);
    }

    #[test]
    fn fifo_order_survives_wraparound() {
        let mut ring = BlockRing::new();
        // Drive head/tail several times around the ring.
        let mut expected = 0u32;
        let mut produced = 0u32;
        for _ in 0..RING_CAPACITY * 3 {
            while push(&mut ring, produced) {
                produced += 1;
            }
            // Drain half, in order.
            for _ in 0..RING_CAPACITY / 2 {
                let got = ring.tail().expect("non-empty").step_event_count;
                assert_eq!(got, expected);
                expected += 1;
                ring.discard_tail();
            }
        }
    }

    #[test]
    fn claim_is_released_by_discard() {
        let mut ring = BlockRing::new();
        push(&mut ring, 1);
        push(&mut ring, 2);
        assert!(!ring.tail_claimed());
        ring.claim_tail().expect("tail exists");
        assert!(ring.tail_claimed());
        ring.discard_tail();
        assert!(!ring.tail_claimed());
        assert_eq!(ring.tail().unwrap().step_event_count, 2);
    }

    #[test]
    fn clear_resets_claim() {
        let mut ring = BlockRing::new();
        push(&mut ring, 1);
        ring.claim_tail();
        ring.clear();
        assert!(ring.is_empty());
        assert!(!ring.tail_claimed());
    }
}

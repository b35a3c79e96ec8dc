//! Frame-ordered queue of pending resumptions.
//!
//! A min-heap keyed by `(target_frame, insertion order)`: resumptions pop in
//! target-frame order, and entries sharing a frame pop FIFO, so a drain pass
//! is deterministic and reproducible.

use crate::scheduler::suspend::ResumeFn;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One queued resumption.
pub(crate) struct PendingEntry {
    /// Frame at which the resumption becomes due.
    pub(crate) target_frame: u64,
    /// Insertion sequence number, used to break target-frame ties.
    seq: u64,
    /// The registered resume callback.
    pub(crate) resume: ResumeFn,
}

// Reverse ordering for min-heap (earliest target frame first); the sequence
// number keeps same-frame entries in insertion order.
impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .target_frame
            .cmp(&self.target_frame)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.target_frame == other.target_frame && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

/// Min-heap of pending resumptions.
pub(crate) struct PendingQueue {
    heap: BinaryHeap<PendingEntry>,
    next_seq: u64,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Insert a resumption due at `target_frame`.
    pub(crate) fn push(&mut self, target_frame: u64, resume: ResumeFn) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(PendingEntry {
            target_frame,
            seq,
            resume,
        });
    }

    /// Pop the earliest entry whose target frame is at or below `frame`.
    pub(crate) fn pop_due(&mut self, frame: u64) -> Option<PendingEntry> {
        if self.heap.peek().is_some_and(|e| e.target_frame <= frame) {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Pop the earliest entry regardless of its target frame.
    pub(crate) fn pop_earliest(&mut self) -> Option<PendingEntry> {
        self.heap.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}

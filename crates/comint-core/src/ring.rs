//! Fixed-capacity input history ring with circular recall.
//!
//! Slot 0 is a transient empty "staging" entry standing in for the line the
//! user has not committed yet; submitted lines sit behind it, newest first.
//! The cursor offset tracks how far back recall has moved (0 = staging).

use std::collections::VecDeque;
use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 50;

pub struct HistoryRing {
    /// Slot 0 is the staging entry; history follows, newest first.
    entries: VecDeque<String>,
    /// Maximum number of committed entries (the staging slot is extra).
    capacity: usize,
    /// Recall cursor; always a valid index into `entries`.
    offset: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        let mut entries = VecDeque::with_capacity(capacity + 1);
        entries.push_front(String::new());
        Self {
            entries,
            capacity: capacity.max(1),
            offset: 0,
        }
    }

    /// Commit a submitted line: the staging slot becomes the newest history
    /// entry and a fresh empty staging slot takes its place. Evicts the
    /// oldest entry at capacity. Callers reset recall (`pop_and_reset`)
    /// before pushing.
    pub fn push(&mut self, line: &str) {
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        self.entries[0] = line.to_string();
        self.entries.push_front(String::new());
        trace!(target: "comint::ring", "Pushed line, {} entries", self.len());
    }

    /// Move the recall cursor one entry back in time, wrapping to the
    /// staging slot past the oldest entry, and return the entry there.
    /// On an empty ring this returns the empty staging value.
    pub fn previous(&mut self) -> String {
        self.offset = (self.offset + 1) % self.entries.len();
        self.entries[self.offset].clone()
    }

    /// Move the recall cursor one entry forward in time, wrapping to the
    /// oldest entry before the staging slot, and return the entry there.
    pub fn next(&mut self) -> String {
        self.offset = if self.offset == 0 {
            self.entries.len() - 1
        } else {
            self.offset - 1
        };
        self.entries[self.offset].clone()
    }

    /// If a recall is in progress, remove the recalled entry from the ring
    /// (it is scratch state, not a committed line) and reset the cursor.
    /// Called before committing a fresh line so a superseded recall does not
    /// linger as a duplicate. Idempotent.
    pub fn pop_and_reset(&mut self) {
        if self.offset > 0 {
            self.entries.remove(self.offset);
            self.offset = 0;
        }
    }

    /// Number of committed history entries (excludes the staging slot).
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current recall cursor position (0 = staging slot).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Snapshot of all slots, staging first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ring_recall_returns_staging() {
        let mut ring = HistoryRing::new(50);
        assert_eq!(ring.previous(), "");
        assert_eq!(ring.next(), "");
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_round_trip_reverse_insertion_order() {
        let mut ring = HistoryRing::new(50);
        let lines = ["ls", "cd /tmp", "echo hi"];
        for line in lines {
            ring.push(line);
        }

        assert_eq!(ring.previous(), "echo hi");
        assert_eq!(ring.previous(), "cd /tmp");
        assert_eq!(ring.previous(), "ls");

        assert_eq!(ring.next(), "cd /tmp");
        assert_eq!(ring.next(), "echo hi");
        assert_eq!(ring.next(), "");
        assert_eq!(ring.offset(), 0);
    }

    #[test]
    fn test_recall_wraps_in_both_directions() {
        let mut ring = HistoryRing::new(50);
        ring.push("one");
        ring.push("two");

        // previous past the oldest wraps to staging
        assert_eq!(ring.previous(), "two");
        assert_eq!(ring.previous(), "one");
        assert_eq!(ring.previous(), "");
        assert_eq!(ring.previous(), "two");

        // next from staging wraps to the oldest
        let mut ring = HistoryRing::new(50);
        ring.push("one");
        ring.push("two");
        assert_eq!(ring.next(), "one");
    }

    #[test]
    fn test_eviction_at_capacity() {
        let mut ring = HistoryRing::new(3);
        for line in ["a", "b", "c", "d"] {
            ring.push(line);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.entries(), vec!["", "d", "c", "b"]);

        // the oldest entry is gone; recall never reaches "a"
        assert_eq!(ring.previous(), "d");
        assert_eq!(ring.previous(), "c");
        assert_eq!(ring.previous(), "b");
        assert_eq!(ring.previous(), "");
    }

    #[test]
    fn test_filling_to_capacity_keeps_everything() {
        let mut ring = HistoryRing::new(3);
        for line in ["a", "b", "c"] {
            ring.push(line);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.previous(), "c");
        assert_eq!(ring.previous(), "b");
        assert_eq!(ring.previous(), "a");
    }

    #[test]
    fn test_pop_and_reset_removes_recalled_entry() {
        let mut ring = HistoryRing::new(50);
        ring.push("one");
        ring.push("two");
        ring.push("three");

        ring.previous(); // "three"
        ring.previous(); // "two"
        ring.pop_and_reset();

        assert_eq!(ring.offset(), 0);
        assert_eq!(ring.entries(), vec!["", "three", "one"]);
    }

    #[test]
    fn test_pop_and_reset_is_idempotent() {
        let mut ring = HistoryRing::new(50);
        ring.push("one");
        ring.push("two");

        ring.previous();
        ring.pop_and_reset();
        let after_first = ring.entries();
        ring.pop_and_reset();
        assert_eq!(ring.entries(), after_first);
        assert_eq!(ring.offset(), 0);
    }

    #[test]
    fn test_pop_and_reset_without_recall_is_a_noop() {
        let mut ring = HistoryRing::new(50);
        ring.push("one");
        ring.pop_and_reset();
        assert_eq!(ring.entries(), vec!["", "one"]);
    }
}

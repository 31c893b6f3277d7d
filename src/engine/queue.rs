//! Recomputation work queue.
//!
//! Every unit of work is "scan tracker T at layer L from where its history
//! stands". A fresh tracker has a single seed entry, so the same task applies
//! rules to it from rule 0; a tracker with recorded history is replayed.
//!
//! ## Invariants
//!
//! - Tasks run in FIFO order, which keeps a run deterministic: trackers are
//!   queued left to right, dependents in the order they registered.
//! - A `(tracker, layer)` pair is queued at most once at a time. Queuing it
//!   again while it waits is a no-op; the pending task will see the newer
//!   state anyway.

use std::collections::{HashSet, VecDeque};

use super::graph::TrackerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Task {
    pub tracker: TrackerId,
    pub layer: usize,
}

#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    tasks: VecDeque<Task>,
    queued: HashSet<Task>,
}

impl WorkQueue {
    /// Queue `tracker` at `layer`. Returns false if it was already waiting.
    pub(crate) fn push(&mut self, tracker: TrackerId, layer: usize) -> bool {
        let task = Task { tracker, layer };
        if !self.queued.insert(task) {
            return false;
        }
        self.tasks.push_back(task);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        let task = self.tasks.pop_front()?;
        self.queued.remove(&task);
        Some(task)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
        self.queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_waiting_tasks() {
        let mut q = WorkQueue::default();
        assert!(q.push(TrackerId(1), 0));
        assert!(q.push(TrackerId(0), 0));
        assert!(!q.push(TrackerId(1), 0));
        assert!(q.push(TrackerId(1), 1));
        assert_eq!(q.len(), 3);

        assert_eq!(q.pop(), Some(Task { tracker: TrackerId(1), layer: 0 }));
        // once popped it can be queued again
        assert!(q.push(TrackerId(1), 0));
        assert_eq!(q.pop().map(|t| t.tracker), Some(TrackerId(0)));
        q.clear();
        assert_eq!(q.pop(), None);
    }
}

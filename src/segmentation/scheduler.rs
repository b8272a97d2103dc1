//! Delayed queue for pending label resolutions.
//!
//! Every entry is an immutable snapshot key; nothing here closes over session
//! state. Entries pop in `(due, sequence)` order so resolutions sharing the same
//! window come out in click order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;

/// Identifies one pending selection. Two clicks on the same label at the same
/// millisecond still get distinct keys through `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingKey {
    pub label_id: String,
    pub click_wall_ms: i64,
    pub seq: u64,
}

/// Tells the host when a deferred resolution wants to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledResolution {
    pub key: PendingKey,
    pub due_wall_ms: i64,
}

#[derive(Debug, Default)]
pub struct DeferredQueue {
    heap: BinaryHeap<Reverse<(i64, u64, PendingKey)>>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, label_id: &str, click_wall_ms: i64, due_wall_ms: i64) -> ScheduledResolution {
        let seq = self.next_seq;
        self.next_seq += 1;

        let key = PendingKey {
            label_id: label_id.to_string(),
            click_wall_ms,
            seq,
        };
        self.heap.push(Reverse((due_wall_ms, seq, key.clone())));

        ScheduledResolution { key, due_wall_ms }
    }

    /// Pops the earliest entry if it is due at `now_wall_ms`.
    pub fn pop_due(&mut self, now_wall_ms: i64) -> Option<ScheduledResolution> {
        let due = self.peek_due()?;
        if due > now_wall_ms {
            return None;
        }
        self.heap
            .pop()
            .map(|Reverse((due_wall_ms, _, key))| ScheduledResolution { key, due_wall_ms })
    }

    /// Removes everything, earliest first.
    pub fn drain(&mut self) -> Vec<ScheduledResolution> {
        let mut drained = Vec::with_capacity(self.heap.len());
        while let Some(Reverse((due_wall_ms, _, key))) = self.heap.pop() {
            drained.push(ScheduledResolution { key, due_wall_ms });
        }
        drained
    }

    pub fn peek_due(&self) -> Option<i64> {
        self.heap.peek().map(|Reverse((due, _, _))| *due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_only_entries_that_are_due() {
        let mut queue = DeferredQueue::new();
        queue.schedule("braking", 1_000, 6_000);
        queue.schedule("acceleration", 2_000, 7_000);

        assert!(queue.pop_due(5_999).is_none());
        let first = queue.pop_due(6_500).unwrap();
        assert_eq!(first.key.label_id, "braking");
        assert!(queue.pop_due(6_500).is_none());
        assert_eq!(queue.peek_due(), Some(7_000));
    }

    #[test]
    fn equal_deadlines_resolve_in_scheduling_order() {
        let mut queue = DeferredQueue::new();
        let a = queue.schedule("left-turn", 1_000, 6_000);
        let b = queue.schedule("left-turn", 1_000, 6_000);
        assert_ne!(a.key, b.key);

        let drained = queue.drain();
        assert_eq!(drained, vec![a, b]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_orders_by_deadline_not_insertion() {
        let mut queue = DeferredQueue::new();
        queue.schedule("late", 0, 9_000);
        queue.schedule("early", 0, 3_000);
        let labels: Vec<String> = queue.drain().into_iter().map(|s| s.key.label_id).collect();
        assert_eq!(labels, vec!["early", "late"]);
    }
}

//! Deferred room tasks
//!
//! Countdown steps, round transitions and disconnect grace windows are queued
//! here against a room id and fired by the fight loop once due. A task only
//! carries ids; the manager re-fetches the room when it fires and drops the
//! task if the room is gone.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::fight::RoomId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTask {
    /// Next second of the pre-round countdown
    CountdownTick,
    /// Reset fighters and start the next round's countdown
    NextRound,
    /// Announce the match result
    EndMatch,
    /// Disconnect grace window closed; only the latest generation acts
    GraceExpired { generation: u64 },
}

#[derive(Debug)]
struct Scheduled {
    due_ms: u64,
    seq: u64,
    room_id: RoomId,
    task: RoomTask,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_ms, self.seq).cmp(&(other.due_ms, other.seq))
    }
}

/// Min-heap of room tasks ordered by due time, then insertion order
#[derive(Debug, Default)]
pub struct RoomScheduler {
    heap: BinaryHeap<Reverse<Scheduled>>,
    seq: u64,
}

impl RoomScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, room_id: RoomId, task: RoomTask) {
        self.seq += 1;
        self.heap.push(Reverse(Scheduled {
            due_ms,
            seq: self.seq,
            room_id,
            task,
        }));
    }

    /// Pop the earliest task due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(RoomId, RoomTask)> {
        if self.heap.peek()?.0.due_ms > now_ms {
            return None;
        }
        self.heap.pop().map(|Reverse(s)| (s.room_id, s.task))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

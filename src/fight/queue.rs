use std::collections::VecDeque;

use crate::net::protocol::ConnectionId;

/// A player waiting for an opponent
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub connection_id: ConnectionId,
    pub name: String,
    pub avatar: Option<String>,
    pub joined_at_ms: u64,
}

/// FIFO matchmaking queue, at most one entry per connection
#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<QueueEntry>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue; returns false if the connection is already waiting
    pub fn push(&mut self, entry: QueueEntry) -> bool {
        if self.contains(entry.connection_id) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn remove(&mut self, connection: ConnectionId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.connection_id == connection)?;
        self.entries.remove(index)
    }

    /// Dequeue the two oldest entries once at least two are waiting
    pub fn pop_pair(&mut self) -> Option<(QueueEntry, QueueEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        Some((first, second))
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.entries.iter().any(|e| e.connection_id == connection)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Waiting connections, oldest first
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.entries.iter().map(|e| e.connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(at: u64) -> QueueEntry {
        QueueEntry {
            connection_id: Uuid::new_v4(),
            name: format!("P{}", at),
            avatar: None,
            joined_at_ms: at,
        }
    }

    #[test]
    fn test_push_is_idempotent_per_connection() {
        let mut q = MatchQueue::new();
        let e = entry(0);
        assert!(q.push(e.clone()));
        assert!(!q.push(e));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_pop_pair_fifo() {
        let mut q = MatchQueue::new();
        let (a, b, c) = (entry(1), entry(2), entry(3));
        q.push(a.clone());
        assert!(q.pop_pair().is_none());
        q.push(b.clone());
        q.push(c.clone());

        let (first, second) = q.pop_pair().unwrap();
        assert_eq!(first, a);
        assert_eq!(second, b);
        assert_eq!(q.connections().collect::<Vec<_>>(), vec![c.connection_id]);
    }

    #[test]
    fn test_remove() {
        let mut q = MatchQueue::new();
        let a = entry(1);
        q.push(a.clone());
        assert!(q.remove(Uuid::new_v4()).is_none());
        assert_eq!(q.remove(a.connection_id), Some(a));
        assert!(q.is_empty());
    }
}

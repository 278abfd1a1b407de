//! Pending saves held while the memory service is unavailable.

use std::collections::VecDeque;

use super::entry::MemoryEntry;

/// FIFO, size-bounded queue. When full the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct PendingQueue {
    items: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::new(), capacity: capacity.max(1) }
    }

    /// Enqueue, returning the evicted entry if the queue was full.
    pub fn push(&mut self, entry: MemoryEntry) -> Option<MemoryEntry> {
        let evicted = if self.items.len() >= self.capacity { self.items.pop_front() } else { None };
        if let Some(old) = &evicted {
            tracing::warn!(title = %old.title, "Pending memory queue full; dropped oldest entry");
        }
        self.items.push_back(entry);
        evicted
    }

    pub fn front(&self) -> Option<&MemoryEntry> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<MemoryEntry> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.items.iter()
    }

    /// Whether an entry with the same fingerprint is already waiting.
    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.items.iter().any(|e| e.fingerprint() == fingerprint)
    }
}

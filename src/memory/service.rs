//! Memory service interface and an in-process implementation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::entry::MemoryEntry;

/// Failures reported by a memory service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("Memory service unavailable: {0}")]
    Unavailable(String),

    #[error("Memory service timed out")]
    Timeout,

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Entry rejected: {0}")]
    Rejected(String),
}

impl MemoryError {
    /// Whether retrying could help.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// External long-term memory store.
///
/// Injected into [`MemoryBridge`](super::MemoryBridge); tests substitute
/// [`InMemoryService`].
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Cheap health check, called before every read or write.
    async fn is_available(&self) -> bool;

    /// Find entries relevant to `text` in the given context.
    async fn query(&self, text: &str, context: &str) -> Result<Vec<MemoryEntry>, MemoryError>;

    /// Store an entry.
    async fn save(&self, entry: &MemoryEntry) -> Result<(), MemoryError>;

    /// Service name for logs.
    fn name(&self) -> &str {
        "memory"
    }
}

/// In-process memory service with scriptable failures.
#[derive(Debug, Default)]
pub struct InMemoryService {
    entries: Mutex<Vec<MemoryEntry>>,
    unavailable: AtomicBool,
    failures_remaining: AtomicU32,
    rejections_remaining: AtomicU32,
    query_calls: AtomicU32,
    save_calls: AtomicU32,
    availability_checks: AtomicU32,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make the next `count` query or save calls fail with a timeout.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` query or save calls fail as rejected.
    pub fn reject_next(&self, count: u32) {
        self.rejections_remaining.store(count, Ordering::SeqCst);
    }

    pub fn query_calls(&self) -> u32 {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn availability_checks(&self) -> u32 {
        self.availability_checks.load(Ordering::SeqCst)
    }

    /// Entries stored so far, in save order.
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.entries.lock().clone()
    }

    fn take_failure(&self) -> Option<MemoryError> {
        let take = |counter: &AtomicU32| {
            counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
        };

        if take(&self.rejections_remaining) {
            Some(MemoryError::Rejected("scripted rejection".to_string()))
        } else if take(&self.failures_remaining) {
            Some(MemoryError::Timeout)
        } else {
            None
        }
    }
}

#[async_trait]
impl MemoryService for InMemoryService {
    async fn is_available(&self) -> bool {
        self.availability_checks.fetch_add(1, Ordering::SeqCst);
        !self.unavailable.load(Ordering::SeqCst)
    }

    async fn query(&self, text: &str, _context: &str) -> Result<Vec<MemoryEntry>, MemoryError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let needle = text.trim().to_lowercase();
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.title.to_lowercase().contains(&needle)
                    || e.content.to_lowercase().contains(&needle)
                    || e.keywords.iter().any(|k| k.eq_ignore_ascii_case(&needle))
            })
            .cloned()
            .collect())
    }

    async fn save(&self, entry: &MemoryEntry) -> Result<(), MemoryError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failures() {
        let service = InMemoryService::new();
        service.fail_next(2);

        assert_eq!(service.query("x", "").await, Err(MemoryError::Timeout));
        assert_eq!(service.query("x", "").await, Err(MemoryError::Timeout));
        assert_eq!(service.query("x", "").await, Ok(vec![]));
        assert_eq!(service.query_calls(), 3);
    }

    #[tokio::test]
    async fn test_query_matches_title_content_keywords() {
        let service = InMemoryService::new();
        service.save(&MemoryEntry::new("Database", "Chose Postgres")).await.unwrap();
        service
            .save(&MemoryEntry::new("Cache", "Redis").with_keywords(["latency"]))
            .await
            .unwrap();

        assert_eq!(service.query("postgres", "").await.unwrap().len(), 1);
        assert_eq!(service.query("LATENCY", "").await.unwrap()[0].title, "Cache");
        assert_eq!(service.query("", "").await.unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_is_not_transient() {
        assert!(MemoryError::Timeout.is_transient());
        assert!(!MemoryError::Rejected("too big".into()).is_transient());
    }
}

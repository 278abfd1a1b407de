//! Degradation-aware bridge to the memory service.
//!
//! Every read or write is preceded by an availability check. When the
//! service is down, queries degrade and saves queue locally; the queue
//! drains in FIFO order on the next successful check. Transient failures are
//! retried with fixed backoff before degrading, unless strict mode asks for
//! the error instead. An entry the service rejects is reported back and never
//! queued.
//!
//! Not thread-safe. Each workflow session owns its own bridge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::entry::MemoryEntry;
use super::queue::PendingQueue;
use super::service::{MemoryError, MemoryService};
use crate::core::{retry_async, AutomationError, AutomationResult, MemoryConfig, RetryConfig};

const UNAVAILABLE: &str = "service reported unavailable";

/// Result of a memory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Found { entries: Vec<MemoryEntry>, attempts: u32 },
    /// No results available; safe to retry later
    Degraded { reason: String, attempts: u32 },
}

impl QueryOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Found entries; empty when degraded.
    pub fn entries(&self) -> &[MemoryEntry] {
        match self {
            Self::Found { entries, .. } => entries,
            Self::Degraded { .. } => &[],
        }
    }

    /// Underlying service calls made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Found { attempts, .. } | Self::Degraded { attempts, .. } => *attempts,
        }
    }
}

/// Result of a memory save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved { attempts: u32 },
    /// Held locally until the service is reachable
    Queued { pending: usize, attempts: u32 },
    /// Same content was already saved or queued
    Duplicate,
    /// The service refused the entry; retrying will not help
    Rejected { reason: String, attempts: u32 },
}

/// Memory service wrapper with retry, degradation and a pending queue.
#[derive(Debug)]
pub struct MemoryBridge<S> {
    service: S,
    retry: RetryConfig,
    strict: bool,
    project_ids: Vec<String>,
    pending: PendingQueue,
    saved: HashSet<String>,
    degraded: bool,
}

impl<S: MemoryService> MemoryBridge<S> {
    pub fn new(service: S, config: &MemoryConfig) -> Self {
        Self {
            service,
            retry: config.retry_config(),
            strict: config.strict,
            project_ids: config.project_ids.clone(),
            pending: PendingQueue::new(config.queue_size),
            saved: HashSet::new(),
            degraded: false,
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Whether the last interaction found the service unusable.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Ask the service whether it is reachable; drains pending saves when it is.
    pub async fn check_availability(&mut self) -> bool {
        let available = self.service.is_available().await;

        if available {
            if self.degraded {
                tracing::info!(service = self.service.name(), "Memory service recovered");
                self.degraded = false;
            }
            if !self.pending.is_empty() {
                self.drain_pending().await;
            }
        } else if !self.degraded {
            tracing::warn!(service = self.service.name(), "Memory service unavailable; degrading");
            self.degraded = true;
        }

        available
    }

    /// Query the service, degrading on unavailability or exhausted retries.
    pub async fn query(&mut self, text: &str, context: &str) -> AutomationResult<QueryOutcome> {
        if !self.check_availability().await {
            return self.degrade_query(UNAVAILABLE.to_string(), 0);
        }

        let service = &self.service;
        let outcome =
            retry_async(&self.retry, MemoryError::is_transient, || service.query(text, context)).await;
        let attempts = outcome.attempts;

        match outcome.result {
            Ok(entries) => {
                tracing::debug!(results = entries.len(), attempts, "Memory query succeeded");
                Ok(QueryOutcome::Found { entries, attempts })
            }
            Err(e) => self.degrade_query(e.to_string(), attempts),
        }
    }

    /// Save an entry, queueing it when the service cannot take it now.
    ///
    /// The entry is normalized first and tagged with the configured project
    /// ids when it carries none.
    pub async fn save(&mut self, entry: MemoryEntry) -> AutomationResult<SaveOutcome> {
        let entry = self.prepare(entry);
        let fingerprint = entry.fingerprint();

        if self.saved.contains(&fingerprint) || self.pending.contains_fingerprint(&fingerprint) {
            tracing::debug!(title = %entry.title, "Skipping duplicate memory entry");
            return Ok(SaveOutcome::Duplicate);
        }

        if !self.check_availability().await {
            return self.queue_save(entry, UNAVAILABLE.to_string(), 0);
        }

        let service = &self.service;
        let outcome = retry_async(&self.retry, MemoryError::is_transient, || service.save(&entry)).await;
        let attempts = outcome.attempts;

        match outcome.result {
            Ok(()) => {
                self.saved.insert(fingerprint);
                Ok(SaveOutcome::Saved { attempts })
            }
            Err(e) if !e.is_transient() => {
                tracing::warn!(error = %e, title = %entry.title, "Memory save rejected");
                Ok(SaveOutcome::Rejected { reason: e.to_string(), attempts })
            }
            Err(e) => self.queue_save(entry, e.to_string(), attempts),
        }
    }

    /// Push queued saves to the service, oldest first.
    ///
    /// A rejected entry is dropped and draining continues. Any other failure
    /// stops the drain, leaving it and everything after it queued.
    pub async fn drain_pending(&mut self) -> usize {
        let mut drained = 0;

        while let Some(entry) = self.pending.front() {
            match self.service.save(entry).await {
                Ok(()) => {
                    if let Some(entry) = self.pending.pop_front() {
                        self.saved.insert(entry.fingerprint());
                    }
                    drained += 1;
                }
                Err(e) if !e.is_transient() => {
                    if let Some(entry) = self.pending.pop_front() {
                        tracing::warn!(error = %e, title = %entry.title, "Dropped rejected memory entry");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, remaining = self.pending.len(), "Pending drain stopped");
                    break;
                }
            }
        }

        if drained > 0 {
            tracing::info!(drained, remaining = self.pending.len(), "Drained pending memory saves");
        }
        drained
    }

    fn prepare(&self, mut entry: MemoryEntry) -> MemoryEntry {
        if entry.project_ids.is_empty() {
            entry.project_ids = self.project_ids.clone();
        }
        entry.normalized()
    }

    fn degrade_query(&mut self, reason: String, attempts: u32) -> AutomationResult<QueryOutcome> {
        if self.strict {
            return Err(AutomationError::MemoryUnavailable { attempts, reason });
        }
        tracing::warn!(reason = %reason, attempts, "Memory query degraded");
        self.degraded = true;
        Ok(QueryOutcome::Degraded { reason, attempts })
    }

    fn queue_save(
        &mut self,
        entry: MemoryEntry,
        reason: String,
        attempts: u32,
    ) -> AutomationResult<SaveOutcome> {
        if self.strict {
            return Err(AutomationError::MemoryUnavailable { attempts, reason });
        }
        tracing::warn!(reason = %reason, attempts, title = %entry.title, "Memory save queued");
        self.degraded = true;
        self.pending.push(entry);
        Ok(SaveOutcome::Queued { pending: self.pending.len(), attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryService;

    fn bridge() -> MemoryBridge<InMemoryService> {
        MemoryBridge::new(InMemoryService::new(), &MemoryConfig::default())
            .with_retry(RetryConfig::immediate(3))
    }

    #[tokio::test]
    async fn test_query_retries_then_succeeds() {
        let mut bridge = bridge();
        bridge.service().fail_next(2);

        let outcome = bridge.query("anything", "").await.unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(bridge.service().query_calls(), 3);
    }

    #[tokio::test]
    async fn test_query_degrades_after_exhausting_retries() {
        let mut bridge = bridge();
        bridge.service().fail_next(5);

        let outcome = bridge.query("anything", "").await.unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.attempts(), 3);
        assert!(bridge.is_degraded());
    }

    #[tokio::test]
    async fn test_unavailable_query_makes_no_calls() {
        let mut bridge = bridge();
        bridge.service().set_available(false);

        let outcome = bridge.query("anything", "").await.unwrap();
        assert_eq!(outcome.attempts(), 0);
        assert_eq!(bridge.service().query_calls(), 0);
        assert_eq!(bridge.service().availability_checks(), 1);
    }

    #[tokio::test]
    async fn test_strict_mode_returns_error() {
        let config = MemoryConfig { strict: true, ..MemoryConfig::default() };
        let mut bridge = MemoryBridge::new(InMemoryService::new(), &config)
            .with_retry(RetryConfig::immediate(2));
        bridge.service().fail_next(2);

        let err = bridge.query("x", "").await.unwrap_err();
        assert!(matches!(err, AutomationError::MemoryUnavailable { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_save_queues_and_drains_in_order() {
        let mut bridge = bridge();
        bridge.service().set_available(false);

        for title in ["first", "second", "third"] {
            let outcome = bridge.save(MemoryEntry::new(title, title)).await.unwrap();
            assert!(matches!(outcome, SaveOutcome::Queued { .. }));
        }
        assert_eq!(bridge.pending().len(), 3);

        bridge.service().set_available(true);
        assert!(bridge.check_availability().await);

        let titles: Vec<_> = bridge.service().entries().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        assert!(bridge.pending().is_empty());
        assert!(!bridge.is_degraded());
    }

    #[tokio::test]
    async fn test_duplicate_saves_skipped() {
        let mut bridge = bridge();
        let first = bridge.save(MemoryEntry::new("a", "Chose option C")).await.unwrap();
        let second = bridge.save(MemoryEntry::new("b", "  chose OPTION c ")).await.unwrap();

        assert_eq!(first, SaveOutcome::Saved { attempts: 1 });
        assert_eq!(second, SaveOutcome::Duplicate);
        assert_eq!(bridge.service().save_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_save_is_not_retried_or_queued() {
        let mut bridge = bridge();
        bridge.service().reject_next(1);

        let outcome = bridge.save(MemoryEntry::new("bad", "bad")).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Rejected { attempts: 1, .. }));
        assert_eq!(bridge.service().save_calls(), 1);
        assert!(bridge.pending().is_empty());
        assert!(!bridge.is_degraded());

        // Not remembered as saved, so a corrected retry goes through
        let again = bridge.save(MemoryEntry::new("bad", "bad")).await.unwrap();
        assert_eq!(again, SaveOutcome::Saved { attempts: 1 });
    }

    #[tokio::test]
    async fn test_rejected_query_degrades_after_one_attempt() {
        let mut bridge = bridge();
        bridge.service().reject_next(1);

        let outcome = bridge.query("anything", "").await.unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(bridge.service().query_calls(), 1);
    }

    #[tokio::test]
    async fn test_drain_drops_rejected_front_entry() {
        let mut bridge = bridge();
        bridge.service().set_available(false);
        for title in ["bad", "second", "third"] {
            bridge.save(MemoryEntry::new(title, title)).await.unwrap();
        }

        bridge.service().set_available(true);
        bridge.service().reject_next(1);
        assert!(bridge.check_availability().await);

        let titles: Vec<_> = bridge.service().entries().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["second", "third"]);
        assert!(bridge.pending().is_empty());
    }

    #[tokio::test]
    async fn test_project_ids_attached() {
        let config = MemoryConfig { project_ids: vec!["proj-1".into()], ..MemoryConfig::default() };
        let mut bridge = MemoryBridge::new(InMemoryService::new(), &config);
        bridge.save(MemoryEntry::new("t", "content")).await.unwrap();

        assert_eq!(bridge.service().entries()[0].project_ids, vec!["proj-1"]);
    }
}

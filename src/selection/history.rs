//! Selection history.
//!
//! An ordered, size-bounded log of resolved menu selections. When full, the
//! oldest record is evicted first. Records are never mutated after append.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AutomationResult, Clock, SessionStore};
use crate::detection::{MenuOption, MenuType};

const NAMESPACE: &str = "selections";

/// How an option came to be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// Picked automatically at high confidence
    Auto,
    /// The recommended option, confirmed externally
    Recommended,
    /// Chosen by a human, overriding or without a recommendation
    Manual,
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Recommended => write!(f, "recommended"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A single resolved selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRecord {
    /// When the selection resolved
    pub timestamp: DateTime<Utc>,
    /// The chosen option
    pub option: MenuOption,
    /// Menu shape the option came from
    pub menu_type: MenuType,
    /// Confidence at the time of the choice
    pub confidence: f64,
    pub source: SelectionSource,
    /// Free-text reason for the choice
    pub rationale: String,
}

impl fmt::Display for SelectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {:.0}%): {}",
            self.timestamp.format("%H:%M:%S"),
            self.option,
            self.source,
            self.confidence,
            self.rationale
        )
    }
}

/// FIFO-bounded selection log.
#[derive(Debug, Clone)]
pub struct SelectionHistory {
    entries: VecDeque<SelectionRecord>,
    max_entries: usize,
}

impl Default for SelectionHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SelectionHistory {
    /// Create an empty history holding at most `max_entries` records.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self { entries: VecDeque::with_capacity(max_entries.min(1024)), max_entries }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&mut self, record: SelectionRecord) {
        while self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SelectionRecord> {
        self.entries.iter()
    }

    /// Most recent record.
    pub fn latest(&self) -> Option<&SelectionRecord> {
        self.entries.back()
    }

    /// Count of records from a given source.
    pub fn count_by_source(&self, source: SelectionSource) -> usize {
        self.entries.iter().filter(|r| r.source == source).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Save to the per-session store.
    pub fn persist<C: Clock>(&self, store: &SessionStore<C>, session_id: &str) -> AutomationResult<()> {
        let records: Vec<&SelectionRecord> = self.entries.iter().collect();
        store.put(session_id, NAMESPACE, &records)?;
        Ok(())
    }

    /// Load from the per-session store; missing or expired yields an empty history.
    pub fn restore<C: Clock>(
        store: &SessionStore<C>,
        session_id: &str,
        max_entries: usize,
    ) -> AutomationResult<Self> {
        let mut history = Self::new(max_entries);
        if let Some(records) = store.get::<Vec<SelectionRecord>>(session_id, NAMESPACE)? {
            for record in records {
                history.push(record);
            }
        }
        Ok(history)
    }
}

//! Per-level operation deadlines.
//!
//! Poll-based: nothing fires in the background. Callers `check` a timeout at
//! their own decision points. On expiry the in-flight context is preserved
//! before the level's error is returned, so a human can resume or inspect it.
//!
//! Not thread-safe. Each workflow session owns its own tracker.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AutomationError, AutomationResult, Clock, SystemClock, TimeoutConfig};

/// Upper bound on a single limit, keeping deadline arithmetic in range.
const MAX_LIMIT_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Operation level a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutLevel {
    Workflow,
    Nested,
    Agent,
}

impl TimeoutLevel {
    /// Ceiling in seconds under the given configuration.
    pub fn limit_secs(self, config: &TimeoutConfig) -> u64 {
        let limit = match self {
            Self::Workflow => config.workflow(),
            Self::Nested => config.nested(),
            Self::Agent => config.agent(),
        };
        limit.as_secs()
    }

    fn error(self, id: TimeoutId, elapsed_secs: u64, limit_secs: u64) -> AutomationError {
        match self {
            Self::Workflow => AutomationError::WorkflowTimeout { id, elapsed_secs, limit_secs },
            Self::Nested => AutomationError::NestedTimeout { id, elapsed_secs, limit_secs },
            Self::Agent => AutomationError::AgentTimeout { id, elapsed_secs, limit_secs },
        }
    }
}

impl fmt::Display for TimeoutLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow => write!(f, "workflow"),
            Self::Nested => write!(f, "nested"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// Handle for a started timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeoutId(pub u64);

impl fmt::Display for TimeoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A running timed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutState {
    pub id: TimeoutId,
    pub level: TimeoutLevel,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub limit_secs: u64,
    /// In-flight context, snapshotted on expiry
    pub context: serde_json::Value,
}

/// Snapshot kept after a timeout expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedState {
    pub state: TimeoutState,
    pub expired_at: DateTime<Utc>,
}

/// Result of polling a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStatus {
    /// Still within its deadline
    Running { remaining: Duration },
    /// Not active: never started, completed, cancelled or already expired
    Inactive,
}

/// Tracks deadlines for every active timed operation.
#[derive(Debug)]
pub struct TimeoutTracker<C: Clock = SystemClock> {
    clock: C,
    limits: TimeoutConfig,
    next_id: u64,
    active: BTreeMap<TimeoutId, TimeoutState>,
    preserved: BTreeMap<TimeoutId, PreservedState>,
}

impl Default for TimeoutTracker<SystemClock> {
    fn default() -> Self {
        Self::new(TimeoutConfig::default())
    }
}

impl TimeoutTracker<SystemClock> {
    pub fn new(limits: TimeoutConfig) -> Self {
        Self::with_clock(limits, SystemClock)
    }
}

impl<C: Clock> TimeoutTracker<C> {
    pub fn with_clock(limits: TimeoutConfig, clock: C) -> Self {
        Self {
            clock,
            limits,
            next_id: 1,
            active: BTreeMap::new(),
            preserved: BTreeMap::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Start timing an operation and record its deadline.
    pub fn start(
        &mut self,
        level: TimeoutLevel,
        label: impl Into<String>,
        context: serde_json::Value,
    ) -> TimeoutId {
        let id = TimeoutId(self.next_id);
        self.next_id += 1;

        let limit_secs = level.limit_secs(&self.limits).min(MAX_LIMIT_SECS);
        let started_at = self.clock.now();
        let deadline = started_at + Duration::seconds(limit_secs as i64);
        let label = label.into();

        tracing::debug!(id = %id, level = %level, label = %label, limit_secs, "Timeout started");
        self.active.insert(
            id,
            TimeoutState { id, level, label, started_at, deadline, limit_secs, context },
        );
        id
    }

    /// Replace the in-flight context that would be preserved on expiry.
    pub fn update_context(&mut self, id: TimeoutId, context: serde_json::Value) -> bool {
        match self.active.get_mut(&id) {
            Some(state) => {
                state.context = context;
                true
            }
            None => false,
        }
    }

    /// Poll a timeout.
    ///
    /// At or past the deadline the state is snapshotted, removed from the
    /// active set, and the level's timeout error is returned.
    pub fn check(&mut self, id: TimeoutId) -> AutomationResult<TimeoutStatus> {
        let now = self.clock.now();
        let Some(state) = self.active.get(&id) else {
            return Ok(TimeoutStatus::Inactive);
        };

        if now < state.deadline {
            return Ok(TimeoutStatus::Running { remaining: state.deadline - now });
        }

        match self.active.remove(&id) {
            Some(state) => Err(self.expire(state, now)),
            None => Ok(TimeoutStatus::Inactive),
        }
    }

    /// Poll every active timeout, returning the errors for those that expired.
    pub fn check_all(&mut self) -> Vec<AutomationError> {
        let ids: Vec<TimeoutId> = self.active.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.check(id).err()).collect()
    }

    /// Finish an operation normally, returning how long it ran.
    pub fn complete(&mut self, id: TimeoutId) -> Option<Duration> {
        let state = self.active.remove(&id)?;
        let elapsed = self.clock.now() - state.started_at;
        tracing::debug!(id = %id, elapsed_secs = elapsed.num_seconds(), "Timeout completed");
        Some(elapsed)
    }

    /// Drop a pending timeout. No snapshot, no log entry.
    pub fn cancel(&mut self, id: TimeoutId) -> bool {
        self.active.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimeoutId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active(&self) -> impl Iterator<Item = &TimeoutState> {
        self.active.values()
    }

    /// State preserved when a timeout expired.
    pub fn preserved(&self, id: TimeoutId) -> Option<&PreservedState> {
        self.preserved.get(&id)
    }

    /// Every preserved snapshot, oldest timeout first.
    pub fn all_preserved(&self) -> impl Iterator<Item = &PreservedState> {
        self.preserved.values()
    }

    /// Hand a preserved snapshot back to the caller for resumption.
    pub fn take_preserved(&mut self, id: TimeoutId) -> Option<PreservedState> {
        self.preserved.remove(&id)
    }

    fn expire(&mut self, state: TimeoutState, now: DateTime<Utc>) -> AutomationError {
        let elapsed_secs = (now - state.started_at).num_seconds().max(0) as u64;
        let (id, level, limit_secs) = (state.id, state.level, state.limit_secs);

        tracing::warn!(
            id = %id,
            level = %level,
            label = %state.label,
            elapsed_secs,
            limit_secs,
            "Operation timed out; context preserved"
        );
        self.preserved.insert(id, PreservedState { state, expired_at: now });

        level.error(id, elapsed_secs, limit_secs)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::ManualClock;

    fn tracker() -> TimeoutTracker<ManualClock> {
        TimeoutTracker::with_clock(TimeoutConfig::default(), ManualClock::starting_now())
    }

    #[test]
    fn test_workflow_timeout_expires_after_limit() {
        let mut timeouts = tracker();
        let id = timeouts.start(TimeoutLevel::Workflow, "create-prd", json!({"step": 3}));

        timeouts.clock().advance_secs(1799);
        match timeouts.check(id).unwrap() {
            TimeoutStatus::Running { remaining } => assert_eq!(remaining.num_seconds(), 1),
            other => panic!("expected running, got {other:?}"),
        }

        timeouts.clock().advance_secs(2);
        let err = timeouts.check(id).unwrap_err();
        assert!(matches!(
            err,
            AutomationError::WorkflowTimeout { elapsed_secs: 1801, limit_secs: 1800, .. }
        ));

        let preserved = timeouts.preserved(id).unwrap();
        assert_eq!(preserved.state.context, json!({"step": 3}));
        assert!(!timeouts.is_active(id));
        assert_eq!(timeouts.check(id).unwrap(), TimeoutStatus::Inactive);
    }

    #[test]
    fn test_each_level_has_its_own_error() {
        let mut timeouts = tracker();
        let nested = timeouts.start(TimeoutLevel::Nested, "party", json!(null));
        let agent = timeouts.start(TimeoutLevel::Agent, "analyst", json!(null));

        timeouts.clock().advance_secs(60);
        assert!(matches!(timeouts.check(agent), Err(AutomationError::AgentTimeout { .. })));
        assert!(timeouts.check(nested).is_ok());

        timeouts.clock().advance_secs(240);
        assert!(matches!(timeouts.check(nested), Err(AutomationError::NestedTimeout { .. })));
    }

    #[test]
    fn test_cancel_leaves_no_trace() {
        let mut timeouts = tracker();
        let id = timeouts.start(TimeoutLevel::Agent, "dev", json!({"file": "main.rs"}));

        assert!(timeouts.cancel(id));
        timeouts.clock().advance_secs(3600);

        assert_eq!(timeouts.check(id).unwrap(), TimeoutStatus::Inactive);
        assert!(timeouts.preserved(id).is_none());
        assert!(!timeouts.cancel(id));
    }

    #[test]
    fn test_update_context_is_what_gets_preserved() {
        let mut timeouts = tracker();
        let id = timeouts.start(TimeoutLevel::Agent, "dev", json!({"v": 1}));
        assert!(timeouts.update_context(id, json!({"v": 2})));

        timeouts.clock().advance_secs(61);
        assert!(timeouts.check(id).is_err());
        assert_eq!(timeouts.take_preserved(id).unwrap().state.context, json!({"v": 2}));
        assert!(timeouts.preserved(id).is_none());
    }

    #[test]
    fn test_check_all_and_complete() {
        let mut timeouts = tracker();
        let a = timeouts.start(TimeoutLevel::Agent, "a", json!(null));
        let w = timeouts.start(TimeoutLevel::Workflow, "w", json!(null));

        timeouts.clock().advance_secs(90);
        let expired = timeouts.check_all();
        assert_eq!(expired.len(), 1);
        assert!(expired[0].is_timeout());
        assert!(!timeouts.is_active(a));

        assert_eq!(timeouts.complete(w).unwrap().num_seconds(), 90);
        assert!(timeouts.complete(w).is_none());
    }
}

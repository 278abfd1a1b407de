//! Per-run automation context.
//!
//! One [`AutomationSession`] per workflow run owns every stateful tracker:
//! selector and history, nesting depth, timeouts, batching, and the
//! operation log. Nothing is shared between sessions.
//!
//! Not thread-safe: a session is meant to be driven from a single thread.

use serde::Serialize;
use uuid::Uuid;

use crate::control::{
    BatchCheckpoint, BatchTracker, Checkpoint, LoggedOperation, MenuContext, MenuKind,
    NestedMenuTracker, TimeoutId, TimeoutLevel, TimeoutTracker,
};
use crate::core::{AutomationResult, Clock, Config, SessionStore, SystemClock};
use crate::detection::{detect_verdict, DetectionReport, MenuDetector, MenuOption, VerdictMatch};
use crate::selection::{
    MenuSelector, Selection, SelectionHistory, SelectionRecord, ValidationMetrics,
};
use crate::workflow::ProjectTier;

/// Everything that happened while processing one output block.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub report: DetectionReport,
    /// Selection for the best accepted menu, if any
    pub selection: Option<Selection>,
    /// Sub-menu entered because of an automatic pick
    pub entered: Option<MenuContext>,
    /// Sub-menu left because of an automatic pick, with the restored parent state
    pub exited: Option<MenuContext>,
    pub verdict: Option<VerdictMatch>,
    pub batch: Option<BatchCheckpoint>,
    /// Checkpoint to present when the batch closed
    pub checkpoint: Option<Checkpoint>,
}

/// Result of applying a chosen option to the nesting stack.
#[derive(Debug, Default)]
struct NestingChange {
    entered: Option<MenuContext>,
    exited: Option<MenuContext>,
}

/// State for a single workflow run.
#[derive(Debug)]
pub struct AutomationSession<C: Clock = SystemClock> {
    id: String,
    config: Config,
    tier: ProjectTier,
    detector: MenuDetector,
    selector: MenuSelector,
    nesting: NestedMenuTracker,
    timeouts: TimeoutTracker<C>,
    batch: BatchTracker,
    operations: Vec<LoggedOperation>,
    batch_start: usize,
    batch_confidence: Option<f64>,
    workflow_timeout: Option<TimeoutId>,
}

impl AutomationSession<SystemClock> {
    pub fn new(config: Config, tier: ProjectTier) -> Self {
        Self::with_clock(config, tier, SystemClock)
    }
}

impl<C: Clock> AutomationSession<C> {
    pub fn with_clock(config: Config, tier: ProjectTier, clock: C) -> Self {
        let id = Uuid::new_v4().to_string();
        tracing::debug!(session = %id, tier = tier.as_u8(), "Starting automation session");

        Self {
            detector: MenuDetector::from_config(&config.guards),
            selector: MenuSelector::from_config(&config),
            nesting: NestedMenuTracker::new(config.nesting.max_depth),
            timeouts: TimeoutTracker::with_clock(config.timeouts.clone(), clock),
            batch: BatchTracker::new(tier.as_u8(), &config.batch),
            id,
            config,
            tier,
            operations: Vec::new(),
            batch_start: 0,
            batch_confidence: None,
            workflow_timeout: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tier(&self) -> ProjectTier {
        self.tier
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &SelectionHistory {
        self.selector.history()
    }

    pub fn nesting(&self) -> &NestedMenuTracker {
        &self.nesting
    }

    pub fn timeouts(&self) -> &TimeoutTracker<C> {
        &self.timeouts
    }

    pub fn timeouts_mut(&mut self) -> &mut TimeoutTracker<C> {
        &mut self.timeouts
    }

    pub fn operations(&self) -> &[LoggedOperation] {
        &self.operations
    }

    /// Start the workflow-level deadline, checked on every processed output.
    pub fn start_workflow(&mut self, label: &str, context: serde_json::Value) -> TimeoutId {
        let id = self.timeouts.start(TimeoutLevel::Workflow, label, context);
        self.workflow_timeout = Some(id);
        id
    }

    /// Mark the workflow finished, stopping its deadline.
    pub fn finish_workflow(&mut self) {
        if let Some(id) = self.workflow_timeout.take() {
            self.timeouts.complete(id);
        }
    }

    /// Record an operation in the session log.
    pub fn log_operation(&mut self, action: impl Into<String>, detail: impl Into<String>) {
        self.operations.push(LoggedOperation::at(self.timeouts.clock().now(), action, detail));
    }

    /// Run one block of agent output through the full pipeline.
    pub fn process_output(&mut self, text: &str) -> AutomationResult<ProcessOutcome> {
        self.process_output_with_metrics(text, None)
    }

    /// Run one block of agent output, with validation metrics for the
    /// escalation check.
    ///
    /// detect → guard → score → select → nesting → log → batch. Hard limits
    /// (workflow timeout, nesting ceiling) come back as errors after their
    /// state has been preserved.
    pub fn process_output_with_metrics(
        &mut self,
        text: &str,
        metrics: Option<&ValidationMetrics>,
    ) -> AutomationResult<ProcessOutcome> {
        if let Some(id) = self.workflow_timeout {
            let snapshot = self.snapshot();
            self.timeouts.update_context(id, snapshot);
            self.timeouts.check(id)?;
        }

        let report = self.detector.analyze(text);
        for rejected in &report.rejected {
            self.log_operation(
                "guard veto",
                format!("{} ({})", rejected.candidate.menu_type(), rejected.verdict.reason),
            );
        }

        let mut selection = None;
        let mut change = NestingChange::default();

        if let Some(best) = report.best() {
            let routed =
                self.selector.select(best.candidate.clone(), Some(best.score.as_f64()), metrics);
            self.note_confidence(routed.confidence());
            self.log_operation(
                format!("menu {}", routed.route()),
                format!("{} at {:.0}%", best.candidate.menu_type(), routed.confidence()),
            );

            if let Some(record) = routed.record().cloned() {
                self.log_operation("selected", format!("{} ({})", record.option, record.source));
                change = self.apply_choice(&record.option)?;
            }
            selection = Some(routed);
        }

        let verdict = detect_verdict(text);
        if let Some(v) = &verdict {
            self.log_operation("verdict", format!("{} ({})", v.verdict, v.keyword));
        }

        self.log_operation("output", summarize(text));
        let batch = self.batch.record(text);
        let checkpoint = batch.as_ref().map(|_| self.close_batch());

        Ok(ProcessOutcome {
            report,
            selection,
            entered: change.entered,
            exited: change.exited,
            verdict,
            batch,
            checkpoint,
        })
    }

    /// Resolve a recommended, presented or escalated selection.
    pub fn confirm(
        &mut self,
        selection: &mut Selection,
        key: &str,
        rationale: impl Into<String>,
    ) -> AutomationResult<SelectionRecord> {
        let record = self.selector.confirm(selection, key, rationale)?;
        self.log_operation("selected", format!("{} ({})", record.option, record.source));
        self.apply_choice(&record.option)?;
        Ok(record)
    }

    /// Resume automatic nesting after a depth escalation.
    pub fn acknowledge_escalation(&mut self) {
        self.nesting.acknowledge_escalation();
        self.log_operation("escalation acknowledged", format!("depth {}", self.nesting.depth()));
    }

    /// Save the selection history to the per-session store.
    pub fn persist_history<S: Clock>(&self, store: &SessionStore<S>) -> AutomationResult<()> {
        self.selector.history().persist(store, &self.id)
    }

    /// Load a previously persisted history for this session id.
    pub fn restore_history<S: Clock>(&mut self, store: &SessionStore<S>) -> AutomationResult<()> {
        let history =
            SelectionHistory::restore(store, &self.id, self.config.selection.history_size)?;
        *self.selector.history_mut() = history;
        Ok(())
    }

    /// Adopt an existing session id, e.g. to resume a persisted run.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn apply_choice(&mut self, option: &MenuOption) -> AutomationResult<NestingChange> {
        let mut change = NestingChange::default();

        if let Some(kind) = MenuKind::from_option_label(&option.label) {
            if self.nesting.depth() == 0 {
                self.nesting.enter(MenuKind::Root, serde_json::Value::Null)?;
            }
            let parent_state = self.snapshot();
            let context = self.nesting.enter(kind, parent_state)?.clone();
            self.log_operation("enter", format!("{} at depth {}", kind, context.depth));
            change.entered = Some(context);
        } else if (option.is_exit() || option.is_continue()) && self.nesting.depth() > 1 {
            if let Some(context) = self.nesting.exit() {
                self.log_operation("exit", format!("{} at depth {}", context.kind, context.depth));
                change.exited = Some(context);
            }
        }

        Ok(change)
    }

    fn note_confidence(&mut self, confidence: f64) {
        self.batch_confidence = Some(match self.batch_confidence {
            Some(current) => current.min(confidence),
            None => confidence,
        });
    }

    fn close_batch(&mut self) -> Checkpoint {
        let confidence = self.batch_confidence.take().unwrap_or(100.0);
        let operations = self.operations[self.batch_start..].to_vec();
        self.batch_start = self.operations.len();
        Checkpoint::new(confidence, operations)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "session": self.id,
            "operations": self.operations.len(),
            "depth": self.nesting.depth(),
            "last_selection": self.selector.history().latest().map(|r| r.option.key.clone()),
        })
    }
}

/// First non-empty line, shortened for the log.
fn summarize(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    crate::memory::truncate_chars(line, 80)
}

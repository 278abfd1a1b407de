//! Confidence-driven menu selection.
//!
//! ```text
//! UNSCORED → SCORED → AUTO_SELECTED ─────────────→ RESOLVED
//!                   → RECOMMENDED ── confirm ───→ RESOLVED
//!                   → PRESENTED ──── confirm ───→ RESOLVED
//!          (metrics breach) → ESCALATED ── confirm → RESOLVED
//! ```
//!
//! The validation threshold check runs before the confidence tiers and wins
//! whenever it fires.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::history::{SelectionHistory, SelectionRecord, SelectionSource};
use super::thresholds::{EscalationAction, ThresholdEvaluator, ThresholdOutcome, ValidationMetrics};
use crate::core::{AutomationError, AutomationResult, Config, SelectionConfig};
use crate::detection::{DetectionCandidate, MenuOption, MenuType};

/// Label prefixes preferred when picking an option automatically, best first.
const PREFERRED_LABELS: &[&str] = &["continue", "proceed", "approve", "yes", "accept"];

/// Where a selection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Unscored,
    Scored,
    AutoSelected,
    Recommended,
    Presented,
    Escalated,
    Resolved,
}

impl SelectionState {
    /// Whether the selection is waiting on an external decision.
    pub fn awaits_confirmation(self) -> bool {
        matches!(self, Self::Recommended | Self::Presented | Self::Escalated)
    }
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unscored => "unscored",
            Self::Scored => "scored",
            Self::AutoSelected => "auto_selected",
            Self::Recommended => "recommended",
            Self::Presented => "presented",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
        };
        write!(f, "{}", name)
    }
}

/// A menu moving through the selection state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    candidate: DetectionCandidate,
    confidence: f64,
    route: SelectionState,
    state: SelectionState,
    proposed: Option<MenuOption>,
    escalation: Option<ThresholdOutcome>,
    record: Option<SelectionRecord>,
    transitions: Vec<SelectionState>,
}

impl Selection {
    fn new(candidate: DetectionCandidate) -> Self {
        Self {
            candidate,
            confidence: 0.0,
            route: SelectionState::Unscored,
            state: SelectionState::Unscored,
            proposed: None,
            escalation: None,
            record: None,
            transitions: vec![SelectionState::Unscored],
        }
    }

    fn transition(&mut self, to: SelectionState) {
        tracing::debug!(from = %self.state, to = %to, "Selection transition");
        self.state = to;
        self.transitions.push(to);
    }

    pub fn candidate(&self) -> &DetectionCandidate {
        &self.candidate
    }

    /// Normalized confidence, 0-100.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Current state.
    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// The branch taken after scoring: auto-selected, recommended,
    /// presented or escalated. Stays put after the selection resolves.
    pub fn route(&self) -> SelectionState {
        self.route
    }

    /// The option the selector would pick. `None` when presented or escalated.
    pub fn proposed(&self) -> Option<&MenuOption> {
        self.proposed.as_ref()
    }

    /// Threshold breach that forced an escalation.
    pub fn escalation(&self) -> Option<&ThresholdOutcome> {
        self.escalation.as_ref()
    }

    /// The resolving record, once resolved.
    pub fn record(&self) -> Option<&SelectionRecord> {
        self.record.as_ref()
    }

    /// The chosen option, once resolved.
    pub fn chosen(&self) -> Option<&MenuOption> {
        self.record.as_ref().map(|r| &r.option)
    }

    pub fn is_resolved(&self) -> bool {
        self.state == SelectionState::Resolved
    }

    /// Every state visited, in order.
    pub fn transitions(&self) -> &[SelectionState] {
        &self.transitions
    }
}

/// Routes scored menus and keeps the selection history.
#[derive(Debug, Clone)]
pub struct MenuSelector {
    high_threshold: f64,
    medium_threshold: f64,
    evaluator: ThresholdEvaluator,
    history: SelectionHistory,
}

impl Default for MenuSelector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MenuSelector {
    pub fn new(selection: &SelectionConfig, evaluator: ThresholdEvaluator) -> Self {
        Self {
            high_threshold: selection.high_threshold,
            medium_threshold: selection.medium_threshold,
            evaluator,
            history: SelectionHistory::new(selection.history_size),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.selection, ThresholdEvaluator::new(config.escalation.clone()))
    }

    /// Replace the history, e.g. with one restored from the session store.
    pub fn with_history(mut self, history: SelectionHistory) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &SelectionHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut SelectionHistory {
        &mut self.history
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.high_threshold, self.medium_threshold)
    }

    /// Route a candidate.
    ///
    /// A missing or non-finite score counts as 0; scores are clamped to
    /// 0-100. Never fails for a well-formed candidate.
    pub fn select(
        &mut self,
        candidate: DetectionCandidate,
        score: Option<f64>,
        metrics: Option<&ValidationMetrics>,
    ) -> Selection {
        let mut selection = Selection::new(candidate);
        selection.confidence = normalize_score(score);
        selection.transition(SelectionState::Scored);

        if let Some(metrics) = metrics {
            let outcome = self.evaluator.evaluate(metrics);
            if outcome.action.is_escalation() {
                tracing::warn!(
                    action = %outcome.action,
                    confidence = selection.confidence,
                    "Escalating ahead of confidence routing"
                );
                selection.escalation = Some(outcome);
                selection.route = SelectionState::Escalated;
                selection.transition(SelectionState::Escalated);
                return selection;
            }
        }

        let best = best_option(&selection.candidate).cloned();

        if selection.confidence >= self.high_threshold {
            selection.route = SelectionState::AutoSelected;
            selection.transition(SelectionState::AutoSelected);
            if let Some(option) = best {
                tracing::info!(
                    option = %option,
                    confidence = selection.confidence,
                    "Auto-selected menu option"
                );
                let rationale = format!("auto-selected at {:.0}% confidence", selection.confidence);
                self.resolve(&mut selection, option, SelectionSource::Auto, rationale);
            }
        } else if selection.confidence >= self.medium_threshold {
            selection.proposed = best;
            selection.route = SelectionState::Recommended;
            selection.transition(SelectionState::Recommended);
        } else {
            selection.route = SelectionState::Presented;
            selection.transition(SelectionState::Presented);
        }

        selection
    }

    /// Resolve a recommended, presented or escalated selection with an
    /// external decision.
    ///
    /// The record's source is `recommended` when `key` matches the proposal
    /// and `manual` otherwise.
    pub fn confirm(
        &mut self,
        selection: &mut Selection,
        key: &str,
        rationale: impl Into<String>,
    ) -> AutomationResult<SelectionRecord> {
        if !selection.state.awaits_confirmation() {
            return Err(AutomationError::NotAwaitingConfirmation(selection.state.to_string()));
        }

        let option = selection.candidate.option(key).cloned().ok_or_else(|| {
            AutomationError::InvalidSelection {
                option: key.trim().to_string(),
                available: selection
                    .candidate
                    .options()
                    .iter()
                    .map(|o| o.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;

        let source = match &selection.proposed {
            Some(proposed) if proposed.key == option.key => SelectionSource::Recommended,
            _ => SelectionSource::Manual,
        };

        Ok(self.resolve(selection, option, source, rationale.into()))
    }

    fn resolve(
        &mut self,
        selection: &mut Selection,
        option: MenuOption,
        source: SelectionSource,
        rationale: String,
    ) -> SelectionRecord {
        let record = SelectionRecord {
            timestamp: Utc::now(),
            option,
            menu_type: selection.candidate.menu_type(),
            confidence: selection.confidence,
            source,
            rationale,
        };
        self.history.push(record.clone());
        selection.record = Some(record.clone());
        selection.transition(SelectionState::Resolved);
        record
    }
}

/// Clamp to 0-100; missing and non-finite scores are 0.
pub fn normalize_score(score: Option<f64>) -> f64 {
    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// The option an automated pick should take.
///
/// Canonical menus have fixed answers (`C` for A/P/C, `Y` for Y/V/N). Other
/// menus prefer continue-like labels, then the first option that does not
/// exit, then the first option.
pub fn best_option(candidate: &DetectionCandidate) -> Option<&MenuOption> {
    let canonical = match candidate.menu_type() {
        MenuType::Apc => candidate.option("C"),
        MenuType::Yvn => candidate.option("Y"),
        _ => None,
    };
    if canonical.is_some() {
        return canonical;
    }

    let options = candidate.options();
    PREFERRED_LABELS
        .iter()
        .find_map(|word| options.iter().find(|o| o.label.to_lowercase().starts_with(word)))
        .or_else(|| options.iter().find(|o| !o.is_exit()))
        .or_else(|| options.first())
}

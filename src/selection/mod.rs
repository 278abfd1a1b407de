//! Menu selection: confidence routing, validation thresholds, history.

mod history;
mod selector;
mod thresholds;

pub use history::{SelectionHistory, SelectionRecord, SelectionSource};
pub use selector::{best_option, normalize_score, MenuSelector, Selection, SelectionState};
pub use thresholds::{EscalationAction, ThresholdEvaluator, ThresholdOutcome, ValidationMetrics};

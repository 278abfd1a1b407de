//! BMB validation thresholds.
//!
//! Validation output can carry hard numbers (blocking errors, major issues,
//! compliance). When any of them crosses its threshold the workflow escalates
//! before confidence-based menu routing is even considered.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{EscalationConfig, ValidationFailure};

/// Whitespace around `=` or `:` in `key = value` pairs.
static SEPARATOR_SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]*([=:])[ \t]*").expect("valid regex"));

/// Validation metrics reported by a workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub blocking_errors: u32,
    pub major_issues: u32,
    pub compliance_score: f64,
}

impl Default for ValidationMetrics {
    fn default() -> Self {
        Self { blocking_errors: 0, major_issues: 0, compliance_score: 100.0 }
    }
}

impl ValidationMetrics {
    /// Parse `key=value` pairs separated by commas or whitespace.
    ///
    /// Unknown keys are ignored; every malformed number is reported.
    ///
    /// ```
    /// use bmad_automation::selection::ValidationMetrics;
    ///
    /// let m = ValidationMetrics::parse("blocking_errors=5, major_issues=2, compliance_score=80").unwrap();
    /// assert_eq!(m.blocking_errors, 5);
    /// ```
    pub fn parse(input: &str) -> Result<Self, ValidationFailure> {
        let mut metrics = Self::default();
        let mut failure = ValidationFailure::new();

        let input = SEPARATOR_SPACING.replace_all(input, "$1");
        for pair in input.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once(['=', ':']) else {
                failure.push(pair, "expected key=value");
                continue;
            };
            let (key, value) = (key.trim().to_lowercase(), value.trim());

            match key.as_str() {
                "blocking_errors" | "blocking" => match value.parse() {
                    Ok(v) => metrics.blocking_errors = v,
                    Err(_) => failure.push(key, format!("'{}' is not a whole number", value)),
                },
                "major_issues" | "major" => match value.parse() {
                    Ok(v) => metrics.major_issues = v,
                    Err(_) => failure.push(key, format!("'{}' is not a whole number", value)),
                },
                "compliance_score" | "compliance" => {
                    match value.trim_end_matches('%').parse::<f64>() {
                        Ok(v) if v.is_finite() => metrics.compliance_score = v,
                        _ => failure.push(key, format!("'{}' is not a number", value)),
                    }
                }
                _ => tracing::debug!(key = %key, "Ignoring unknown metric"),
            }
        }

        failure.into_result().map(|()| metrics)
    }
}

/// Where a threshold breach routes the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    /// Thresholds hold; continue with confidence-based routing
    Proceed,
    /// Stop and resolve the issues together with a human
    CollaborativeResolution,
    /// Compliance is too low; investigate before continuing
    DeepInvestigation,
}

impl EscalationAction {
    pub fn is_escalation(self) -> bool {
        self != Self::Proceed
    }
}

impl fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed => write!(f, "proceed"),
            Self::CollaborativeResolution => write!(f, "collaborative resolution"),
            Self::DeepInvestigation => write!(f, "deep investigation"),
        }
    }
}

/// Result of a threshold check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub action: EscalationAction,
    /// Every breached threshold, in check order
    pub reasons: Vec<String>,
}

/// Fixed-threshold evaluator.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    config: EscalationConfig,
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(EscalationConfig::default())
    }
}

impl ThresholdEvaluator {
    pub fn new(config: EscalationConfig) -> Self {
        Self { config }
    }

    /// Check every threshold.
    ///
    /// Blocking errors and major issues route to collaborative resolution;
    /// low compliance alone routes to deep investigation. The first breach in
    /// that order decides the action; all breaches are listed.
    pub fn evaluate(&self, metrics: &ValidationMetrics) -> ThresholdOutcome {
        let mut reasons = Vec::new();
        let mut action = EscalationAction::Proceed;

        if metrics.blocking_errors > self.config.max_blocking_errors {
            reasons.push(format!(
                "{} blocking errors exceed the limit of {}",
                metrics.blocking_errors, self.config.max_blocking_errors
            ));
            action = EscalationAction::CollaborativeResolution;
        }
        if metrics.major_issues > self.config.max_major_issues {
            reasons.push(format!(
                "{} major issues exceed the limit of {}",
                metrics.major_issues, self.config.max_major_issues
            ));
            if action == EscalationAction::Proceed {
                action = EscalationAction::CollaborativeResolution;
            }
        }
        if metrics.compliance_score < self.config.min_compliance_score {
            reasons.push(format!(
                "compliance score {:.0} is below {:.0}",
                metrics.compliance_score, self.config.min_compliance_score
            ));
            if action == EscalationAction::Proceed {
                action = EscalationAction::DeepInvestigation;
            }
        }

        if action.is_escalation() {
            tracing::info!(action = %action, reasons = ?reasons, "Validation thresholds breached");
        }

        ThresholdOutcome { action, reasons }
    }
}

//! Checkpoint presentation.
//!
//! The detail level follows confidence:
//!
//! - **Minimal** (>= 80): a one or two line synthesized summary
//! - **Summary** (50-79): key decisions picked out by keyword
//! - **FullAudit** (< 50): the complete chronological log
//!
//! Minimal and Summary offer an `[E] Expand` affordance. Expansion is an
//! explicit flag on the checkpoint, toggled by the caller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::selection::normalize_score;

/// Words that mark an operation as a key decision.
const DECISION_KEYWORDS: &[&str] = &[
    "decid", "select", "chose", "choos", "approv", "reject", "escalat", "error", "fail", "warn",
    "risk", "block", "timeout", "timed out", "override",
];

/// Most key decisions shown before collapsing the rest.
const SUMMARY_LIMIT: usize = 5;

/// Expand affordance shown on collapsed formats.
pub const EXPAND_AFFORDANCE: &str = "[E] Expand";

/// How much detail a checkpoint shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointFormat {
    Minimal,
    Summary,
    FullAudit,
}

impl CheckpointFormat {
    /// Pick the format for a confidence score. Non-finite scores count as 0.
    ///
    /// ```
    /// use bmad_automation::control::CheckpointFormat;
    ///
    /// assert_eq!(CheckpointFormat::for_confidence(85.0), CheckpointFormat::Minimal);
    /// assert_eq!(CheckpointFormat::for_confidence(65.0), CheckpointFormat::Summary);
    /// assert_eq!(CheckpointFormat::for_confidence(30.0), CheckpointFormat::FullAudit);
    /// ```
    pub fn for_confidence(confidence: f64) -> Self {
        let confidence = normalize_score(Some(confidence));
        if confidence >= 80.0 {
            Self::Minimal
        } else if confidence >= 50.0 {
            Self::Summary
        } else {
            Self::FullAudit
        }
    }

    /// Whether this format hides detail behind the expand affordance.
    pub fn is_collapsible(self) -> bool {
        self != Self::FullAudit
    }
}

impl fmt::Display for CheckpointFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => write!(f, "minimal"),
            Self::Summary => write!(f, "summary"),
            Self::FullAudit => write!(f, "full audit trail"),
        }
    }
}

/// One entry in the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedOperation {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub detail: String,
}

impl LoggedOperation {
    pub fn new(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::at(Utc::now(), action, detail)
    }

    pub fn at(timestamp: DateTime<Utc>, action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { timestamp, action: action.into(), detail: detail.into() }
    }

    /// Parse an `action: detail` line. Lines without a colon are all action.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match line.split_once(':') {
            Some((action, detail)) => Self::new(action.trim(), detail.trim()),
            None => Self::new(line, ""),
        })
    }

    /// Whether the operation reads like a key decision.
    pub fn is_key_decision(&self) -> bool {
        let haystack = format!("{} {}", self.action, self.detail).to_lowercase();
        DECISION_KEYWORDS.iter().any(|k| haystack.contains(k))
    }
}

impl fmt::Display for LoggedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp.format("%H:%M:%S"), self.action)?;
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// A point where accumulated progress is shown to a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    confidence: f64,
    format: CheckpointFormat,
    operations: Vec<LoggedOperation>,
    expanded: bool,
}

impl Checkpoint {
    pub fn new(confidence: f64, operations: Vec<LoggedOperation>) -> Self {
        Self {
            confidence: normalize_score(Some(confidence)),
            format: CheckpointFormat::for_confidence(confidence),
            operations,
            expanded: false,
        }
    }

    pub fn format(&self) -> CheckpointFormat {
        self.format
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn operations(&self) -> &[LoggedOperation] {
        &self.operations
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Flip the expansion flag, returning the new value.
    pub fn toggle_expanded(&mut self) -> bool {
        self.expanded = !self.expanded;
        self.expanded
    }

    /// Key decisions, in log order.
    pub fn key_decisions(&self) -> impl Iterator<Item = &LoggedOperation> {
        self.operations.iter().filter(|op| op.is_key_decision())
    }

    /// Render as text.
    pub fn render(&self) -> String {
        if self.expanded || self.format == CheckpointFormat::FullAudit {
            return self.render_full();
        }

        let mut out = match self.format {
            CheckpointFormat::Minimal => self.render_minimal(),
            _ => self.render_summary(),
        };
        out.push('\n');
        out.push_str(EXPAND_AFFORDANCE);
        out.push_str(" for the full log");
        out
    }

    fn render_minimal(&self) -> String {
        let mut out = format!(
            "Checkpoint: {} operation(s) completed ({:.0}% confidence)",
            self.operations.len(),
            self.confidence
        );
        if let Some(last) = self.operations.last() {
            out.push_str(&format!("\nLast: {}", last.action));
        }
        out
    }

    fn render_summary(&self) -> String {
        let decisions: Vec<_> = self.key_decisions().collect();
        let mut out = format!(
            "Checkpoint summary: {} operation(s), {} key decision(s) ({:.0}% confidence)",
            self.operations.len(),
            decisions.len(),
            self.confidence
        );
        for op in decisions.iter().take(SUMMARY_LIMIT) {
            out.push_str(&format!("\n  - {}", op.action));
            if !op.detail.is_empty() {
                out.push_str(&format!(": {}", op.detail));
            }
        }
        if decisions.len() > SUMMARY_LIMIT {
            out.push_str(&format!("\n  ... {} more", decisions.len() - SUMMARY_LIMIT));
        }
        out
    }

    fn render_full(&self) -> String {
        let mut out = format!(
            "Audit trail: {} operation(s) ({:.0}% confidence)",
            self.operations.len(),
            self.confidence
        );
        for (i, op) in self.operations.iter().enumerate() {
            out.push_str(&format!("\n{:>3}. {}", i + 1, op));
        }
        out
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

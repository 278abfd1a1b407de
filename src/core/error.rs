//! Error types for automation control flow.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{MenuContext, MenuKind, TimeoutId};

/// Result type for automation operations.
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Errors surfaced to the caller.
///
/// Classification misses are never errors; these variants are reserved for
/// configuration problems and hard limit violations that need caller-level
/// handling.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Entering another sub-menu would exceed the nesting ceiling.
    #[error("Menu nesting depth {max_depth} exceeded entering {attempted}; human input required")]
    DepthExceeded {
        /// Configured ceiling.
        max_depth: usize,
        /// Kind of sub-menu that could not be entered.
        attempted: MenuKind,
        /// Every active context, outermost first.
        chain: Vec<MenuContext>,
    },

    /// Workflow-level operation ran past its deadline.
    #[error("Workflow operation {id} timed out after {elapsed_secs}s (limit {limit_secs}s)")]
    WorkflowTimeout { id: TimeoutId, elapsed_secs: u64, limit_secs: u64 },

    /// Nested-menu operation ran past its deadline.
    #[error("Nested operation {id} timed out after {elapsed_secs}s (limit {limit_secs}s)")]
    NestedTimeout { id: TimeoutId, elapsed_secs: u64, limit_secs: u64 },

    /// Agent-level operation ran past its deadline.
    #[error("Agent operation {id} timed out after {elapsed_secs}s (limit {limit_secs}s)")]
    AgentTimeout { id: TimeoutId, elapsed_secs: u64, limit_secs: u64 },

    /// Structural or configuration validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Selection confirmed with an option the menu does not offer.
    #[error("Option '{option}' is not offered by this menu (available: {available})")]
    InvalidSelection { option: String, available: String },

    /// Selection is not waiting for confirmation.
    #[error("Selection cannot be confirmed in state {0}")]
    NotAwaitingConfirmation(String),

    /// Memory service failed and degradation was disabled.
    #[error("Memory service unavailable after {attempts} attempt(s): {reason}")]
    MemoryUnavailable { attempts: u32, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AutomationError {
    /// Whether this error requires a human decision before continuing.
    pub fn needs_human_input(&self) -> bool {
        matches!(
            self,
            Self::DepthExceeded { .. }
                | Self::WorkflowTimeout { .. }
                | Self::NestedTimeout { .. }
                | Self::AgentTimeout { .. }
        )
    }

    /// Whether this error is one of the per-level timeout variants.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::WorkflowTimeout { .. } | Self::NestedTimeout { .. } | Self::AgentTimeout { .. }
        )
    }
}

/// A single named validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Field or key the problem refers to.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every violation found during a validation pass, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether any violation names the given field.
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

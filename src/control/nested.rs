//! Nested menu depth tracking.
//!
//! Party Mode and Advanced Elicitation open sub-menus inside an active menu.
//! Each entry pushes a [`MenuContext`] holding the parent's in-flight state so
//! it can be restored verbatim on exit.
//!
//! Not thread-safe. Each workflow session owns its own tracker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{AutomationError, AutomationResult};

/// Default ceiling on simultaneously active contexts.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// What kind of menu a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    Root,
    PartyMode,
    Elicitation,
}

impl MenuKind {
    /// Map a chosen option's label to the sub-menu it opens.
    ///
    /// ```
    /// use bmad_automation::control::MenuKind;
    ///
    /// assert_eq!(MenuKind::from_option_label("Party Mode"), Some(MenuKind::PartyMode));
    /// assert_eq!(MenuKind::from_option_label("Continue"), None);
    /// ```
    pub fn from_option_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("party mode") || label.contains("party-mode") {
            Some(Self::PartyMode)
        } else if label.contains("elicitation") {
            Some(Self::Elicitation)
        } else {
            None
        }
    }
}

impl fmt::Display for MenuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::PartyMode => write!(f, "party mode"),
            Self::Elicitation => write!(f, "advanced elicitation"),
        }
    }
}

/// One active menu level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuContext {
    /// 0-based position in the stack; the root menu is 0
    pub depth: usize,
    pub kind: MenuKind,
    /// Parent's in-flight state, captured on entry
    pub parent_state: serde_json::Value,
}

/// Stack of active menu contexts with a hard ceiling.
#[derive(Debug, Clone)]
pub struct NestedMenuTracker {
    stack: Vec<MenuContext>,
    max_depth: usize,
    halted: bool,
}

impl Default for NestedMenuTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl NestedMenuTracker {
    pub fn new(max_depth: usize) -> Self {
        Self { stack: Vec::new(), max_depth: max_depth.max(1), halted: false }
    }

    /// Enter a menu, capturing the parent's state.
    ///
    /// Pushing past the ceiling does not push. It returns
    /// [`AutomationError::DepthExceeded`] with the full chain and halts the
    /// tracker: every later push fails the same way until
    /// [`acknowledge_escalation`](Self::acknowledge_escalation).
    pub fn enter(
        &mut self,
        kind: MenuKind,
        parent_state: serde_json::Value,
    ) -> AutomationResult<&MenuContext> {
        if self.halted || self.stack.len() >= self.max_depth {
            self.halted = true;
            tracing::warn!(
                max_depth = self.max_depth,
                attempted = %kind,
                chain = %self.describe_chain(),
                "Menu nesting ceiling reached"
            );
            return Err(AutomationError::DepthExceeded {
                max_depth: self.max_depth,
                attempted: kind,
                chain: self.stack.clone(),
            });
        }

        let depth = self.stack.len();
        tracing::debug!(depth, kind = %kind, "Entering menu");
        self.stack.push(MenuContext { depth, kind, parent_state });
        Ok(&self.stack[depth])
    }

    /// Leave the innermost menu, returning its context with the parent state
    /// exactly as captured.
    pub fn exit(&mut self) -> Option<MenuContext> {
        let context = self.stack.pop()?;
        tracing::debug!(depth = context.depth, kind = %context.kind, "Exiting menu");
        Some(context)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn current(&self) -> Option<&MenuContext> {
        self.stack.last()
    }

    /// Active contexts, outermost first.
    pub fn chain(&self) -> &[MenuContext] {
        &self.stack
    }

    /// Whether automatic nesting stopped at the ceiling.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Resume automatic nesting after a human decision.
    pub fn acknowledge_escalation(&mut self) {
        if self.halted {
            tracing::info!(depth = self.stack.len(), "Nesting escalation acknowledged");
        }
        self.halted = false;
    }

    fn describe_chain(&self) -> String {
        self.stack.iter().map(|c| c.kind.to_string()).collect::<Vec<_>>().join(" > ")
    }
}

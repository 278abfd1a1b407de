//! False-positive guards.
//!
//! A candidate that looks like a menu may sit inside a code sample, a quote,
//! an example or a comment. Any triggered guard vetoes the candidate,
//! whatever its confidence score. The chain runs in a fixed order and the
//! first trigger is reported; order only decides which reason is shown.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::patterns::DetectionCandidate;

/// Markers that introduce illustrative rather than live content.
const EXAMPLE_MARKERS: &[&str] = &["example:", "for example", "e.g.", "eg:", "for instance", "sample:"];

/// Individual guard checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// Inside a fenced code block
    CodeBlock,
    /// On a `>` quoted line
    Blockquote,
    /// Preceded by an "example"/"e.g." marker
    ExampleMarker,
    /// Inside an HTML or C-style comment
    Comment,
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeBlock => write!(f, "code block"),
            Self::Blockquote => write!(f, "blockquote"),
            Self::ExampleMarker => write!(f, "example marker"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

/// Outcome of a single guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardVerdict {
    pub guard: GuardKind,
    pub triggered: bool,
    pub reason: String,
}

impl GuardVerdict {
    fn pass(guard: GuardKind) -> Self {
        Self { guard, triggered: false, reason: String::new() }
    }

    fn veto(guard: GuardKind, reason: impl Into<String>) -> Self {
        Self { guard, triggered: true, reason: reason.into() }
    }
}

/// Ordered guard chain.
#[derive(Debug, Clone)]
pub struct GuardChain {
    example_window: usize,
}

impl Default for GuardChain {
    fn default() -> Self {
        Self::new(50)
    }
}

impl GuardChain {
    /// Evaluation order.
    pub const ORDER: [GuardKind; 4] =
        [GuardKind::CodeBlock, GuardKind::Blockquote, GuardKind::ExampleMarker, GuardKind::Comment];

    /// Create a chain looking back `example_window` characters for example markers.
    pub fn new(example_window: usize) -> Self {
        Self { example_window }
    }

    /// Run one guard.
    pub fn check(&self, guard: GuardKind, text: &str, candidate: &DetectionCandidate) -> GuardVerdict {
        let pos = candidate.start().min(text.len());
        match guard {
            GuardKind::CodeBlock => {
                let fences = fences_before(text, pos);
                if fences % 2 == 1 {
                    GuardVerdict::veto(guard, "menu is inside a fenced code block")
                } else {
                    GuardVerdict::pass(guard)
                }
            }
            GuardKind::Blockquote => {
                if first_line(text, pos).trim_start().starts_with('>') {
                    GuardVerdict::veto(guard, "menu is on a blockquote line")
                } else {
                    GuardVerdict::pass(guard)
                }
            }
            GuardKind::ExampleMarker => {
                let haystack = self.example_haystack(text, pos).to_lowercase();
                match EXAMPLE_MARKERS.iter().find(|m| haystack.contains(*m)) {
                    Some(marker) => {
                        GuardVerdict::veto(guard, format!("menu follows example marker '{}'", marker))
                    }
                    None => GuardVerdict::pass(guard),
                }
            }
            GuardKind::Comment => {
                let line = first_line(text, pos).trim_start();
                if line.starts_with("//") {
                    GuardVerdict::veto(guard, "menu is on a line comment")
                } else if unclosed_before(text, pos, "<!--", "-->") {
                    GuardVerdict::veto(guard, "menu is inside an HTML comment")
                } else if unclosed_before(text, pos, "/*", "*/") {
                    GuardVerdict::veto(guard, "menu is inside a block comment")
                } else {
                    GuardVerdict::pass(guard)
                }
            }
        }
    }

    /// First triggered guard, or `None` when the candidate is accepted.
    pub fn evaluate(&self, text: &str, candidate: &DetectionCandidate) -> Option<GuardVerdict> {
        let verdict = Self::ORDER
            .iter()
            .map(|guard| self.check(*guard, text, candidate))
            .find(|v| v.triggered);

        if let Some(ref v) = verdict {
            tracing::debug!(guard = %v.guard, reason = %v.reason, start = candidate.start(), "Guard vetoed menu candidate");
        }
        verdict
    }

    /// Every guard's verdict, in chain order. For diagnostics.
    pub fn evaluate_all(&self, text: &str, candidate: &DetectionCandidate) -> Vec<GuardVerdict> {
        Self::ORDER.iter().map(|guard| self.check(*guard, text, candidate)).collect()
    }

    pub fn accepts(&self, text: &str, candidate: &DetectionCandidate) -> bool {
        self.evaluate(text, candidate).is_none()
    }

    /// Text before the candidate within the window, plus its own line up to the first option.
    fn example_haystack(&self, text: &str, pos: usize) -> String {
        let mut from = pos.saturating_sub(self.example_window);
        while !text.is_char_boundary(from) {
            from -= 1;
        }
        let line = first_line(text, pos);
        let lead_len = line.find(['[', '*']).unwrap_or(0);
        format!("{}{}", &text[from..pos], &line[..lead_len])
    }
}

fn first_line(text: &str, pos: usize) -> &str {
    let rest = &text[pos..];
    rest.split('\n').next().unwrap_or(rest)
}

fn fences_before(text: &str, pos: usize) -> usize {
    text[..pos]
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            line.starts_with("```") || line.starts_with("~~~")
        })
        .count()
}

fn unclosed_before(text: &str, pos: usize, open: &str, close: &str) -> bool {
    let before = &text[..pos];
    match before.rfind(open) {
        Some(idx) => !before[idx + open.len()..].contains(close),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::patterns::detect_menus;

    fn first_candidate(text: &str) -> DetectionCandidate {
        detect_menus(text).into_iter().next().expect("menu detected")
    }

    #[test]
    fn test_plain_menu_accepted() {
        let text = "Review the draft.\n\n[A] Advanced [P] Party [C] Continue";
        let chain = GuardChain::default();
        assert!(chain.accepts(text, &first_candidate(text)));
    }

    #[test]
    fn test_code_block_vetoes() {
        let text = "Menus look like this:\n```\n[A] Advanced [P] Party [C] Continue\n```\n";
        let verdict = GuardChain::default().evaluate(text, &first_candidate(text)).unwrap();

        assert_eq!(verdict.guard, GuardKind::CodeBlock);
        assert!(verdict.triggered);
    }

    #[test]
    fn test_after_closed_fence_accepted() {
        let text = "```\nlet x = 1;\n```\n[A] Advanced [P] Party [C] Continue";
        assert!(GuardChain::default().accepts(text, &first_candidate(text)));
    }

    #[test]
    fn test_blockquote_vetoes() {
        let text = "The agent said:\n> [A] Advanced [P] Party [C] Continue";
        let verdict = GuardChain::default().evaluate(text, &first_candidate(text)).unwrap();
        assert_eq!(verdict.guard, GuardKind::Blockquote);
    }

    #[test]
    fn test_example_marker_vetoes() {
        let text = "For example, a menu:\n[Y] Yes [V] View [N] No";
        let verdict = GuardChain::default().evaluate(text, &first_candidate(text)).unwrap();
        assert_eq!(verdict.guard, GuardKind::ExampleMarker);

        let text = "e.g. [Y] Yes [V] View [N] No";
        let verdict = GuardChain::default().evaluate(text, &first_candidate(text)).unwrap();
        assert_eq!(verdict.guard, GuardKind::ExampleMarker);
    }

    #[test]
    fn test_example_marker_outside_window() {
        let filler = "x".repeat(80);
        let text = format!("Example: see below.\n{}\n[Y] Yes [V] View [N] No", filler);
        assert!(GuardChain::new(50).accepts(&text, &first_candidate(&text)));
    }

    #[test]
    fn test_comment_vetoes() {
        let text = "<!-- template\n[A] Advanced [P] Party [C] Continue\n-->";
        let verdict = GuardChain::default().evaluate(text, &first_candidate(text)).unwrap();
        assert_eq!(verdict.guard, GuardKind::Comment);

        let text = "// [A] Advanced [P] Party [C] Continue";
        let verdict = GuardChain::default().evaluate(text, &first_candidate(text)).unwrap();
        assert_eq!(verdict.guard, GuardKind::Comment);
    }

    #[test]
    fn test_first_trigger_reported() {
        // Inside a fence and quoted: the code block guard runs first
        let text = "```\n> [A] Advanced [P] Party [C] Continue\n```";
        let chain = GuardChain::default();
        let candidate = first_candidate(text);

        assert_eq!(chain.evaluate(text, &candidate).unwrap().guard, GuardKind::CodeBlock);

        let all = chain.evaluate_all(text, &candidate);
        assert_eq!(all.len(), 4);
        assert!(all[0].triggered && all[1].triggered);
        assert!(!all[3].triggered);
    }
}

//! Confidence scoring for accepted menu candidates.
//!
//! Four sub-scores, each against a fixed rubric:
//!
//! | Signal           | Range | Full marks                                   |
//! |------------------|-------|----------------------------------------------|
//! | structural       | 0-30  | consistent brackets, labelled, tidy layout   |
//! | position         | 0-20  | last thing in the output, on its own line    |
//! | option count     | 0-20  | 2-4 options                                  |
//! | pattern strength | 0-30  | exact canonical form (`[A][P][C]`, `[Y][V][N]`) |
//!
//! A numbered list only earns pattern strength when a selection cue sits next
//! to it: a lead-in question or "choose/select" line, or a trailing prompt.
//! An uncued list stays below the auto-select threshold.
//!
//! The total is clamped to 0-100. Scoring is deterministic.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::patterns::{DetectionCandidate, MenuLayout, MenuType};

pub const STRUCTURAL_MAX: u8 = 30;
pub const POSITION_MAX: u8 = 20;
pub const OPTION_COUNT_MAX: u8 = 20;
pub const PATTERN_STRENGTH_MAX: u8 = 30;

/// Trailing text shorter than this still counts as "near the end" (a prompt line).
const TRAILING_PROMPT_MAX: usize = 80;

/// Lines that ask the reader to pick something.
static SELECTION_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:choose|select|pick|which|options?|would you like|want to)\b|\?[ \t*_]*$")
        .expect("valid regex")
});

/// Confidence that a candidate is a live, actionable menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub structural: u8,
    pub position: u8,
    pub option_count: u8,
    pub pattern_strength: u8,
}

impl ConfidenceScore {
    /// Sum of the sub-scores, clamped to 0-100.
    pub fn total(&self) -> u8 {
        let sum = u16::from(self.structural)
            + u16::from(self.position)
            + u16::from(self.option_count)
            + u16::from(self.pattern_strength);
        sum.min(100) as u8
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.total())
    }
}

impl fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (structural {}/{}, position {}/{}, options {}/{}, pattern {}/{})",
            self.total(),
            self.structural,
            STRUCTURAL_MAX,
            self.position,
            POSITION_MAX,
            self.option_count,
            OPTION_COUNT_MAX,
            self.pattern_strength,
            PATTERN_STRENGTH_MAX
        )
    }
}

/// Score a candidate against the text it was found in.
pub fn score(text: &str, candidate: &DetectionCandidate) -> ConfidenceScore {
    ConfidenceScore {
        structural: structural_score(candidate).min(STRUCTURAL_MAX),
        position: position_score(text, candidate).min(POSITION_MAX),
        option_count: option_count_score(candidate.options().len()).min(OPTION_COUNT_MAX),
        pattern_strength: pattern_strength_score(text, candidate).min(PATTERN_STRENGTH_MAX),
    }
}

fn structural_score(candidate: &DetectionCandidate) -> u8 {
    let options = candidate.options();
    let base = if candidate.menu_type() == MenuType::Numbered { 5 } else { 10 };

    let labelled = options.iter().filter(|o| !o.label.is_empty()).count();
    let labels = if labelled == options.len() {
        10
    } else if labelled > 0 {
        5
    } else {
        0
    };

    let line_count = candidate.raw().lines().count();
    let layout = match candidate.layout() {
        MenuLayout::Inline => 10,
        MenuLayout::Vertical if line_count == options.len() => 10,
        MenuLayout::Vertical => 5,
    };

    base + labels + layout
}

fn position_score(text: &str, candidate: &DetectionCandidate) -> u8 {
    let trailing = text.get(candidate.end()..).unwrap_or("").trim();
    let at_end = if trailing.is_empty() {
        12
    } else if !trailing.contains('\n') && trailing.len() <= TRAILING_PROMPT_MAX {
        6
    } else {
        0
    };

    let first = candidate.raw().trim_start();
    let own_line = if first.starts_with('[')
        || first.starts_with('*')
        || first.starts_with('/')
        || first.starts_with(|c: char| c.is_ascii_digit())
    {
        8
    } else {
        3
    };

    at_end + own_line
}

fn option_count_score(count: usize) -> u8 {
    match count {
        0 => 0,
        1 => 5,
        2..=4 => 20,
        5..=6 => 15,
        7..=9 => 10,
        _ => 5,
    }
}

/// Whether the line before the candidate, or the prompt line after it, asks
/// for a choice.
fn has_selection_cue(text: &str, candidate: &DetectionCandidate) -> bool {
    let before = text.get(..candidate.start()).unwrap_or("");
    let lead_in = before.lines().rev().map(str::trim).find(|l| !l.is_empty());
    let after = text.get(candidate.end()..).unwrap_or("");
    let prompt = after.lines().map(str::trim).find(|l| !l.is_empty());

    lead_in.into_iter().chain(prompt).any(|line| SELECTION_CUE.is_match(line))
}

fn pattern_strength_score(text: &str, candidate: &DetectionCandidate) -> u8 {
    match candidate.menu_type() {
        MenuType::Apc | MenuType::Yvn => {
            let exact_case = candidate
                .options()
                .iter()
                .all(|o| candidate.raw().contains(&format!("[{}]", o.key)));
            if exact_case {
                30
            } else {
                25
            }
        }
        MenuType::Bracketed => 20,
        MenuType::Numbered => {
            let sequential = candidate
                .options()
                .iter()
                .enumerate()
                .all(|(i, o)| o.key.parse::<usize>().map_or(false, |n| n == i + 1));
            match (sequential, has_selection_cue(text, candidate)) {
                (true, true) => 20,
                (false, true) => 10,
                (true, false) => 5,
                (false, false) => 0,
            }
        }
        MenuType::Exit => 15,
    }
}

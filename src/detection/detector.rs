//! Detection pipeline: match, guard, score.

use serde::{Deserialize, Serialize};

use super::confidence::{self, ConfidenceScore};
use super::guards::{GuardChain, GuardVerdict};
use super::patterns::{detect_menus, DetectionCandidate};
use crate::core::GuardConfig;

/// A candidate that passed every guard, with its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: DetectionCandidate,
    pub score: ConfidenceScore,
}

/// A candidate vetoed by a guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub candidate: DetectionCandidate,
    pub verdict: GuardVerdict,
}

/// Everything found in one output block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub accepted: Vec<ScoredCandidate>,
    pub rejected: Vec<RejectedCandidate>,
}

impl DetectionReport {
    /// No menu survived the guards.
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Highest-scoring accepted candidate; the later one wins a tie.
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.accepted.iter().fold(None, |best: Option<&ScoredCandidate>, c| match best {
            Some(b) if b.score.total() > c.score.total() => Some(b),
            _ => Some(c),
        })
    }
}

/// Runs the pattern matcher, guard chain and scorer over output text.
#[derive(Debug, Clone, Default)]
pub struct MenuDetector {
    guards: GuardChain,
}

impl MenuDetector {
    pub fn new(guards: GuardChain) -> Self {
        Self { guards }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(GuardChain::new(config.example_window))
    }

    pub fn guards(&self) -> &GuardChain {
        &self.guards
    }

    /// Detect, guard and score every menu in `text`.
    ///
    /// Vetoed candidates are never scored.
    pub fn analyze(&self, text: &str) -> DetectionReport {
        let mut report = DetectionReport::default();

        for candidate in detect_menus(text) {
            match self.guards.evaluate(text, &candidate) {
                Some(verdict) => report.rejected.push(RejectedCandidate { candidate, verdict }),
                None => {
                    let score = confidence::score(text, &candidate);
                    tracing::debug!(
                        menu_type = %candidate.menu_type(),
                        options = candidate.options().len(),
                        score = score.total(),
                        "Scored menu candidate"
                    );
                    report.accepted.push(ScoredCandidate { candidate, score });
                }
            }
        }

        report
    }
}

//! Menu and verdict detection in agent output.
//!
//! raw text → pattern matcher → guard chain (reject early) → confidence scorer.

mod confidence;
mod detector;
mod guards;
mod patterns;

pub use confidence::{
    score, ConfidenceScore, OPTION_COUNT_MAX, PATTERN_STRENGTH_MAX, POSITION_MAX, STRUCTURAL_MAX,
};
pub use detector::{DetectionReport, MenuDetector, RejectedCandidate, ScoredCandidate};
pub use guards::{GuardChain, GuardKind, GuardVerdict};
pub use patterns::{
    detect_checklist, detect_menus, detect_verdict, is_continue_prompt, ChecklistItem,
    ChecklistSummary, DetectionCandidate, MenuLayout, MenuOption, MenuType, Verdict,
    VerdictCounts, VerdictMatch,
};

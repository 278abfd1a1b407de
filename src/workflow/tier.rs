//! Project tier classification.
//!
//! Tiers 0-4 scale human oversight: tier 0 is a one-story fix, tier 4 an
//! enterprise effort that checkpoints after every operation. A known story
//! count decides the tier outright; otherwise keyword signals in the
//! project description do.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::BatchConfig;

/// Tier used when nothing in the input points anywhere.
const FALLBACK_TIER: ProjectTier = ProjectTier::Medium;

static SIGNALS: Lazy<Vec<(ProjectTier, Regex)>> = Lazy::new(|| {
    [
        (ProjectTier::Enterprise, r"enterprise|compliance|regulatory|multi-tenant|audit(?:ing)?"),
        (ProjectTier::Complex, r"platform|integrations?|microservices?|migration|architecture"),
        (ProjectTier::Medium, r"features?|modules?|services?|dashboard|api"),
        (ProjectTier::Small, r"small|enhancements?|tweaks?|improvements?|minor"),
        (ProjectTier::Atomic, r"fix(?:es)?|typos?|bug|hotfix|patch"),
    ]
    .into_iter()
    .map(|(tier, words)| {
        (tier, Regex::new(&format!(r"(?i)\b(?:{})\b", words)).expect("valid regex"))
    })
    .collect()
});

/// Project complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectTier {
    /// Tier 0: a single atomic change
    Atomic,
    /// Tier 1: a small enhancement
    Small,
    /// Tier 2: a feature or module
    Medium,
    /// Tier 3: a platform or integration effort
    Complex,
    /// Tier 4: enterprise scale
    Enterprise,
}

impl ProjectTier {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Atomic => 0,
            Self::Small => 1,
            Self::Medium => 2,
            Self::Complex => 3,
            Self::Enterprise => 4,
        }
    }

    pub fn from_u8(tier: u8) -> Option<Self> {
        match tier {
            0 => Some(Self::Atomic),
            1 => Some(Self::Small),
            2 => Some(Self::Medium),
            3 => Some(Self::Complex),
            4 => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Tier implied by a story count.
    pub fn from_story_count(stories: u32) -> Self {
        match stories {
            0..=1 => Self::Atomic,
            2..=10 => Self::Small,
            11..=15 => Self::Medium,
            16..=40 => Self::Complex,
            _ => Self::Enterprise,
        }
    }

    /// Operations per checkpoint for this tier.
    pub fn batch_size(self, config: &BatchConfig) -> usize {
        config.size_for_tier(self.as_u8())
    }

    fn name(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Complex => "complex",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for ProjectTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} ({})", self.as_u8(), self.name())
    }
}

/// What decided the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBasis {
    StoryCount,
    Keywords,
    Fallback,
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierClassification {
    pub tier: ProjectTier,
    pub basis: TierBasis,
    /// Matched keywords, lowercased, in description order
    pub signals: Vec<String>,
    /// 0-100
    pub confidence: f64,
}

/// Classify a project from its description and an optional story count.
///
/// ```
/// use bmad_automation::workflow::{classify_tier, ProjectTier};
///
/// assert_eq!(classify_tier("fix a typo in the README", None).tier, ProjectTier::Atomic);
/// assert_eq!(classify_tier("anything", Some(25)).tier, ProjectTier::Complex);
/// ```
pub fn classify_tier(description: &str, stories: Option<u32>) -> TierClassification {
    let mut matches: Vec<(usize, ProjectTier, String)> = SIGNALS
        .iter()
        .flat_map(|(tier, re)| {
            re.find_iter(description).map(move |m| (m.start(), *tier, m.as_str().to_lowercase()))
        })
        .collect();
    matches.sort_by_key(|(start, _, _)| *start);
    let signals: Vec<String> = matches.iter().map(|(_, _, word)| word.clone()).collect();

    let classification = if let Some(count) = stories {
        TierClassification {
            tier: ProjectTier::from_story_count(count),
            basis: TierBasis::StoryCount,
            signals,
            confidence: 95.0,
        }
    } else if let Some(tier) = matches.iter().map(|(_, tier, _)| *tier).max() {
        let agreeing = matches.iter().filter(|(_, t, _)| *t == tier).count();
        TierClassification {
            tier,
            basis: TierBasis::Keywords,
            signals,
            confidence: (50.0 + 10.0 * agreeing as f64).min(85.0),
        }
    } else {
        TierClassification { tier: FALLBACK_TIER, basis: TierBasis::Fallback, signals, confidence: 30.0 }
    };

    tracing::debug!(
        tier = classification.tier.as_u8(),
        basis = ?classification.basis,
        signals = ?classification.signals,
        "Classified project tier"
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_count_boundaries() {
        let tiers: Vec<u8> = [0, 1, 2, 10, 11, 15, 16, 40, 41, 500]
            .into_iter()
            .map(|n| ProjectTier::from_story_count(n).as_u8())
            .collect();
        assert_eq!(tiers, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn test_story_count_wins_over_keywords() {
        let c = classify_tier("enterprise compliance platform", Some(3));
        assert_eq!(c.tier, ProjectTier::Small);
        assert_eq!(c.basis, TierBasis::StoryCount);
        assert_eq!(c.signals, vec!["enterprise", "compliance", "platform"]);
    }

    #[test]
    fn test_highest_keyword_tier_wins() {
        let c = classify_tier("Add a dashboard feature with SOC audit and compliance reports", None);
        assert_eq!(c.tier, ProjectTier::Enterprise);
        assert_eq!(c.basis, TierBasis::Keywords);
        assert_eq!(c.confidence, 70.0);
    }

    #[test]
    fn test_word_boundaries() {
        // "prefix" must not count as "fix"
        let c = classify_tier("rename the prefix option", None);
        assert_eq!(c.basis, TierBasis::Fallback);
        assert_eq!(c.tier, ProjectTier::Medium);
    }

    #[test]
    fn test_batch_size_follows_tier() {
        let config = BatchConfig::default();
        assert_eq!(ProjectTier::Atomic.batch_size(&config), 10);
        assert_eq!(ProjectTier::Enterprise.batch_size(&config), 1);
    }

    #[test]
    fn test_round_trip_u8() {
        for n in 0..=4 {
            assert_eq!(ProjectTier::from_u8(n).unwrap().as_u8(), n);
        }
        assert!(ProjectTier::from_u8(5).is_none());
    }
}

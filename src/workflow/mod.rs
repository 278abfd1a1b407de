//! Workflow definitions and project tiers.
//!
//! - `WorkflowDefinition` - YAML front matter with required config and inputs
//! - `classify_tier` - Project tier (0-4) from story count or description

mod frontmatter;
mod tier;

pub use frontmatter::WorkflowDefinition;
pub use tier::{classify_tier, ProjectTier, TierBasis, TierClassification};

//! Operation batching between checkpoints.
//!
//! Coarser tiers run more operations per checkpoint; the most rigorous tier
//! checkpoints after every operation. A continue menu in an operation's
//! output forces a checkpoint regardless of the count.
//!
//! Not thread-safe. Each workflow session owns its own tracker.

use serde::{Deserialize, Serialize};

use crate::core::BatchConfig;
use crate::detection::is_continue_prompt;

/// Why a checkpoint was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTrigger {
    /// The batch filled up
    BatchFull,
    /// A continue prompt appeared in the output
    ContinuePrompt,
    /// Requested by the caller
    Manual,
}

/// Emitted when a batch closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    /// 1-based batch number within the session
    pub batch: usize,
    /// Operations completed in this batch
    pub operations: usize,
    pub trigger: CheckpointTrigger,
}

/// Counts completed operations against the tier's batch size.
#[derive(Debug, Clone)]
pub struct BatchTracker {
    tier: u8,
    size: usize,
    count: usize,
    batches: usize,
}

impl BatchTracker {
    pub fn new(tier: u8, config: &BatchConfig) -> Self {
        Self { tier, size: config.size_for_tier(tier), count: 0, batches: 0 }
    }

    pub fn tier(&self) -> u8 {
        self.tier
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Operations completed since the last checkpoint.
    pub fn pending(&self) -> usize {
        self.count
    }

    /// Checkpoints emitted so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Count one completed operation given its output.
    pub fn record(&mut self, output: &str) -> Option<BatchCheckpoint> {
        self.count += 1;

        if is_continue_prompt(output) {
            return Some(self.emit(CheckpointTrigger::ContinuePrompt));
        }
        if self.count >= self.size {
            return Some(self.emit(CheckpointTrigger::BatchFull));
        }
        None
    }

    /// Close the current batch early. `None` when nothing is pending.
    pub fn flush(&mut self) -> Option<BatchCheckpoint> {
        (self.count > 0).then(|| self.emit(CheckpointTrigger::Manual))
    }

    fn emit(&mut self, trigger: CheckpointTrigger) -> BatchCheckpoint {
        self.batches += 1;
        let checkpoint = BatchCheckpoint { batch: self.batches, operations: self.count, trigger };
        tracing::debug!(
            tier = self.tier,
            batch = checkpoint.batch,
            operations = checkpoint.operations,
            trigger = ?trigger,
            "Batch checkpoint"
        );
        self.count = 0;
        checkpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_sizes() {
        let config = BatchConfig::default();
        let sizes: Vec<_> = (0..=4).map(|t| BatchTracker::new(t, &config).size()).collect();
        assert_eq!(sizes, vec![10, 5, 3, 2, 1]);
        assert_eq!(BatchTracker::new(9, &config).size(), 1);
    }

    #[test]
    fn test_checkpoint_on_full_batch_and_reset() {
        let mut batch = BatchTracker::new(2, &BatchConfig::default());
        assert!(batch.record("wrote file a").is_none());
        assert!(batch.record("wrote file b").is_none());

        let checkpoint = batch.record("wrote file c").unwrap();
        assert_eq!(checkpoint.operations, 3);
        assert_eq!(checkpoint.trigger, CheckpointTrigger::BatchFull);
        assert_eq!(batch.pending(), 0);
        assert_eq!(batch.batches(), 1);
    }

    #[test]
    fn test_continue_prompt_forces_checkpoint() {
        let mut batch = BatchTracker::new(0, &BatchConfig::default());
        let checkpoint = batch
            .record("Section drafted.\n[A] Advanced Elicitation [P] Party Mode [C] Continue")
            .unwrap();
        assert_eq!(checkpoint.trigger, CheckpointTrigger::ContinuePrompt);
        assert_eq!(checkpoint.operations, 1);
    }

    #[test]
    fn test_checked_continue_item_does_not_force_checkpoint() {
        let mut batch = BatchTracker::new(0, &BatchConfig::default());
        assert!(batch.record("Progress:\n- [x] Continue drafting epics section").is_none());
        assert_eq!(batch.pending(), 1);
    }

    #[test]
    fn test_most_rigorous_tier_checkpoints_every_operation() {
        let mut batch = BatchTracker::new(4, &BatchConfig::default());
        assert!(batch.record("one").is_some());
        assert!(batch.record("two").is_some());
        assert_eq!(batch.batches(), 2);
    }

    #[test]
    fn test_flush() {
        let mut batch = BatchTracker::new(0, &BatchConfig::default());
        assert!(batch.flush().is_none());
        batch.record("op");
        assert_eq!(batch.flush().unwrap().trigger, CheckpointTrigger::Manual);
    }
}

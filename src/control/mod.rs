//! Workflow control flow bookkeeping.
//!
//! Nested menu depth, per-level timeouts, batching, and checkpoint
//! presentation. Every tracker here holds mutable per-session state and is
//! not thread-safe; one instance per workflow run.

mod batch;
mod checkpoint;
mod nested;
mod timeout;

pub use batch::{BatchCheckpoint, BatchTracker, CheckpointTrigger};
pub use checkpoint::{Checkpoint, CheckpointFormat, LoggedOperation, EXPAND_AFFORDANCE};
pub use nested::{MenuContext, MenuKind, NestedMenuTracker, DEFAULT_MAX_DEPTH};
pub use timeout::{
    PreservedState, TimeoutId, TimeoutLevel, TimeoutState, TimeoutStatus, TimeoutTracker,
};

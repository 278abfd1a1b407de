//! Bridge to an external long-term memory service.
//!
//! ## Features
//!
//! - Schema limits enforced on every saved entry
//! - Availability check before each read and write
//! - Fixed-backoff retry, then graceful degradation
//! - FIFO pending queue drained when the service returns
//! - Exact-content duplicate suppression

mod bridge;
mod entry;
mod queue;
mod service;

pub use bridge::{MemoryBridge, QueryOutcome, SaveOutcome};
pub use entry::{
    truncate_chars, truncate_content, MemoryEntry, MAX_CONTENT_CHARS, MAX_CONTEXT_CHARS,
    MAX_IMPORTANCE, MAX_KEYWORDS, MAX_TAGS, MAX_TITLE_CHARS, MIN_IMPORTANCE,
};
pub use queue::PendingQueue;
pub use service::{InMemoryService, MemoryError, MemoryService};

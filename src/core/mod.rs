//! Core types shared across the automation modules.
//!
//! Configuration, the error taxonomy, retry policy, time sources, and the
//! per-session file store.

mod clock;
mod config;
mod error;
mod retry;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BatchConfig, CacheConfig, Config, EscalationConfig, GuardConfig, MemoryConfig, NestingConfig,
    SelectionConfig, TimeoutConfig, CONFIG_ENV_VAR, LOCAL_CONFIG_FILE,
};
pub use error::{AutomationError, AutomationResult, ValidationFailure, Violation};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use store::{PreloadCache, SessionStore, StoredBlob};

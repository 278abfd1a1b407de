//! Configuration management for BMAD automation.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ValidationFailure;
use super::retry::RetryConfig;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "BMAD_AUTOMATION_CONFIG";

/// Local config file name, looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".bmad-automation.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Confidence tiers and selection history
    pub selection: SelectionConfig,

    /// False-positive guard settings
    pub guards: GuardConfig,

    /// Nested menu ceiling
    pub nesting: NestingConfig,

    /// Per-level timeout durations
    pub timeouts: TimeoutConfig,

    /// Tier to batch size table
    pub batch: BatchConfig,

    /// BMB escalation thresholds
    pub escalation: EscalationConfig,

    /// Memory service bridge
    pub memory: MemoryConfig,

    /// Persisted history and preload cache
    pub cache: CacheConfig,
}

/// Confidence thresholds for the menu selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Scores at or above this are auto-selected
    pub high_threshold: f64,

    /// Scores at or above this (and below high) are recommended
    pub medium_threshold: f64,

    /// Maximum selection records kept per session
    pub history_size: usize,
}

/// False-positive guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// How many characters before a candidate are searched for example markers
    pub example_window: usize,
}

/// Nested menu settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestingConfig {
    /// Maximum number of simultaneously active menu contexts
    pub max_depth: usize,
}

/// Timeout ceilings in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole workflow run
    pub workflow_secs: u64,

    /// A nested sub-menu (Party Mode, Advanced Elicitation)
    pub nested_secs: u64,

    /// A single agent invocation
    pub agent_secs: u64,
}

/// Batch sizes indexed by project tier (0-4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Operations per checkpoint for tiers 0 through 4
    pub sizes: [usize; 5],
}

/// Thresholds that force escalation before confidence routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Escalate when blocking errors exceed this
    pub max_blocking_errors: u32,

    /// Escalate when major issues exceed this
    pub max_major_issues: u32,

    /// Escalate when compliance falls below this
    pub min_compliance_score: f64,
}

/// Memory service bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Total attempts per call, including the first
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    pub backoff_ms: u64,

    /// Maximum pending saves held while the service is unavailable
    pub queue_size: usize,

    /// Return errors instead of degrading after retries are exhausted
    pub strict: bool,

    /// Project identifiers attached to every saved entry
    pub project_ids: Vec<String>,
}

/// Persisted history and preload cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for per-session files (supports `~` and env vars)
    pub dir: Option<String>,

    /// Time-to-live for cached entries in seconds
    pub ttl_secs: u64,
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// Looks for config in:
    /// 1. The file named by `BMAD_AUTOMATION_CONFIG`
    /// 2. `.bmad-automation.toml` in current directory
    /// 3. `~/.config/bmad-automation/config.toml`
    /// 4. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
            if !explicit.trim().is_empty() {
                return Self::load_from_file(Path::new(explicit.trim()));
            }
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to the global config file, returning its path.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        let path = dir.join("config.toml");
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bmad-automation"))
    }

    /// Get the data directory path (for history, cache, etc.).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("bmad-automation"))
    }

    /// Check for values that cannot work together, reporting all of them.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let mut failure = ValidationFailure::new();
        let sel = &self.selection;

        if !(0.0..=100.0).contains(&sel.high_threshold) {
            failure.push("selection.high_threshold", "must be within 0-100");
        }
        if !(0.0..=100.0).contains(&sel.medium_threshold) {
            failure.push("selection.medium_threshold", "must be within 0-100");
        }
        if sel.medium_threshold > sel.high_threshold {
            failure.push("selection.medium_threshold", "must not exceed high_threshold");
        }
        if sel.history_size == 0 {
            failure.push("selection.history_size", "must be at least 1");
        }
        if self.nesting.max_depth == 0 {
            failure.push("nesting.max_depth", "must be at least 1");
        }
        for (field, secs) in [
            ("timeouts.workflow_secs", self.timeouts.workflow_secs),
            ("timeouts.nested_secs", self.timeouts.nested_secs),
            ("timeouts.agent_secs", self.timeouts.agent_secs),
        ] {
            if secs == 0 {
                failure.push(field, "must be greater than zero");
            }
        }
        for (tier, size) in self.batch.sizes.iter().enumerate() {
            if *size == 0 {
                failure.push(format!("batch.sizes[{}]", tier), "batch size must be at least 1");
            }
        }
        if self.memory.max_attempts == 0 {
            failure.push("memory.max_attempts", "must be at least 1");
        }
        if self.memory.queue_size == 0 {
            failure.push("memory.queue_size", "must be at least 1");
        }

        failure.into_result()
    }
}

impl TimeoutConfig {
    pub fn workflow(&self) -> Duration {
        Duration::from_secs(self.workflow_secs)
    }

    pub fn nested(&self) -> Duration {
        Duration::from_secs(self.nested_secs)
    }

    pub fn agent(&self) -> Duration {
        Duration::from_secs(self.agent_secs)
    }
}

impl BatchConfig {
    /// Batch size for a tier; unknown tiers fall back to a checkpoint per operation.
    pub fn size_for_tier(&self, tier: u8) -> usize {
        self.sizes.get(usize::from(tier)).copied().unwrap_or(1).max(1)
    }
}

impl MemoryConfig {
    /// Retry policy derived from the attempt count and backoff.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::fixed(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

impl CacheConfig {
    /// Resolved cache directory, expanding `~` and environment variables.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        match &self.dir {
            Some(dir) => shellexpand::full(dir)
                .ok()
                .map(|expanded| PathBuf::from(expanded.as_ref())),
            None => Config::data_dir().map(|d| d.join("sessions")),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { high_threshold: 80.0, medium_threshold: 50.0, history_size: 100 }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { example_window: 50 }
    }
}

impl Default for NestingConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { workflow_secs: 1800, nested_secs: 300, agent_secs: 60 }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { sizes: [10, 5, 3, 2, 1] }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { max_blocking_errors: 3, max_major_issues: 5, min_compliance_score: 70.0 }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
            queue_size: 100,
            strict: false,
            project_ids: Vec::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: None, ttl_secs: 3600 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.selection.high_threshold, 80.0);
        assert_eq!(config.selection.medium_threshold, 50.0);
        assert_eq!(config.nesting.max_depth, 3);
        assert_eq!(config.timeouts.workflow_secs, 1800);
        assert_eq!(config.timeouts.nested_secs, 300);
        assert_eq!(config.timeouts.agent_secs, 60);
        assert_eq!(config.batch.size_for_tier(4), 1);
        assert_eq!(config.batch.size_for_tier(0), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
[selection]
high_threshold = 90.0

[nesting]
max_depth = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.selection.high_threshold, 90.0);
        assert_eq!(config.selection.medium_threshold, 50.0);
        assert_eq!(config.nesting.max_depth, 2);
        assert_eq!(config.timeouts.agent_secs, 60);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = Config::default();
        config.selection.medium_threshold = 95.0;
        config.nesting.max_depth = 0;
        config.timeouts.agent_secs = 0;

        let failure = config.validate().unwrap_err();
        assert_eq!(failure.len(), 3);
        assert!(failure.mentions("selection.medium_threshold"));
        assert!(failure.mentions("nesting.max_depth"));
        assert!(failure.mentions("timeouts.agent_secs"));
    }

    #[test]
    fn test_unknown_tier_falls_back_to_one() {
        let config = BatchConfig::default();
        assert_eq!(config.size_for_tier(9), 1);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[memory]\nmax_attempts = 5\nstrict = true\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.memory.max_attempts, 5);
        assert!(config.memory.strict);
        assert_eq!(config.memory.retry_config().max_attempts, 5);
    }

    #[test]
    fn test_save_to_creates_parent_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.timeouts.nested_secs = 120;
        config.save_to(&path).unwrap();

        let back = Config::load_from_file(&path).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.timeouts.nested(), Duration::from_secs(120));
    }

    #[test]
    fn test_cache_dir_expansion() {
        let cache = CacheConfig { dir: Some("/tmp/bmad-cache".to_string()), ttl_secs: 10 };
        assert_eq!(cache.resolved_dir(), Some(PathBuf::from("/tmp/bmad-cache")));
        assert_eq!(cache.ttl(), Duration::from_secs(10));
    }
}

//! Flat per-session file store.
//!
//! Each session gets one JSON file per namespace (selection history,
//! preload cache). Files record their creation time and a time-to-live;
//! expiry is checked on read and expired files are never swept.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::error::AutomationResult;

/// A stored value with its creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBlob<T> {
    /// Session the blob belongs to
    pub session_id: String,
    /// When the blob was written
    pub created_at: DateTime<Utc>,
    /// Time-to-live in seconds
    pub ttl_secs: u64,
    /// Payload
    pub data: T,
}

impl<T> StoredBlob<T> {
    /// Whether the blob has outlived its TTL at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() >= i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)
    }
}

/// Key-value blob store keyed by session identifier.
#[derive(Debug)]
pub struct SessionStore<C: Clock = SystemClock> {
    root: PathBuf,
    ttl: Duration,
    clock: C,
}

impl SessionStore<SystemClock> {
    /// Create a store rooted at `root` using system time.
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(root, ttl, SystemClock)
    }

    /// Store rooted at the configured cache directory, if one resolves.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.resolved_dir().map(|dir| Self::new(dir, config.ttl()))
    }
}

impl<C: Clock> SessionStore<C> {
    /// Create a store with an explicit clock.
    pub fn with_clock(root: impl Into<PathBuf>, ttl: Duration, clock: C) -> Self {
        Self { root: root.into(), ttl, clock }
    }

    /// Directory holding the session files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a session and namespace.
    ///
    /// Session identifiers are hashed so arbitrary ids map to safe file names.
    pub fn path_for(&self, session_id: &str, namespace: &str) -> PathBuf {
        let digest = Sha256::digest(session_id.as_bytes());
        let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
        self.root.join(format!("{}-{}.json", namespace, hex))
    }

    /// Write a value, replacing any previous blob for the session.
    pub fn put<T: Serialize>(
        &self,
        session_id: &str,
        namespace: &str,
        data: &T,
    ) -> AutomationResult<PathBuf> {
        fs::create_dir_all(&self.root)?;

        let blob = StoredBlob {
            session_id: session_id.to_string(),
            created_at: self.clock.now(),
            ttl_secs: self.ttl.as_secs(),
            data,
        };
        let path = self.path_for(session_id, namespace);
        fs::write(&path, serde_json::to_string_pretty(&blob)?)?;

        tracing::debug!(session = session_id, namespace, path = %path.display(), "Stored session blob");
        Ok(path)
    }

    /// Read a value if present and not expired.
    pub fn get<T: DeserializeOwned>(
        &self,
        session_id: &str,
        namespace: &str,
    ) -> AutomationResult<Option<T>> {
        let path = self.path_for(session_id, namespace);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let blob: StoredBlob<T> = serde_json::from_str(&content)?;
        if blob.is_expired(self.clock.now()) {
            tracing::debug!(session = session_id, namespace, "Session blob expired");
            return Ok(None);
        }

        Ok(Some(blob.data))
    }

    /// Remove a stored blob. Returns whether a file was deleted.
    pub fn remove(&self, session_id: &str, namespace: &str) -> AutomationResult<bool> {
        match fs::remove_file(self.path_for(session_id, namespace)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Cached preload results for a session (e.g. memory queries run up front).
#[derive(Debug)]
pub struct PreloadCache<C: Clock = SystemClock> {
    store: SessionStore<C>,
}

impl<C: Clock> PreloadCache<C> {
    const NAMESPACE: &'static str = "preload";

    pub fn new(store: SessionStore<C>) -> Self {
        Self { store }
    }

    /// Cache preload results for a session.
    pub fn store<T: Serialize>(&self, session_id: &str, results: &T) -> AutomationResult<()> {
        self.store.put(session_id, Self::NAMESPACE, results).map(|_| ())
    }

    /// Cached results, if still fresh.
    pub fn load<T: DeserializeOwned>(&self, session_id: &str) -> AutomationResult<Option<T>> {
        self.store.get(session_id, Self::NAMESPACE)
    }

    pub fn invalidate(&self, session_id: &str) -> AutomationResult<bool> {
        self.store.remove(session_id, Self::NAMESPACE)
    }
}

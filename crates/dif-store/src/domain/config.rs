//! # Store Configuration
//!
//! Configuration values for the Dif Store and the backend URL that selects
//! the backing document database.
//!
//! All values have defaults; a JSON document may override any subset, and
//! `DIFSTORE_*` environment variables override both.

use crate::domain::entities::{DIFS_FIELD, KEYS_FIELD};
use crate::domain::errors::DifStoreError;
use crate::domain::identity::{IdentityDeriver, DEFAULT_ALPHABET};
use crate::domain::index::Consistency;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding `StoreConfig::database`.
pub const ENV_DATABASE: &str = "DIFSTORE_DATABASE";
/// Environment variable overriding `StoreConfig::has_consistency`.
pub const ENV_CONSISTENCY: &str = "DIFSTORE_CONSISTENCY";
/// Environment variable overriding `RetryPolicy::max_attempts`.
pub const ENV_RETRY_ATTEMPTS: &str = "DIFSTORE_RETRY_ATTEMPTS";

/// Configuration for a Dif Store instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the backing database (default: `sicds`).
    ///
    /// A backend URL naming a database takes precedence.
    pub database: String,

    /// Consistency used by `has` (default: strong).
    pub has_consistency: Consistency,

    /// Optimistic-concurrency retry budget for registry updates.
    pub registry_retry: RetryPolicy,

    /// Log entry field indexed for retrieval (default: `timestamp`).
    pub log_index_field: String,

    /// Alphabet and base used for derived record ids.
    pub identity: IdentityConfig,

    /// Dirty documents an in-memory index tolerates before it refreshes
    /// itself under eventual reads (default: 64).
    pub index_refresh_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "sicds".to_string(),
            has_consistency: Consistency::Strong,
            registry_retry: RetryPolicy::default(),
            log_index_field: "timestamp".to_string(),
            identity: IdentityConfig::default(),
            index_refresh_threshold: 64,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_has_consistency(mut self, consistency: Consistency) -> Self {
        self.has_consistency = consistency;
        self
    }

    pub fn with_registry_retry(mut self, retry: RetryPolicy) -> Self {
        self.registry_retry = retry;
        self
    }

    pub fn with_log_index_field(mut self, field: impl Into<String>) -> Self {
        self.log_index_field = field.into();
        self
    }

    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_index_refresh_threshold(mut self, threshold: usize) -> Self {
        self.index_refresh_threshold = threshold;
        self
    }

    /// Parse a JSON configuration; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, DifStoreError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DifStoreError::config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DifStoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DifStoreError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `DIFSTORE_*` overrides from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, DifStoreError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self, DifStoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = database;
        }
        if let Some(mode) = lookup(ENV_CONSISTENCY) {
            self.has_consistency = mode.parse().map_err(DifStoreError::config)?;
        }
        if let Some(attempts) = lookup(ENV_RETRY_ATTEMPTS) {
            self.registry_retry.max_attempts = attempts.parse().map_err(|_| {
                DifStoreError::config(format!("{} must be an integer", ENV_RETRY_ATTEMPTS))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DifStoreError> {
        if self.database.is_empty() {
            return Err(DifStoreError::config("database name must not be empty"));
        }
        if self.log_index_field.is_empty() {
            return Err(DifStoreError::config("log index field must not be empty"));
        }
        if [DIFS_FIELD, KEYS_FIELD].contains(&self.log_index_field.as_str()) {
            return Err(DifStoreError::config(format!(
                "log index field '{}' is reserved for store documents",
                self.log_index_field
            )));
        }
        if self.registry_retry.max_attempts == 0 {
            return Err(DifStoreError::config(
                "registry retry needs at least one attempt",
            ));
        }
        self.identity.deriver().map(|_| ())
    }
}

/// Alphabet and optional base for derived ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub alphabet: String,
    /// Defaults to the alphabet length.
    pub base: Option<u32>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_string(),
            base: None,
        }
    }
}

impl IdentityConfig {
    pub fn deriver(&self) -> Result<IdentityDeriver, DifStoreError> {
        IdentityDeriver::new(&self.alphabet, self.base)
    }
}

/// Bounded retry for optimistic-concurrency conflicts.
///
/// Attempt `n` (1-based) waits `(n - 1) * backoff_ms` before re-reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0)
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms * u64::from(attempt.saturating_sub(1)))
    }
}

/// Backing database selected by URL.
///
/// | URL | Backend |
/// |-----|---------|
/// | `memory:` or `memory:NAME` | in-process memory |
/// | `file:///DIR/NAME` | JSON snapshot `DIR/NAME.json` |
/// | `rocksdb:///DIR/NAME` | RocksDB at `DIR`, database `NAME` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendUrl {
    Memory { database: Option<String> },
    File { dir: PathBuf, database: String },
    RocksDb { dir: PathBuf, database: String },
}

impl BackendUrl {
    /// Database named by the URL, if any.
    pub fn database(&self) -> Option<&str> {
        match self {
            BackendUrl::Memory { database } => database.as_deref(),
            BackendUrl::File { database, .. } | BackendUrl::RocksDb { database, .. } => {
                Some(database)
            }
        }
    }

    fn split_path(path: &str) -> Result<(PathBuf, String), DifStoreError> {
        let trimmed = path.trim_end_matches('/');
        let (dir, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        if name.is_empty() {
            return Err(DifStoreError::config(format!(
                "backend URL path '{}' does not name a database",
                path
            )));
        }
        let dir = if dir.is_empty() { "/" } else { dir };
        Ok((PathBuf::from(dir), name.to_string()))
    }
}

impl FromStr for BackendUrl {
    type Err = DifStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)
            .map_err(|e| DifStoreError::config(format!("invalid backend URL '{}': {}", s, e)))?;

        match url.scheme() {
            "memory" => {
                let name = url.path().trim_matches('/');
                Ok(BackendUrl::Memory {
                    database: (!name.is_empty()).then(|| name.to_string()),
                })
            }
            "file" => {
                let (dir, database) = Self::split_path(url.path())?;
                Ok(BackendUrl::File { dir, database })
            }
            "rocksdb" => {
                let (dir, database) = Self::split_path(url.path())?;
                Ok(BackendUrl::RocksDb { dir, database })
            }
            other => Err(DifStoreError::config(format!(
                "unknown backend URL scheme: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database, "sicds");
        assert_eq!(config.log_index_field, "timestamp");
        assert_eq!(config.identity.deriver().unwrap().base(), 62);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = StoreConfig::from_json_str(
            r#"{ "database": "dedup", "has_consistency": "eventual",
                 "identity": { "base": 16 } }"#,
        )
        .unwrap();
        assert_eq!(config.database, "dedup");
        assert_eq!(config.has_consistency, Consistency::Eventual);
        assert_eq!(config.identity.alphabet, DEFAULT_ALPHABET);
        assert_eq!(config.identity.base, Some(16));
        assert_eq!(config.registry_retry, RetryPolicy::default());
    }

    #[test]
    fn test_invalid_json_config_is_rejected() {
        assert!(StoreConfig::from_json_str(r#"{ "identity": { "base": 99 } }"#).is_err());
        assert!(StoreConfig::from_json_str(r#"{ "log_index_field": "" }"#).is_err());
        assert!(StoreConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_reserved_log_fields_are_rejected() {
        for field in [DIFS_FIELD, KEYS_FIELD] {
            let config = StoreConfig::default().with_log_index_field(field);
            assert!(matches!(
                config.validate(),
                Err(DifStoreError::Config { .. })
            ));
        }
        assert!(StoreConfig::default()
            .with_log_index_field("request_id")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATABASE, "other"),
            (ENV_CONSISTENCY, "eventual"),
            (ENV_RETRY_ATTEMPTS, "9"),
        ]
        .into_iter()
        .collect();
        let config = StoreConfig::default()
            .apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database, "other");
        assert_eq!(config.has_consistency, Consistency::Eventual);
        assert_eq!(config.registry_retry.max_attempts, 9);

        let bad = StoreConfig::default()
            .apply_overrides_from(|name| (name == ENV_RETRY_ATTEMPTS).then(|| "0".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_retry_backoff_is_linear() {
        let retry = RetryPolicy::new(3, 5);
        assert_eq!(retry.delay_before(1), Duration::ZERO);
        assert_eq!(retry.delay_before(3), Duration::from_millis(10));
    }

    #[test]
    fn test_backend_urls() {
        assert_eq!(
            "memory:".parse::<BackendUrl>().unwrap(),
            BackendUrl::Memory { database: None }
        );
        assert_eq!(
            "memory:dedup".parse::<BackendUrl>().unwrap().database(),
            Some("dedup")
        );
        assert_eq!(
            "file:///var/lib/difstore/sicds".parse::<BackendUrl>().unwrap(),
            BackendUrl::File {
                dir: PathBuf::from("/var/lib/difstore"),
                database: "sicds".to_string(),
            }
        );
        assert_eq!(
            "rocksdb:///data/db/sicds".parse::<BackendUrl>().unwrap(),
            BackendUrl::RocksDb {
                dir: PathBuf::from("/data/db"),
                database: "sicds".to_string(),
            }
        );
        assert!("couchdb://localhost:5984/sicds".parse::<BackendUrl>().is_err());
        assert!("file:///".parse::<BackendUrl>().is_err());
    }
}

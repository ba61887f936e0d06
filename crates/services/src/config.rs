use chrono::{FixedOffset, Offset, Utc};

use recall_storage::StorageConfig;
use recall_storage::sqlite::DEFAULT_STORE_KEY;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "RECALL_DB_URL";
pub const STORE_KEY_VAR: &str = "RECALL_STORE_KEY";
pub const UTC_OFFSET_VAR: &str = "RECALL_UTC_OFFSET_MINUTES";

pub const DEFAULT_DB_URL: &str = "sqlite:recall.sqlite3";

const MAX_OFFSET_MINUTES: i32 = 1439;

/// Engine settings: where state lives and which calendar day "today" is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    /// Offset from UTC, in minutes, used to decide calendar dates for streaks.
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::new(DEFAULT_DB_URL, DEFAULT_STORE_KEY),
            utc_offset_minutes: 0,
        }
    }
}

impl EngineConfig {
    /// Configuration for an engine that never touches disk.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            storage: StorageConfig::memory(),
            utc_offset_minutes: 0,
        }
    }

    #[must_use]
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the offset is not an integer or any value
    /// fails [`EngineConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(DB_URL_VAR).unwrap_or_else(|| DEFAULT_DB_URL.to_owned());
        let store_key = lookup(STORE_KEY_VAR).unwrap_or_else(|| DEFAULT_STORE_KEY.to_owned());
        let utc_offset_minutes = match lookup(UTC_OFFSET_VAR) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: UTC_OFFSET_VAR,
                raw,
            })?,
            None => 0,
        };

        let config = Self {
            storage: StorageConfig::new(url, store_key),
            utc_offset_minutes,
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for an out-of-range offset, an empty store key,
    /// or a storage url that names no known backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::OffsetOutOfRange(self.utc_offset_minutes));
        }
        if self.storage.store_key.trim().is_empty() {
            return Err(ConfigError::EmptyStoreKey);
        }
        if self.storage.backend().is_none() {
            return Err(ConfigError::UnknownBackend(self.storage.url.clone()));
        }
        Ok(())
    }

    /// The configured offset; UTC if the stored minutes are unrepresentable.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::repository::Storage;
use crate::sqlite::{DEFAULT_STORE_KEY, SqliteInitError};

/// Which durable backend a storage URL selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Nothing survives the process.
    Memory,
    /// A single JSON document on disk.
    JsonFile(PathBuf),
    /// A `SQLite` database URL, passed to sqlx unchanged.
    Sqlite(String),
}

impl StorageBackend {
    /// Parse a storage URL.
    ///
    /// Accepted forms: `memory`, `sqlite:<...>`, `file:<path>`, or a bare path
    /// ending in `.json`. Returns `None` for anything else.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.eq_ignore_ascii_case("memory") {
            return Some(Self::Memory);
        }
        if url.starts_with("sqlite:") {
            return Some(Self::Sqlite(url.to_owned()));
        }
        if let Some(path) = url.strip_prefix("file:") {
            let path = path.strip_prefix("//").unwrap_or(path);
            return (!path.is_empty()).then(|| Self::JsonFile(PathBuf::from(path)));
        }
        if url.ends_with(".json") {
            return Some(Self::JsonFile(PathBuf::from(url)));
        }
        None
    }
}

/// Where the engine document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend URL, see [`StorageBackend::from_url`].
    pub url: String,
    /// Names the document inside backends that can hold several.
    pub store_key: String,
}

impl StorageConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, store_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            store_key: store_key.into(),
        }
    }

    #[must_use]
    pub fn memory() -> Self {
        Self::new("memory", DEFAULT_STORE_KEY)
    }

    #[must_use]
    pub fn backend(&self) -> Option<StorageBackend> {
        StorageBackend::from_url(&self.url)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageOpenError {
    #[error("unsupported storage url: {0}")]
    UnknownBackend(String),

    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

impl Storage {
    /// Open whichever backend the configuration names.
    ///
    /// # Errors
    ///
    /// Returns `StorageOpenError::UnknownBackend` for unrecognised URLs and
    /// `StorageOpenError::Sqlite` if a database cannot be opened or migrated.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageOpenError> {
        let backend = config
            .backend()
            .ok_or_else(|| StorageOpenError::UnknownBackend(config.url.clone()))?;
        tracing::debug!(?backend, store_key = %config.store_key, "opening storage");

        Ok(match backend {
            StorageBackend::Memory => Self::in_memory(),
            StorageBackend::JsonFile(path) => Self::json_file(path),
            StorageBackend::Sqlite(url) => Self::sqlite(&url, &config.store_key).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StateRepository;

    #[test]
    fn parses_supported_urls() {
        assert_eq!(StorageBackend::from_url("memory"), Some(StorageBackend::Memory));
        assert_eq!(
            StorageBackend::from_url("sqlite:recall.sqlite3"),
            Some(StorageBackend::Sqlite("sqlite:recall.sqlite3".into()))
        );
        assert_eq!(
            StorageBackend::from_url("file:///tmp/progress.json"),
            Some(StorageBackend::JsonFile(PathBuf::from("/tmp/progress.json")))
        );
        assert_eq!(
            StorageBackend::from_url("data/progress.json"),
            Some(StorageBackend::JsonFile(PathBuf::from("data/progress.json")))
        );
    }

    #[tokio::test]
    async fn open_builds_the_named_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = StorageConfig::new(format!("file:{}", path.display()), "k");
        let storage = Storage::open(&config).await.unwrap();

        storage.state.save("{}").await.unwrap();
        assert!(path.exists());

        let err = Storage::open(&StorageConfig::new("redis://x", "k")).await;
        assert!(matches!(err, Err(StorageOpenError::UnknownBackend(_))));
    }

    #[test]
    fn rejects_unknown_urls() {
        assert_eq!(StorageBackend::from_url("postgres://localhost"), None);
        assert_eq!(StorageBackend::from_url("file:"), None);
        assert_eq!(StorageBackend::from_url(""), None);
    }
}

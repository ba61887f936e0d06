use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Durable home of the engine's persisted document.
///
/// Adapters move opaque document text; encoding and decoding live in
/// [`crate::document`] so every backend shares one format.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Fetch the stored document, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be written.
    async fn save(&self, document: &str) -> Result<(), StorageError>;

    /// Remove the stored document; a no-op if there is none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the removal.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Clones share the same slot, so a test can keep one handle and inspect
/// what the engine wrote through another.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    document: Arc<Mutex<Option<String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with a document.
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document.into()))),
        }
    }
}

#[async_trait]
impl StateRepository for InMemoryRepository {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        let guard = self
            .document
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, document: &str) -> Result<(), StorageError> {
        let mut guard = self
            .document
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(document.to_owned());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .document
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Wraps the state repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub state: Arc<dyn StateRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_repository(repo: impl StateRepository + 'static) -> Self {
        Self {
            state: Arc::new(repo),
        }
    }

    /// Wrap a repository that is already shared elsewhere.
    #[must_use]
    pub fn shared(repo: Arc<dyn StateRepository>) -> Self {
        Self { state: repo }
    }
}

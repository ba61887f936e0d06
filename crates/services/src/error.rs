//! Shared error types for the services crate.

use thiserror::Error;

use recall_storage::StorageOpenError;

/// Errors raised while reading or validating [`crate::EngineConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {key} value: {raw:?}")]
    InvalidNumber { key: &'static str, raw: String },
    #[error("utc offset of {0} minutes is outside -1439..=1439")]
    OffsetOutOfRange(i32),
    #[error("store key must not be empty")]
    EmptyStoreKey,
    #[error("unsupported storage url: {0}")]
    UnknownBackend(String),
}

/// Errors raised by the persistence writer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    #[error("persistence writer needs a running tokio runtime")]
    NoRuntime,
    #[error("persistence writer has stopped")]
    WriterClosed,
}

/// Errors emitted while opening a `StudyEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Open(#[from] StorageOpenError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#![forbid(unsafe_code)]

pub mod config;
pub mod document;
pub mod file;
mod legacy;
pub mod repository;
pub mod sqlite;

pub use config::{StorageBackend, StorageConfig, StorageOpenError};
pub use file::JsonFileRepository;
pub use sqlite::{SqliteInitError, SqliteRepository};
pub use document::{
    CURRENT_VERSION, DecodeError, StateDocument, decode_snapshot, encode_snapshot, load_or_default,
};
pub use repository::{InMemoryRepository, StateRepository, Storage, StorageError};

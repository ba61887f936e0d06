#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;

pub use recall_core::Clock;

pub use config::EngineConfig;
pub use engine::StudyEngine;
pub use error::{ConfigError, EngineError, PersistError};
pub use persistence::PersistenceGateway;

use thiserror::Error;

/// Errors raised while parsing domain values from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    #[error("item id must not be empty")]
    EmptyItemId,
    #[error("unknown session type: {0}")]
    UnknownSessionType(String),
}

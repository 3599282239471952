//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid folder name: {0}")]
    InvalidFolderName(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for ZQLZ

use thiserror::Error;

/// Core error type for ZQLZ operations
#[derive(Error, Debug)]
pub enum ZqlzError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted cache dump is corrupt or in an unknown format
    #[error("Cache decode error: {0}")]
    CacheDecode(String),

    #[error("{0}")]
    Other(String),
}

impl ZqlzError {
    /// Whether this error came from reading a malformed cache dump
    pub fn is_cache_decode(&self) -> bool {
        matches!(self, ZqlzError::CacheDecode(_))
    }
}

/// Result type alias for ZQLZ operations
pub type Result<T> = std::result::Result<T, ZqlzError>;

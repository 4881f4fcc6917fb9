//! Storage layer error types
//!
//! Defines all errors that can occur while reading, decoding or writing
//! segment data and inventories.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Record is truncated or its header is inconsistent
    #[error("Corrupt record: {0}")]
    Corruption(String),

    /// Record format cannot be interpreted
    #[error("Invalid record format: {0}")]
    InvalidRecord(String),

    /// Data encoding code is not supported
    #[error("Unsupported data encoding: {0}")]
    UnsupportedEncoding(u8),

    /// Sample rate cannot be expressed in a record header
    #[error("Unsupported sample rate: {0}")]
    UnsupportedSampleRate(f64),

    /// Inventory could not be read or parsed
    #[error("Inventory error: {0}")]
    Inventory(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<quick_xml::Error> for StorageError {
    fn from(err: quick_xml::Error) -> Self {
        StorageError::Inventory(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

//! Query error types
//!
//! Defines all error conditions that can occur while compiling filters and
//! running index, catalog and pick queries.

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Start of the requested window is after its end
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: String, end: String },

    /// Value of a time-bound filter is not a recognized timestamp
    #[error("Invalid timestamp for <{key}>: {value}")]
    InvalidTimestamp { key: String, value: String },

    /// Wildcard character not allowed for this field or table
    #[error("Unsupported wildcard in <{key}>: {value} (only ? and * are supported)")]
    UnsupportedWildcard { key: String, value: String },

    /// Filter key the table does not know
    #[error("Unsupported query key <{key}>: {value}")]
    UnknownFilterKey { key: String, value: String },

    /// Filter value has the wrong type for its field
    #[error("Invalid value for <{key}>: {reason}")]
    InvalidFilterValue { key: String, reason: String },

    /// Table or column name that is not a plain identifier or not in the schema
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Option that is accepted but has no implementation
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Configured table does not exist in the database
    #[error("Table not found: {0}")]
    MissingTable(String),

    /// Requested pick contributor has no backing table
    #[error("Unsupported contributor: {0}")]
    UnsupportedContributor(String),

    /// Relational engine error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

impl QueryError {
    /// Whether the error was raised before any database or file access
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            QueryError::InvalidTimeRange { .. }
                | QueryError::InvalidTimestamp { .. }
                | QueryError::UnsupportedWildcard { .. }
                | QueryError::UnknownFilterKey { .. }
                | QueryError::InvalidFilterValue { .. }
                | QueryError::InvalidIdentifier(_)
                | QueryError::NotImplemented(_)
        )
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::UnknownFilterKey {
            key: "magnitude_type".to_string(),
            value: "ml".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported query key <magnitude_type>: ml");

        let err = QueryError::NotImplemented("minimumlength");
        assert_eq!(err.to_string(), "Not implemented: minimumlength");
        assert!(err.is_invalid_input());
    }
}

//! Storage Layer
//!
//! Persists checkout history in PostgreSQL (production) or SQLite (local runs
//! and tests) behind a single [`Repository`] facade.

mod config;
mod postgres;
mod record;
mod repository;
mod sqlite;

pub use config::{Backend, DatabaseConfig};
pub use record::HistoryRecord;
pub use repository::Repository;
pub use sqlx::Error as SqlxError;

use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Datastore unreachable or rejected the connection at startup
    #[error("Unable to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
    /// Insert of a checkout record failed
    #[error("Failed to record checkout: {0}")]
    Persistence(#[source] sqlx::Error),
    /// Listing query failed as a whole
    #[error("Failed to query history: {0}")]
    Query(#[source] sqlx::Error),
    /// Round trip exceeded the configured deadline
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Whether the failure means the datastore itself is unavailable, as
    /// opposed to a statement that the datastore rejected.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StorageError::Timeout { .. } => true,
            StorageError::Connect(e) | StorageError::Persistence(e) | StorageError::Query(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)
                )
            }
            StorageError::InvalidConfig(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(StorageError::Persistence(sqlx::Error::PoolClosed).is_unavailable());
        assert!(StorageError::Query(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(StorageError::Timeout {
            operation: "checkout",
            after: Duration::from_millis(10),
        }
        .is_unavailable());
        assert!(!StorageError::Query(sqlx::Error::RowNotFound).is_unavailable());
        assert!(!StorageError::InvalidConfig("x".into()).is_unavailable());
    }

    #[test]
    fn test_timeout_message() {
        let err = StorageError::Timeout {
            operation: "list history",
            after: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "list history timed out after 250ms");
    }
}

//! Repository Implementation

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Backend;
use crate::postgres::{self, PostgresHistory};
use crate::record::checkout_time;
use crate::sqlite::{self, SqliteHistory};
use crate::{DatabaseConfig, HistoryRecord, StorageError};

enum Store {
    Postgres(PostgresHistory),
    Sqlite(SqliteHistory),
}

/// Repository for checkout history.
///
/// Owns the connection pool for the lifetime of the process. Every operation
/// is a single statement bounded by the configured query timeout.
pub struct Repository {
    store: Store,
    query_timeout: Duration,
}

impl Repository {
    /// Connect to the configured datastore and, if enabled, create the
    /// `history` table.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let store = match config.backend()? {
            Backend::Postgres => Store::Postgres(PostgresHistory::connect(config).await?),
            Backend::Sqlite => Store::Sqlite(SqliteHistory::connect(config).await?),
        };
        let repo = Self {
            store,
            query_timeout: config.query_timeout(),
        };

        if config.create_schema {
            repo.bounded("create schema", async {
                match &repo.store {
                    Store::Postgres(s) => s.create_schema().await,
                    Store::Sqlite(s) => s.create_schema().await,
                }
            })
            .await?;
            info!("History table ready");
        }

        Ok(repo)
    }

    /// Create a repository backed by a private in-memory SQLite database
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect(&DatabaseConfig::sqlite_memory()).await
    }

    /// Record a checkout at the current time and return that time.
    ///
    /// Returns no timestamp when the insert fails.
    pub async fn record_checkout(&self) -> Result<DateTime<Utc>, StorageError> {
        let timestamp = checkout_time();
        self.bounded("checkout", async {
            match &self.store {
                Store::Postgres(s) => s.insert(timestamp).await,
                Store::Sqlite(s) => s.insert(timestamp).await,
            }
        })
        .await?;

        debug!("Recorded checkout at {}", timestamp);
        Ok(timestamp)
    }

    /// List every checkout in insertion order.
    ///
    /// Rows that fail to decode are logged and skipped.
    pub async fn list_history(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        self.bounded("list history", async {
            let records = match &self.store {
                Store::Postgres(s) => decode_all(s.fetch_rows().await?, postgres::decode_row),
                Store::Sqlite(s) => decode_all(s.fetch_rows().await?, sqlite::decode_row),
            };
            Ok::<_, StorageError>(records)
        })
        .await
    }

    /// Round trip to the datastore
    pub async fn ping(&self) -> Result<(), StorageError> {
        self.bounded("ping", async {
            match &self.store {
                Store::Postgres(s) => s.ping().await,
                Store::Sqlite(s) => s.ping().await,
            }
        })
        .await
    }

    /// Remove all records and restart id numbering (for testing)
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.bounded("clear", async {
            match &self.store {
                Store::Postgres(s) => s.clear().await,
                Store::Sqlite(s) => s.clear().await,
            }
        })
        .await
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        match &self.store {
            Store::Postgres(s) => s.close().await,
            Store::Sqlite(s) => s.close().await,
        }
        info!("Database pool closed");
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout {
                operation,
                after: self.query_timeout,
            })?
    }
}

fn decode_all<R>(
    rows: Vec<R>,
    decode: impl Fn(&R) -> Result<HistoryRecord, sqlx::Error>,
) -> Vec<HistoryRecord> {
    let total = rows.len();
    let records: Vec<_> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| match decode(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(row = index, error = %e, "Skipping undecodable history row");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!("Skipped {} of {} history rows", total - records.len(), total);
    }
    records
}

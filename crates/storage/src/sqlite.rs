//! SQLite backend

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::{DatabaseConfig, HistoryRecord, StorageError};

pub(crate) struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    pub(crate) async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StorageError::InvalidConfig(format!("invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        // An in-memory database lives only as long as its connection, so the
        // pool must never recycle it.
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.query_timeout())
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        info!("Opened SQLite database at {}", config.url);
        Ok(Self { pool })
    }

    pub(crate) async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp DATETIME NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Connect)?;
        Ok(())
    }

    pub(crate) async fn insert(&self, timestamp: DateTime<Utc>) -> Result<(), StorageError> {
        let result = sqlx::query("INSERT INTO history (timestamp) VALUES (?)")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Persistence)?;
        debug!("Inserted history row {}", result.last_insert_rowid());
        Ok(())
    }

    pub(crate) async fn fetch_rows(&self) -> Result<Vec<SqliteRow>, StorageError> {
        sqlx::query("SELECT id, timestamp FROM history ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Query)
    }

    pub(crate) async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Query)?;
        Ok(())
    }

    pub(crate) async fn clear(&self) -> Result<(), StorageError> {
        for stmt in [
            "DELETE FROM history",
            "DELETE FROM sqlite_sequence WHERE name = 'history'",
        ] {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(StorageError::Persistence)?;
        }
        Ok(())
    }

    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn decode_row(row: &SqliteRow) -> Result<HistoryRecord, sqlx::Error> {
    Ok(HistoryRecord {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
    })
}

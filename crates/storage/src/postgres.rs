//! PostgreSQL backend

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::{DatabaseConfig, HistoryRecord, StorageError};

pub(crate) struct PostgresHistory {
    pool: PgPool,
}

impl PostgresHistory {
    pub(crate) async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.query_timeout())
            .connect(&config.url)
            .await
            .map_err(StorageError::Connect)?;

        info!("Connected to PostgreSQL at {}", config.redacted_url());
        Ok(Self { pool })
    }

    pub(crate) async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS history (
                id BIGSERIAL PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Connect)?;
        Ok(())
    }

    pub(crate) async fn insert(&self, timestamp: DateTime<Utc>) -> Result<(), StorageError> {
        let result = sqlx::query("INSERT INTO history (timestamp) VALUES ($1)")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Persistence)?;
        debug!("Inserted {} history row(s)", result.rows_affected());
        Ok(())
    }

    pub(crate) async fn fetch_rows(&self) -> Result<Vec<PgRow>, StorageError> {
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
        sqlx::query("TRUNCATE history RESTART IDENTITY")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Persistence)?;
        Ok(())
    }

    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode one row, accepting `INTEGER` ids and zone-less `TIMESTAMP` columns
/// from tables created outside this service.
pub(crate) fn decode_row(row: &PgRow) -> Result<HistoryRecord, sqlx::Error> {
    let id = match row.try_get::<i64, _>("id") {
        Ok(id) => id,
        Err(_) => row.try_get::<i32, _>("id").map(i64::from)?,
    };
    let timestamp = match row.try_get::<DateTime<Utc>, _>("timestamp") {
        Ok(ts) => ts,
        Err(_) => {
            let naive = row.try_get::<NaiveDateTime, _>("timestamp")?;
            Utc.from_utc_datetime(&naive)
        }
    };
    Ok(HistoryRecord { id, timestamp })
}

//! # Dialer Database
//!
//! SQLite persistence for campaigns, data lists, contacts, queue entries,
//! call records, contact leases and the do-not-call registry.
//!
//! All concurrency-sensitive writes are single guarded statements
//! (`UPDATE ... WHERE status = ?` or a guarded upsert) whose
//! `rows_affected()` decides the winner, so several schedulers can share one
//! database without read-then-write races.
//!
//! Timestamps are stored as epoch milliseconds.
//!
//! ```rust
//! use rvoip_dialer_engine::database::DialerDatabase;
//!
//! # async fn example() -> rvoip_dialer_engine::error::Result<()> {
//! let db = DialerDatabase::new_in_memory().await?;
//! db.health_check().await?;
//! # Ok(())
//! # }
//! ```

pub mod call_records;
pub mod campaigns;
pub mod contacts;
pub mod dnc;
pub mod leases;
pub mod lists;
pub mod queue_entries;
pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{DialerError, Result};

pub use call_records::CallRecord;
pub use campaigns::{Campaign, RetryPolicy};
pub use contacts::{Contact, LockState};
pub use leases::Lease;
pub use lists::{DataList, ListDeletion};
pub use queue_entries::{AbandonStats, QueueEntry};

/// Dialer database handle; cheap to clone
#[derive(Clone, Debug)]
pub struct DialerDatabase {
    pool: SqlitePool,
}

impl DialerDatabase {
    /// Open (or create) a file-backed database
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::from_config(&DatabaseConfig {
            database_path: db_path.to_string(),
            ..Default::default()
        })
        .await
    }

    /// Open the database described by the `[database]` config section
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.database_path == ":memory:" {
            return Self::new_in_memory().await;
        }

        info!("🗄️ Opening dialer database at: {}", config.database_path);

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.initialize_schema().await?;

        info!("✅ Dialer database initialized successfully");
        Ok(database)
    }

    /// Create an in-memory database for testing
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that never idles out.
    pub async fn new_in_memory() -> Result<Self> {
        info!("🗄️ Creating in-memory dialer database");

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.initialize_schema().await?;

        info!("✅ In-memory database created successfully");
        Ok(database)
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("📋 Creating dialer database schema");
        schema::create_all(&self.pool).await?;
        debug!("✅ Database schema created successfully");
        Ok(())
    }

    /// Check that the database answers queries
    pub async fn health_check(&self) -> Result<()> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        if one == 1 {
            Ok(())
        } else {
            Err(DialerError::internal("database health check returned unexpected value"))
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn dt_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn ms_to_dt(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse a persisted enum column, reporting corrupt rows as internal errors
pub(crate) fn parse_column<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| DialerError::internal(format!("corrupt row: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_healthy() {
        let db = DialerDatabase::new_in_memory().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[test]
    fn test_millisecond_round_trip() {
        let now = Utc.timestamp_millis_opt(1_700_000_123_456).single().unwrap();
        assert_eq!(ms_to_dt(dt_to_ms(now)), now);
    }
}

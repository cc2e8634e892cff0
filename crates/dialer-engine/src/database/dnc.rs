//! Global do-not-call registry

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use super::{dt_to_ms, DialerDatabase};
use crate::error::Result;

pub(crate) async fn insert_number(
    conn: &mut SqliteConnection,
    phone: &str,
    source: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO dnc_numbers (phone, source, added_at_ms) VALUES (?, ?, ?)")
        .bind(phone)
        .bind(source)
        .bind(dt_to_ms(now))
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

impl DialerDatabase {
    /// Register a canonical number; returns false if it was already listed
    pub async fn add_dnc_number(&self, phone: &str, source: Option<&str>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let added = insert_number(&mut conn, phone, source, Utc::now()).await?;
        if added {
            info!("🚫 Added {} to do-not-call registry", phone);
        }
        Ok(added)
    }

    pub async fn remove_dnc_number(&self, phone: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dnc_numbers WHERE phone = ?")
            .bind(phone)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn is_dnc(&self, phone: &str) -> Result<bool> {
        let hit: Option<i64> = sqlx::query_scalar("SELECT 1 FROM dnc_numbers WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hit.is_some())
    }

    pub async fn dnc_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dnc_numbers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

//! Contact lease table
//!
//! One row per contact. Acquisition is a guarded upsert: it inserts when no
//! row exists and overwrites only a row whose lease has already expired. The
//! statement either changes one row (granted) or none (held elsewhere), so
//! concurrent acquirers cannot both win.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::{dt_to_ms, ms_to_dt, DialerDatabase};
use crate::error::Result;
use crate::types::{ActorId, ContactId};

/// Time-boxed exclusive claim on a contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub contact_id: ContactId,
    pub holder: ActorId,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(sqlx::FromRow, Debug)]
struct LeaseRow {
    contact_id: String,
    holder: String,
    acquired_at_ms: i64,
    expires_at_ms: i64,
}

impl From<LeaseRow> for Lease {
    fn from(row: LeaseRow) -> Self {
        Lease {
            contact_id: ContactId(row.contact_id),
            holder: ActorId(row.holder),
            acquired_at: ms_to_dt(row.acquired_at_ms),
            expires_at: ms_to_dt(row.expires_at_ms),
        }
    }
}

pub(crate) async fn try_acquire(
    conn: &mut SqliteConnection,
    contact_id: &ContactId,
    holder: &ActorId,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO contact_leases (contact_id, holder, acquired_at_ms, expires_at_ms)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(contact_id) DO UPDATE SET
             holder = excluded.holder,
             acquired_at_ms = excluded.acquired_at_ms,
             expires_at_ms = excluded.expires_at_ms
         WHERE contact_leases.expires_at_ms <= excluded.acquired_at_ms",
    )
    .bind(contact_id.as_str())
    .bind(holder.as_str())
    .bind(dt_to_ms(now))
    .bind(dt_to_ms(expires_at))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn release(
    conn: &mut SqliteConnection,
    contact_id: &ContactId,
    holder: &ActorId,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM contact_leases WHERE contact_id = ? AND holder = ?")
        .bind(contact_id.as_str())
        .bind(holder.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

impl DialerDatabase {
    pub async fn try_acquire_lease(
        &self,
        contact_id: &ContactId,
        holder: &ActorId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        try_acquire(&mut conn, contact_id, holder, now, expires_at).await
    }

    /// Drop the lease if `holder` owns it; returns whether a row was removed
    pub async fn release_lease(&self, contact_id: &ContactId, holder: &ActorId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        release(&mut conn, contact_id, holder).await
    }

    /// Extend a live lease held by `holder`
    pub async fn renew_lease(
        &self,
        contact_id: &ContactId,
        holder: &ActorId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE contact_leases SET expires_at_ms = ?
             WHERE contact_id = ? AND holder = ? AND expires_at_ms > ?",
        )
        .bind(dt_to_ms(expires_at))
        .bind(contact_id.as_str())
        .bind(holder.as_str())
        .bind(dt_to_ms(now))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Live lease on a contact, if any
    pub async fn live_lease(&self, contact_id: &ContactId, now: DateTime<Utc>) -> Result<Option<Lease>> {
        let row: Option<LeaseRow> = sqlx::query_as(
            "SELECT contact_id, holder, acquired_at_ms, expires_at_ms
             FROM contact_leases WHERE contact_id = ? AND expires_at_ms > ?",
        )
        .bind(contact_id.as_str())
        .bind(dt_to_ms(now))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Lease::from))
    }

    pub async fn count_live_leases(&self, now: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_leases WHERE expires_at_ms > ?")
            .bind(dt_to_ms(now))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Delete expired lease rows; they are already acquirable, this only tidies up
    pub async fn purge_expired_leases(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM contact_leases WHERE expires_at_ms <= ?")
            .bind(dt_to_ms(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

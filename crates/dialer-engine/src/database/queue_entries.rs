//! Queue entry persistence
//!
//! Status only moves forward. Every transition is a guarded `UPDATE` on the
//! expected current status, and `INSERT OR IGNORE` against the live-contact
//! partial index keeps a second live entry for the same contact out. The one
//! move between finished statuses is a late provider result replacing a
//! `lease_expired` failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::{dt_to_ms, ms_to_dt, parse_column, DialerDatabase};
use crate::error::Result;
use crate::types::{
    ActorId, CallOutcome, CampaignId, ContactId, ListId, QueueEntryId, QueueEntryStatus,
};

/// One unit of scheduled work: dial this contact for this campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub list_id: ListId,
    /// Lower dials first
    pub priority: u32,
    pub status: QueueEntryStatus,
    pub queued_at: DateTime<Utc>,
    pub dialed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actor_id: Option<ActorId>,
    pub provider_call_id: Option<String>,
    pub outcome: Option<CallOutcome>,
}

impl QueueEntry {
    /// New queued entry for a contact
    pub fn queued(
        campaign_id: CampaignId,
        contact_id: ContactId,
        list_id: ListId,
        priority: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QueueEntryId::new(),
            campaign_id,
            contact_id,
            list_id,
            priority,
            status: QueueEntryStatus::Queued,
            queued_at: now,
            dialed_at: None,
            completed_at: None,
            actor_id: None,
            provider_call_id: None,
            outcome: None,
        }
    }
}

/// Abandon-rate sample over a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbandonStats {
    pub abandoned: i64,
    pub completed: i64,
}

impl AbandonStats {
    pub fn samples(&self) -> i64 {
        self.abandoned + self.completed
    }

    /// `abandoned / (completed + abandoned)`, zero with no samples
    pub fn rate(&self) -> f64 {
        if self.samples() == 0 {
            0.0
        } else {
            self.abandoned as f64 / self.samples() as f64
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
struct QueueEntryRow {
    id: String,
    campaign_id: String,
    contact_id: String,
    list_id: String,
    priority: i64,
    status: String,
    queued_at_ms: i64,
    dialed_at_ms: Option<i64>,
    completed_at_ms: Option<i64>,
    actor_id: Option<String>,
    provider_call_id: Option<String>,
    outcome: Option<String>,
}

impl QueueEntryRow {
    fn into_entry(self) -> Result<QueueEntry> {
        let outcome = match self.outcome {
            Some(ref outcome) => Some(parse_column(outcome)?),
            None => None,
        };
        Ok(QueueEntry {
            id: QueueEntryId(self.id),
            campaign_id: CampaignId(self.campaign_id),
            contact_id: ContactId(self.contact_id),
            list_id: ListId(self.list_id),
            priority: self.priority.max(0) as u32,
            status: parse_column(&self.status)?,
            queued_at: ms_to_dt(self.queued_at_ms),
            dialed_at: self.dialed_at_ms.map(ms_to_dt),
            completed_at: self.completed_at_ms.map(ms_to_dt),
            actor_id: self.actor_id.map(ActorId),
            provider_call_id: self.provider_call_id,
            outcome,
        })
    }
}

const SELECT_ENTRY: &str = "SELECT id, campaign_id, contact_id, list_id, priority, status, queued_at_ms,
        dialed_at_ms, completed_at_ms, actor_id, provider_call_id, outcome
     FROM queue_entries";

fn collect_entries(rows: Vec<QueueEntryRow>) -> Result<Vec<QueueEntry>> {
    rows.into_iter().map(QueueEntryRow::into_entry).collect()
}

/// Insert queued entries, skipping contacts that already have a live entry
pub(crate) async fn insert_entries(conn: &mut SqliteConnection, entries: &[QueueEntry]) -> Result<u64> {
    let mut inserted = 0;
    for entry in entries {
        inserted += sqlx::query(
            "INSERT OR IGNORE INTO queue_entries (id, campaign_id, contact_id, list_id, priority, status, queued_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.as_str())
        .bind(entry.campaign_id.as_str())
        .bind(entry.contact_id.as_str())
        .bind(entry.list_id.as_str())
        .bind(entry.priority as i64)
        .bind(entry.status.as_str())
        .bind(dt_to_ms(entry.queued_at))
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

pub(crate) async fn delete_queued(conn: &mut SqliteConnection, campaign_id: &CampaignId) -> Result<u64> {
    let result = sqlx::query("DELETE FROM queue_entries WHERE campaign_id = ? AND status = 'queued'")
        .bind(campaign_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn fetch_entry(
    conn: &mut SqliteConnection,
    entry_id: &QueueEntryId,
) -> Result<Option<QueueEntry>> {
    let row: Option<QueueEntryRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_ENTRY))
        .bind(entry_id.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(QueueEntryRow::into_entry).transpose()
}

/// Move a dialing entry to its terminal status
pub(crate) async fn finish_entry(
    conn: &mut SqliteConnection,
    entry_id: &QueueEntryId,
    status: QueueEntryStatus,
    outcome: CallOutcome,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE queue_entries SET status = ?, outcome = ?, completed_at_ms = ?
         WHERE id = ? AND status = 'dialing'",
    )
    .bind(status.as_str())
    .bind(outcome.as_str())
    .bind(dt_to_ms(now))
    .bind(entry_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Put the real outcome on an entry the reaper failed as `lease_expired`
pub(crate) async fn supersede_expired_entry(
    conn: &mut SqliteConnection,
    entry_id: &QueueEntryId,
    status: QueueEntryStatus,
    outcome: CallOutcome,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE queue_entries SET status = ?, outcome = ?, completed_at_ms = ?
         WHERE id = ? AND status = 'failed' AND outcome = 'lease_expired'",
    )
    .bind(status.as_str())
    .bind(outcome.as_str())
    .bind(dt_to_ms(now))
    .bind(entry_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

impl DialerDatabase {
    /// Replace a campaign's queued entries in one transaction
    ///
    /// Returns `(removed, inserted)`. Dialing entries are never touched.
    pub async fn replace_queued_entries(
        &self,
        campaign_id: &CampaignId,
        entries: &[QueueEntry],
    ) -> Result<(u64, u64)> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_queued(&mut tx, campaign_id).await?;
        let inserted = insert_entries(&mut tx, entries).await?;
        tx.commit().await?;
        Ok((removed, inserted))
    }

    pub async fn insert_queue_entries(&self, entries: &[QueueEntry]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let inserted = insert_entries(&mut tx, entries).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn delete_queued_entries(&self, campaign_id: &CampaignId) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        delete_queued(&mut conn, campaign_id).await
    }

    pub async fn get_queue_entry(&self, entry_id: &QueueEntryId) -> Result<Option<QueueEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_entry(&mut conn, entry_id).await
    }

    /// Ready set head: lowest priority value first, then FIFO
    pub async fn ready_entries(&self, campaign_id: &CampaignId, limit: usize) -> Result<Vec<QueueEntry>> {
        let rows: Vec<QueueEntryRow> = sqlx::query_as(&format!(
            "{} WHERE campaign_id = ? AND status = 'queued'
             ORDER BY priority, queued_at_ms, rowid LIMIT ?",
            SELECT_ENTRY
        ))
        .bind(campaign_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        collect_entries(rows)
    }

    pub async fn queued_entry_for_contact(
        &self,
        campaign_id: &CampaignId,
        contact_id: &ContactId,
    ) -> Result<Option<QueueEntry>> {
        let row: Option<QueueEntryRow> = sqlx::query_as(&format!(
            "{} WHERE campaign_id = ? AND contact_id = ? AND status = 'queued'",
            SELECT_ENTRY
        ))
        .bind(campaign_id.as_str())
        .bind(contact_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(QueueEntryRow::into_entry).transpose()
    }

    pub async fn entries_for_campaign(
        &self,
        campaign_id: &CampaignId,
        status: Option<QueueEntryStatus>,
    ) -> Result<Vec<QueueEntry>> {
        let rows: Vec<QueueEntryRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "{} WHERE campaign_id = ? AND status = ? ORDER BY queued_at_ms, rowid",
                    SELECT_ENTRY
                ))
                .bind(campaign_id.as_str())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!("{} WHERE campaign_id = ? ORDER BY queued_at_ms, rowid", SELECT_ENTRY))
                    .bind(campaign_id.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        collect_entries(rows)
    }

    pub async fn entries_for_contact(&self, contact_id: &ContactId) -> Result<Vec<QueueEntry>> {
        let rows: Vec<QueueEntryRow> =
            sqlx::query_as(&format!("{} WHERE contact_id = ? ORDER BY queued_at_ms, rowid", SELECT_ENTRY))
                .bind(contact_id.as_str())
                .fetch_all(&self.pool)
                .await?;
        collect_entries(rows)
    }

    pub async fn count_entries(&self, campaign_id: &CampaignId, status: QueueEntryStatus) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries WHERE campaign_id = ? AND status = ?")
                .bind(campaign_id.as_str())
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Compare-and-set `queued -> dialing`, stamping the actor
    pub async fn claim_entry(
        &self,
        entry_id: &QueueEntryId,
        actor_id: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE queue_entries SET status = 'dialing', actor_id = ?, dialed_at_ms = ?
             WHERE id = ? AND status = 'queued'",
        )
        .bind(actor_id.as_str())
        .bind(dt_to_ms(now))
        .bind(entry_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_entry_provider_call_id(
        &self,
        entry_id: &QueueEntryId,
        provider_call_id: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE queue_entries SET provider_call_id = ? WHERE id = ?")
            .bind(provider_call_id)
            .bind(entry_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn entry_by_provider_call_id(&self, provider_call_id: &str) -> Result<Option<QueueEntry>> {
        let row: Option<QueueEntryRow> = sqlx::query_as(&format!("{} WHERE provider_call_id = ?", SELECT_ENTRY))
            .bind(provider_call_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(QueueEntryRow::into_entry).transpose()
    }

    /// Terminal answered/abandoned counts completed at or after `since`
    pub async fn abandon_stats(&self, campaign_id: &CampaignId, since: DateTime<Utc>) -> Result<AbandonStats> {
        let (abandoned, completed): (i64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(CASE WHEN status = 'abandoned' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
             FROM queue_entries
             WHERE campaign_id = ? AND completed_at_ms >= ? AND status IN ('abandoned', 'completed')",
        )
        .bind(campaign_id.as_str())
        .bind(dt_to_ms(since))
        .fetch_one(&self.pool)
        .await?;
        Ok(AbandonStats { abandoned, completed })
    }

    /// Dialing entries whose actor no longer holds a live lease on the contact
    pub async fn stale_dialing_entries(
        &self,
        campaign_id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueEntry>> {
        let rows: Vec<QueueEntryRow> = sqlx::query_as(&format!(
            "{} WHERE campaign_id = ? AND status = 'dialing'
               AND NOT EXISTS (SELECT 1 FROM contact_leases l
                               WHERE l.contact_id = queue_entries.contact_id
                                 AND l.holder = queue_entries.actor_id
                                 AND l.expires_at_ms > ?)
             ORDER BY dialed_at_ms, rowid",
            SELECT_ENTRY
        ))
        .bind(campaign_id.as_str())
        .bind(dt_to_ms(now))
        .fetch_all(&self.pool)
        .await?;
        collect_entries(rows)
    }
}

//! Call record persistence
//!
//! Records are appended when a dial starts. The only later write allowed is
//! attaching the outcome, and that is guarded on `outcome IS NULL` so it
//! happens exactly once. A `lease_expired` outcome may be replaced once by the
//! result the provider reports late.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::{dt_to_ms, ms_to_dt, parse_column, DialerDatabase, QueueEntry};
use crate::error::Result;
use crate::types::{ActorId, CallOutcome, CampaignId, ContactId, QueueEntryId};

/// One dial attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,
    pub queue_entry_id: Option<QueueEntryId>,
    pub contact_id: ContactId,
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub phone_dialed: String,
    pub started_at: DateTime<Utc>,
    pub provider_call_id: Option<String>,
    pub notes: Option<String>,
    pub outcome: Option<CallOutcome>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CallRecord {
    /// Open record for a dial of `entry` that starts now
    pub fn started(entry: &QueueEntry, actor_id: &ActorId, phone: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            queue_entry_id: Some(entry.id.clone()),
            contact_id: entry.contact_id.clone(),
            campaign_id: entry.campaign_id.clone(),
            actor_id: actor_id.clone(),
            phone_dialed: phone.to_string(),
            started_at: now,
            provider_call_id: None,
            notes: None,
            outcome: None,
            completed_at: None,
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
struct CallRecordRow {
    id: String,
    queue_entry_id: Option<String>,
    contact_id: String,
    campaign_id: String,
    actor_id: String,
    phone_dialed: String,
    started_at_ms: i64,
    provider_call_id: Option<String>,
    notes: Option<String>,
    outcome: Option<String>,
    completed_at_ms: Option<i64>,
}

impl CallRecordRow {
    fn into_record(self) -> Result<CallRecord> {
        let outcome = match self.outcome {
            Some(ref outcome) => Some(parse_column(outcome)?),
            None => None,
        };
        Ok(CallRecord {
            id: self.id,
            queue_entry_id: self.queue_entry_id.map(QueueEntryId),
            contact_id: ContactId(self.contact_id),
            campaign_id: CampaignId(self.campaign_id),
            actor_id: ActorId(self.actor_id),
            phone_dialed: self.phone_dialed,
            started_at: ms_to_dt(self.started_at_ms),
            provider_call_id: self.provider_call_id,
            notes: self.notes,
            outcome,
            completed_at: self.completed_at_ms.map(ms_to_dt),
        })
    }
}

pub(crate) async fn insert_record(conn: &mut SqliteConnection, record: &CallRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO call_records (id, queue_entry_id, contact_id, campaign_id, actor_id, phone_dialed,
            started_at_ms, provider_call_id, notes, outcome, completed_at_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(record.queue_entry_id.as_ref().map(|e| e.as_str()))
    .bind(record.contact_id.as_str())
    .bind(record.campaign_id.as_str())
    .bind(record.actor_id.as_str())
    .bind(&record.phone_dialed)
    .bind(dt_to_ms(record.started_at))
    .bind(&record.provider_call_id)
    .bind(&record.notes)
    .bind(record.outcome.map(|o| o.as_str()))
    .bind(record.completed_at.map(dt_to_ms))
    .execute(conn)
    .await?;
    Ok(())
}

/// Id of the entry's call record that still awaits its outcome
pub(crate) async fn open_record_for_entry(
    conn: &mut SqliteConnection,
    entry_id: &QueueEntryId,
) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM call_records WHERE queue_entry_id = ? AND outcome IS NULL
         ORDER BY started_at_ms DESC, rowid DESC LIMIT 1",
    )
    .bind(entry_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(id)
}

pub(crate) async fn attach_outcome(
    conn: &mut SqliteConnection,
    record_id: &str,
    outcome: CallOutcome,
    notes: Option<&str>,
    provider_call_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE call_records
         SET outcome = ?, completed_at_ms = ?, notes = COALESCE(?, notes),
             provider_call_id = COALESCE(provider_call_id, ?)
         WHERE id = ? AND outcome IS NULL",
    )
    .bind(outcome.as_str())
    .bind(dt_to_ms(now))
    .bind(notes)
    .bind(provider_call_id)
    .bind(record_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn supersede_expired_outcome(
    conn: &mut SqliteConnection,
    entry_id: &QueueEntryId,
    outcome: CallOutcome,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE call_records SET outcome = ?, completed_at_ms = ?, notes = COALESCE(?, notes)
         WHERE queue_entry_id = ? AND outcome = 'lease_expired'",
    )
    .bind(outcome.as_str())
    .bind(dt_to_ms(now))
    .bind(notes)
    .bind(entry_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

impl DialerDatabase {
    pub async fn insert_call_record(&self, record: &CallRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut conn, record).await
    }

    pub async fn set_call_record_provider_id(&self, record_id: &str, provider_call_id: &str) -> Result<()> {
        sqlx::query("UPDATE call_records SET provider_call_id = ? WHERE id = ?")
            .bind(provider_call_id)
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn call_records_for_contact(&self, contact_id: &ContactId) -> Result<Vec<CallRecord>> {
        let rows: Vec<CallRecordRow> = sqlx::query_as(
            "SELECT id, queue_entry_id, contact_id, campaign_id, actor_id, phone_dialed, started_at_ms,
                    provider_call_id, notes, outcome, completed_at_ms
             FROM call_records WHERE contact_id = ? ORDER BY started_at_ms, rowid",
        )
        .bind(contact_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CallRecordRow::into_record).collect()
    }

    pub async fn call_records_for_entry(&self, entry_id: &QueueEntryId) -> Result<Vec<CallRecord>> {
        let rows: Vec<CallRecordRow> = sqlx::query_as(
            "SELECT id, queue_entry_id, contact_id, campaign_id, actor_id, phone_dialed, started_at_ms,
                    provider_call_id, notes, outcome, completed_at_ms
             FROM call_records WHERE queue_entry_id = ? ORDER BY started_at_ms, rowid",
        )
        .bind(entry_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CallRecordRow::into_record).collect()
    }
}

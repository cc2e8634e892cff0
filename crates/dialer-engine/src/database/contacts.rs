//! Contact persistence and eligibility queries
//!
//! A contact's lock state is never stored on the contact row. It is derived
//! from `contact_leases` at read time, so a crashed holder's expired lease
//! reads back as unlocked without any cleanup.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::{dt_to_ms, ms_to_dt, parse_column, DialerDatabase};
use crate::error::{DialerError, Result};
use crate::types::{ActorId, CallOutcome, CampaignId, ContactId, ContactStatus, ListId};

/// Derived lock view of a contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub locked: bool,
    pub locked_by: Option<ActorId>,
    pub locked_at: Option<DateTime<Utc>>,
}

/// Contact record and its dialing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub list_id: ListId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Canonical phone number
    pub phone: Option<String>,
    pub alternate_phones: Vec<String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub status: ContactStatus,
    pub last_outcome: Option<CallOutcome>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub lock: LockState,
}

#[derive(sqlx::FromRow, Debug)]
struct ContactRow {
    id: String,
    list_id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    alternate_phones: String,
    attempt_count: i64,
    max_attempts: i64,
    status: String,
    last_outcome: Option<String>,
    last_attempt_at_ms: Option<i64>,
    created_at_ms: i64,
    lease_holder: Option<String>,
    lease_acquired_at_ms: Option<i64>,
}

impl ContactRow {
    fn into_contact(self) -> Result<Contact> {
        let alternate_phones = serde_json::from_str(&self.alternate_phones)
            .map_err(|e| DialerError::internal(format!("corrupt alternate_phones: {}", e)))?;
        let last_outcome = match self.last_outcome {
            Some(ref outcome) => Some(parse_column(outcome)?),
            None => None,
        };

        Ok(Contact {
            id: ContactId(self.id),
            list_id: ListId(self.list_id),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            alternate_phones,
            attempt_count: self.attempt_count.max(0) as u32,
            max_attempts: self.max_attempts.max(0) as u32,
            status: parse_column(&self.status)?,
            last_outcome,
            last_attempt_at: self.last_attempt_at_ms.map(ms_to_dt),
            created_at: ms_to_dt(self.created_at_ms),
            lock: LockState {
                locked: self.lease_holder.is_some(),
                locked_by: self.lease_holder.map(ActorId),
                locked_at: self.lease_acquired_at_ms.map(ms_to_dt),
            },
        })
    }
}

// First bind is the lease liveness cut-off (now)
const SELECT_CONTACT: &str = "SELECT c.id, c.list_id, c.first_name, c.last_name, c.email, c.phone,
        c.alternate_phones, c.attempt_count, c.max_attempts, c.status, c.last_outcome,
        c.last_attempt_at_ms, c.created_at_ms,
        l.holder AS lease_holder, l.acquired_at_ms AS lease_acquired_at_ms
     FROM contacts c
     LEFT JOIN contact_leases l ON l.contact_id = c.id AND l.expires_at_ms > ?";

// Binds: campaign max attempts, retry cut-off. Requires the lease join above.
const ELIGIBLE_FILTER: &str = "c.status IN ('pending', 'retry')
       AND c.phone IS NOT NULL
       AND c.attempt_count < MIN(c.max_attempts, ?)
       AND (c.last_attempt_at_ms IS NULL OR c.last_attempt_at_ms <= ?)
       AND l.contact_id IS NULL
       AND NOT EXISTS (SELECT 1 FROM queue_entries q
                       WHERE q.contact_id = c.id AND q.status IN ('queued', 'dialing'))
       AND NOT EXISTS (SELECT 1 FROM dnc_numbers d WHERE d.phone = c.phone)";

/// Inputs of the eligibility filter
#[derive(Debug, Clone, Copy)]
pub struct EligibilityWindow {
    pub now: DateTime<Utc>,
    /// Contacts last attempted after this instant are still cooling down
    pub retry_cutoff: DateTime<Utc>,
    pub campaign_max_attempts: u32,
}

pub(crate) async fn fetch_contact(
    conn: &mut SqliteConnection,
    contact_id: &ContactId,
    now: DateTime<Utc>,
) -> Result<Option<Contact>> {
    let row: Option<ContactRow> = sqlx::query_as(&format!("{} WHERE c.id = ?", SELECT_CONTACT))
        .bind(dt_to_ms(now))
        .bind(contact_id.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(ContactRow::into_contact).transpose()
}

/// Eligible contacts of one list, freshest first
pub(crate) async fn fetch_eligible_in_list(
    conn: &mut SqliteConnection,
    list_id: &ListId,
    window: &EligibilityWindow,
    limit: usize,
) -> Result<Vec<Contact>> {
    let rows: Vec<ContactRow> = sqlx::query_as(&format!(
        "{} WHERE c.list_id = ? AND {} ORDER BY c.attempt_count, c.created_at_ms, c.rowid LIMIT ?",
        SELECT_CONTACT, ELIGIBLE_FILTER
    ))
    .bind(dt_to_ms(window.now))
    .bind(list_id.as_str())
    .bind(window.campaign_max_attempts as i64)
    .bind(dt_to_ms(window.retry_cutoff))
    .bind(limit as i64)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(ContactRow::into_contact).collect()
}

pub(crate) async fn write_contact_state(
    conn: &mut SqliteConnection,
    contact: &Contact,
) -> Result<()> {
    sqlx::query(
        "UPDATE contacts SET attempt_count = ?, status = ?, last_outcome = ?, last_attempt_at_ms = ?
         WHERE id = ?",
    )
    .bind(contact.attempt_count as i64)
    .bind(contact.status.as_str())
    .bind(contact.last_outcome.map(|o| o.as_str()))
    .bind(contact.last_attempt_at.map(dt_to_ms))
    .bind(contact.id.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

impl DialerDatabase {
    /// Insert a batch of contacts atomically
    pub async fn insert_contacts(&self, contacts: &[Contact]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for contact in contacts {
            let alternates = serde_json::to_string(&contact.alternate_phones)
                .map_err(|e| DialerError::internal(format!("failed to encode alternates: {}", e)))?;
            inserted += sqlx::query(
                "INSERT INTO contacts (id, list_id, first_name, last_name, email, phone, alternate_phones,
                    attempt_count, max_attempts, status, last_outcome, last_attempt_at_ms, created_at_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(contact.id.as_str())
            .bind(contact.list_id.as_str())
            .bind(&contact.first_name)
            .bind(&contact.last_name)
            .bind(&contact.email)
            .bind(&contact.phone)
            .bind(alternates)
            .bind(contact.attempt_count as i64)
            .bind(contact.max_attempts as i64)
            .bind(contact.status.as_str())
            .bind(contact.last_outcome.map(|o| o.as_str()))
            .bind(contact.last_attempt_at.map(dt_to_ms))
            .bind(dt_to_ms(contact.created_at))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get_contact(&self, contact_id: &ContactId) -> Result<Option<Contact>> {
        let mut conn = self.pool.acquire().await?;
        fetch_contact(&mut conn, contact_id, Utc::now()).await
    }

    pub async fn contacts_in_list(&self, list_id: &ListId) -> Result<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "{} WHERE c.list_id = ? ORDER BY c.created_at_ms, c.rowid",
            SELECT_CONTACT
        ))
        .bind(dt_to_ms(Utc::now()))
        .bind(list_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ContactRow::into_contact).collect()
    }

    pub async fn count_contacts_in_list(&self, list_id: &ListId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE list_id = ?")
            .bind(list_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Canonical phones already present in a list
    pub async fn phones_in_list(&self, list_id: &ListId) -> Result<HashSet<String>> {
        let phones: Vec<String> =
            sqlx::query_scalar("SELECT phone FROM contacts WHERE list_id = ? AND phone IS NOT NULL")
                .bind(list_id.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(phones.into_iter().collect())
    }

    pub async fn eligible_contacts_in_list(
        &self,
        list_id: &ListId,
        window: &EligibilityWindow,
        limit: usize,
    ) -> Result<Vec<Contact>> {
        let mut conn = self.pool.acquire().await?;
        fetch_eligible_in_list(&mut conn, list_id, window, limit).await
    }

    /// Eligible contacts across every active list of a campaign
    pub async fn count_eligible_for_campaign(
        &self,
        campaign_id: &CampaignId,
        window: &EligibilityWindow,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM contacts c
             JOIN data_lists dl ON dl.id = c.list_id
             LEFT JOIN contact_leases l ON l.contact_id = c.id AND l.expires_at_ms > ?
             WHERE dl.campaign_id = ? AND dl.active = 1 AND {}",
            ELIGIBLE_FILTER
        ))
        .bind(dt_to_ms(window.now))
        .bind(campaign_id.as_str())
        .bind(window.campaign_max_attempts as i64)
        .bind(dt_to_ms(window.retry_cutoff))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

//! Campaign persistence

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

use super::{dt_to_ms, ms_to_dt, parse_column, DialerDatabase};
use crate::error::Result;
use crate::types::{CampaignId, CampaignStatus, DialMethod};

/// Retry policy shared by every contact dialed in a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Upper bound on attempts per contact (a contact's own limit may be lower)
    pub max_attempts: u32,
    /// Cool-down between attempts on the same contact
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(3600),
        }
    }
}

/// Outbound campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    /// Number presented to callees
    pub caller_id: String,
    pub dial_method: DialMethod,
    /// Calls per minute per agent
    pub dial_speed: f64,
    pub max_concurrent_calls: u32,
    /// Fraction in [0, 1]
    pub abandon_rate_threshold: f64,
    pub pacing_multiplier: f64,
    pub status: CampaignStatus,
    pub retry_policy: RetryPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug)]
struct CampaignRow {
    id: String,
    name: String,
    caller_id: String,
    dial_method: String,
    dial_speed: f64,
    max_concurrent_calls: i64,
    abandon_rate_threshold: f64,
    pacing_multiplier: f64,
    status: String,
    max_attempts: i64,
    retry_delay_secs: i64,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl CampaignRow {
    fn into_campaign(self) -> Result<Campaign> {
        Ok(Campaign {
            id: CampaignId(self.id),
            name: self.name,
            caller_id: self.caller_id,
            dial_method: parse_column(&self.dial_method)?,
            dial_speed: self.dial_speed,
            max_concurrent_calls: self.max_concurrent_calls.max(0) as u32,
            abandon_rate_threshold: self.abandon_rate_threshold,
            pacing_multiplier: self.pacing_multiplier,
            status: parse_column(&self.status)?,
            retry_policy: RetryPolicy {
                max_attempts: self.max_attempts.max(0) as u32,
                retry_delay: Duration::from_secs(self.retry_delay_secs.max(0) as u64),
            },
            created_at: ms_to_dt(self.created_at_ms),
            updated_at: ms_to_dt(self.updated_at_ms),
        })
    }
}

const SELECT_CAMPAIGN: &str = "SELECT id, name, caller_id, dial_method, dial_speed, max_concurrent_calls,
        abandon_rate_threshold, pacing_multiplier, status, max_attempts, retry_delay_secs,
        created_at_ms, updated_at_ms
     FROM campaigns";

pub(crate) async fn fetch_campaign(
    conn: &mut SqliteConnection,
    campaign_id: &CampaignId,
) -> Result<Option<Campaign>> {
    let row: Option<CampaignRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_CAMPAIGN))
        .bind(campaign_id.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(CampaignRow::into_campaign).transpose()
}

impl DialerDatabase {
    pub async fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        debug!("📋 Inserting campaign {} ({})", campaign.id, campaign.name);
        sqlx::query(
            "INSERT INTO campaigns (id, name, caller_id, dial_method, dial_speed, max_concurrent_calls,
                abandon_rate_threshold, pacing_multiplier, status, max_attempts, retry_delay_secs,
                created_at_ms, updated_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(campaign.id.as_str())
        .bind(&campaign.name)
        .bind(&campaign.caller_id)
        .bind(campaign.dial_method.as_str())
        .bind(campaign.dial_speed)
        .bind(campaign.max_concurrent_calls as i64)
        .bind(campaign.abandon_rate_threshold)
        .bind(campaign.pacing_multiplier)
        .bind(campaign.status.as_str())
        .bind(campaign.retry_policy.max_attempts as i64)
        .bind(campaign.retry_policy.retry_delay.as_secs() as i64)
        .bind(dt_to_ms(campaign.created_at))
        .bind(dt_to_ms(campaign.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>> {
        let mut conn = self.pool.acquire().await?;
        fetch_campaign(&mut conn, campaign_id).await
    }

    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let rows: Vec<CampaignRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at_ms, rowid", SELECT_CAMPAIGN))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(CampaignRow::into_campaign).collect()
    }

    /// Overwrite the mutable settings of a campaign (not its status)
    pub async fn update_campaign_settings(&self, campaign: &Campaign) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE campaigns SET name = ?, caller_id = ?, dial_method = ?, dial_speed = ?,
                max_concurrent_calls = ?, abandon_rate_threshold = ?, pacing_multiplier = ?,
                max_attempts = ?, retry_delay_secs = ?, updated_at_ms = ?
             WHERE id = ?",
        )
        .bind(&campaign.name)
        .bind(&campaign.caller_id)
        .bind(campaign.dial_method.as_str())
        .bind(campaign.dial_speed)
        .bind(campaign.max_concurrent_calls as i64)
        .bind(campaign.abandon_rate_threshold)
        .bind(campaign.pacing_multiplier)
        .bind(campaign.retry_policy.max_attempts as i64)
        .bind(campaign.retry_policy.retry_delay.as_secs() as i64)
        .bind(dt_to_ms(campaign.updated_at))
        .bind(campaign.id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Compare-and-set the campaign status
    pub async fn transition_campaign_status(
        &self,
        campaign_id: &CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE campaigns SET status = ?, updated_at_ms = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(dt_to_ms(now))
        .bind(campaign_id.as_str())
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn rename_campaign(
        &self,
        campaign_id: &CampaignId,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE campaigns SET name = ?, updated_at_ms = ? WHERE id = ?")
            .bind(name)
            .bind(dt_to_ms(now))
            .bind(campaign_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

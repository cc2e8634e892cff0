//! Data list persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{dt_to_ms, ms_to_dt, DialerDatabase};
use crate::error::Result;
use crate::types::{CampaignId, ListId};

/// Named, weighted group of contacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataList {
    pub id: ListId,
    pub name: String,
    pub campaign_id: Option<CampaignId>,
    pub active: bool,
    /// Relative blend weight, 1..=100
    pub weight: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a cascading list deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListDeletion {
    Deleted { contacts: u64 },
    /// Contacts of the list are being dialed right now
    InUse { dialing: i64 },
    NotFound,
}

#[derive(sqlx::FromRow, Debug)]
struct DataListRow {
    id: String,
    name: String,
    campaign_id: Option<String>,
    active: bool,
    weight: i64,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl From<DataListRow> for DataList {
    fn from(row: DataListRow) -> Self {
        DataList {
            id: ListId(row.id),
            name: row.name,
            campaign_id: row.campaign_id.map(CampaignId),
            active: row.active,
            weight: row.weight.clamp(1, 100) as u32,
            created_at: ms_to_dt(row.created_at_ms),
            updated_at: ms_to_dt(row.updated_at_ms),
        }
    }
}

const SELECT_LIST: &str =
    "SELECT id, name, campaign_id, active, weight, created_at_ms, updated_at_ms FROM data_lists";

impl DialerDatabase {
    pub async fn insert_list(&self, list: &DataList) -> Result<()> {
        sqlx::query(
            "INSERT INTO data_lists (id, name, campaign_id, active, weight, created_at_ms, updated_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(list.id.as_str())
        .bind(&list.name)
        .bind(list.campaign_id.as_ref().map(|c| c.as_str()))
        .bind(list.active)
        .bind(list.weight as i64)
        .bind(dt_to_ms(list.created_at))
        .bind(dt_to_ms(list.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_list(&self, list_id: &ListId) -> Result<Option<DataList>> {
        let row: Option<DataListRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_LIST))
            .bind(list_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(DataList::from))
    }

    pub async fn lists_for_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<DataList>> {
        let rows: Vec<DataListRow> =
            sqlx::query_as(&format!("{} WHERE campaign_id = ? ORDER BY created_at_ms, rowid", SELECT_LIST))
                .bind(campaign_id.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(DataList::from).collect())
    }

    pub async fn active_lists_for_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<DataList>> {
        let rows: Vec<DataListRow> = sqlx::query_as(&format!(
            "{} WHERE campaign_id = ? AND active = 1 ORDER BY created_at_ms, rowid",
            SELECT_LIST
        ))
        .bind(campaign_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DataList::from).collect())
    }

    /// Set the owning campaign (or none) and weight in one statement
    pub async fn assign_list(
        &self,
        list_id: &ListId,
        campaign_id: Option<&CampaignId>,
        weight: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE data_lists SET campaign_id = ?, weight = ?, updated_at_ms = ? WHERE id = ?",
        )
        .bind(campaign_id.map(|c| c.as_str()))
        .bind(weight as i64)
        .bind(dt_to_ms(now))
        .bind(list_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn clear_list_campaign(&self, list_id: &ListId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE data_lists SET campaign_id = NULL, updated_at_ms = ? WHERE id = ?")
            .bind(dt_to_ms(now))
            .bind(list_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_list_active(&self, list_id: &ListId, active: bool, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE data_lists SET active = ?, updated_at_ms = ? WHERE id = ?")
            .bind(active)
            .bind(dt_to_ms(now))
            .bind(list_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_list_weight(&self, list_id: &ListId, weight: u32, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE data_lists SET weight = ?, updated_at_ms = ? WHERE id = ?")
            .bind(weight as i64)
            .bind(dt_to_ms(now))
            .bind(list_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a list and every contact in it
    ///
    /// Leases and queue history of those contacts go with them through
    /// `ON DELETE CASCADE`. Refused while any contact of the list is dialing.
    pub async fn delete_list_cascade(&self, list_id: &ListId) -> Result<ListDeletion> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM data_lists WHERE id = ?")
            .bind(list_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(ListDeletion::NotFound);
        }

        let dialing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_entries WHERE list_id = ? AND status = 'dialing'",
        )
        .bind(list_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if dialing > 0 {
            tx.rollback().await?;
            return Ok(ListDeletion::InUse { dialing });
        }

        let contacts = sqlx::query("DELETE FROM contacts WHERE list_id = ?")
            .bind(list_id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM data_lists WHERE id = ?")
            .bind(list_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("🗑️ Deleted list {} with {} contacts", list_id, contacts);
        Ok(ListDeletion::Deleted { contacts })
    }
}

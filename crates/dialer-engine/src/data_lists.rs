//! # Data List Registry
//!
//! Named groups of contacts, each owned by at most one campaign at a time and
//! carrying a relative blend weight. Weight and ownership changes only affect
//! future queue generation: entries already queued keep their place.
//!
//! ```rust
//! use rvoip_dialer_engine::data_lists::DataListRegistry;
//! use rvoip_dialer_engine::database::DialerDatabase;
//!
//! # tokio_test::block_on(async {
//! let db = DialerDatabase::new_in_memory().await.unwrap();
//! let registry = DataListRegistry::new(db);
//!
//! let list = registry.create_list("spring leads", 250, None).await.unwrap();
//! assert_eq!(list.weight, 100);
//! assert!(list.active);
//!
//! let paused = registry.set_active(&list.id, false).await.unwrap();
//! assert!(!paused.active);
//! # })
//! ```

use chrono::Utc;
use tracing::{info, warn};

use crate::database::{DataList, DialerDatabase, ListDeletion};
use crate::error::{DialerError, Result};
use crate::types::{CampaignId, ListId};

pub const MIN_WEIGHT: u32 = 1;
pub const MAX_WEIGHT: u32 = 100;

/// Clamp a blend weight into `[1, 100]`
pub fn clamp_weight(weight: u32) -> u32 {
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

#[derive(Clone)]
pub struct DataListRegistry {
    db: DialerDatabase,
}

impl DataListRegistry {
    pub fn new(db: DialerDatabase) -> Self {
        Self { db }
    }

    pub async fn create_list(
        &self,
        name: &str,
        weight: u32,
        campaign_id: Option<&CampaignId>,
    ) -> Result<DataList> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DialerError::validation("list name cannot be empty"));
        }
        if let Some(campaign_id) = campaign_id {
            self.ensure_campaign(campaign_id).await?;
        }

        let now = Utc::now();
        let list = DataList {
            id: ListId::new(),
            name: name.to_string(),
            campaign_id: campaign_id.cloned(),
            active: true,
            weight: clamp_weight(weight),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_list(&list).await?;

        info!("📋 Created data list {} '{}' (weight {})", list.id, list.name, list.weight);
        Ok(list)
    }

    /// Attach a list to a campaign, taking it away from any previous owner
    pub async fn attach_to_campaign(
        &self,
        list_id: &ListId,
        campaign_id: &CampaignId,
        weight: u32,
    ) -> Result<DataList> {
        self.ensure_campaign(campaign_id).await?;
        let list = self.get_list(list_id).await?;

        if let Some(previous) = list.campaign_id.as_ref().filter(|c| *c != campaign_id) {
            warn!("🔄 Reassigning list {} from campaign {} to {}", list_id, previous, campaign_id);
        }

        let weight = clamp_weight(weight);
        self.db.assign_list(list_id, Some(campaign_id), weight, Utc::now()).await?;
        info!("🔗 Attached list {} to campaign {} (weight {})", list_id, campaign_id, weight);
        self.get_list(list_id).await
    }

    /// Detach a list from its campaign; contacts are left untouched
    pub async fn detach(&self, list_id: &ListId) -> Result<DataList> {
        if !self.db.clear_list_campaign(list_id, Utc::now()).await? {
            return Err(DialerError::not_found(format!("data list {}", list_id)));
        }
        info!("🔓 Detached list {}", list_id);
        self.get_list(list_id).await
    }

    pub async fn set_active(&self, list_id: &ListId, active: bool) -> Result<DataList> {
        if !self.db.set_list_active(list_id, active, Utc::now()).await? {
            return Err(DialerError::not_found(format!("data list {}", list_id)));
        }
        self.get_list(list_id).await
    }

    pub async fn set_weight(&self, list_id: &ListId, weight: u32) -> Result<DataList> {
        if !self.db.set_list_weight(list_id, clamp_weight(weight), Utc::now()).await? {
            return Err(DialerError::not_found(format!("data list {}", list_id)));
        }
        self.get_list(list_id).await
    }

    pub async fn get_list(&self, list_id: &ListId) -> Result<DataList> {
        self.db
            .get_list(list_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("data list {}", list_id)))
    }

    pub async fn lists_for_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<DataList>> {
        self.db.lists_for_campaign(campaign_id).await
    }

    pub async fn active_lists_for_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<DataList>> {
        self.db.active_lists_for_campaign(campaign_id).await
    }

    /// Delete a list and its contacts; returns the number of contacts removed
    pub async fn delete_list(&self, list_id: &ListId) -> Result<u64> {
        match self.db.delete_list_cascade(list_id).await? {
            ListDeletion::Deleted { contacts } => {
                info!("🗑️ Deleted list {} ({} contacts)", list_id, contacts);
                Ok(contacts)
            }
            ListDeletion::InUse { dialing } => Err(DialerError::invalid_transition(format!(
                "list {} has {} contacts dialing",
                list_id, dialing
            ))),
            ListDeletion::NotFound => Err(DialerError::not_found(format!("data list {}", list_id))),
        }
    }

    async fn ensure_campaign(&self, campaign_id: &CampaignId) -> Result<()> {
        match self.db.get_campaign(campaign_id).await? {
            Some(_) => Ok(()),
            None => Err(DialerError::not_found(format!("campaign {}", campaign_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_is_clamped() {
        assert_eq!(clamp_weight(0), 1);
        assert_eq!(clamp_weight(42), 42);
        assert_eq!(clamp_weight(250), 100);
    }

    #[tokio::test]
    async fn test_create_detached_list_and_toggle() {
        let db = DialerDatabase::new_in_memory().await.unwrap();
        let registry = DataListRegistry::new(db);

        let list = registry.create_list("  leads  ", 0, None).await.unwrap();
        assert_eq!(list.name, "leads");
        assert_eq!(list.weight, 1);
        assert!(list.active);
        assert!(list.campaign_id.is_none());

        let list = registry.set_active(&list.id, false).await.unwrap();
        assert!(!list.active);

        assert!(matches!(
            registry.create_list("   ", 10, None).await,
            Err(DialerError::Validation(_))
        ));
        assert!(matches!(
            registry.create_list("x", 10, Some(&CampaignId::from("missing"))).await,
            Err(DialerError::NotFound(_))
        ));
    }
}

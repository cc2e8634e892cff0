use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::blend::{blend, BlendLane};
use super::{GenerationSignal, QueueDepth, QueueGeneration};
use crate::config::QueueConfig;
use crate::database::contacts::{fetch_eligible_in_list, EligibilityWindow};
use crate::database::{queue_entries, Campaign, DialerDatabase, QueueEntry};
use crate::error::{DialerError, Result};
use crate::events::{DialerEvent, EventBus};
use crate::types::{CampaignId, QueueEntryStatus};

/// Builds per-campaign dial queues
#[derive(Clone)]
pub struct QueueBuilder {
    db: DialerDatabase,
    config: QueueConfig,
    events: EventBus,
}

/// Eligibility window for a campaign at `now`
pub(crate) fn eligibility_window(campaign: &Campaign, now: DateTime<Utc>) -> EligibilityWindow {
    let delay = chrono::Duration::seconds(campaign.retry_policy.retry_delay.as_secs() as i64);
    EligibilityWindow {
        now,
        retry_cutoff: now - delay,
        campaign_max_attempts: campaign.retry_policy.max_attempts,
    }
}

impl QueueBuilder {
    pub fn new(db: DialerDatabase, config: QueueConfig, events: EventBus) -> Self {
        Self { db, config, events }
    }

    /// Regenerate the campaign's queue with up to `max_records` entries
    ///
    /// `0` uses the configured default batch size; larger requests are capped
    /// at the configured ceiling.
    pub async fn generate_queue(&self, campaign_id: &CampaignId, max_records: usize) -> Result<QueueGeneration> {
        self.generate_queue_at(campaign_id, max_records, Utc::now()).await
    }

    pub async fn generate_queue_at(
        &self,
        campaign_id: &CampaignId,
        max_records: usize,
        now: DateTime<Utc>,
    ) -> Result<QueueGeneration> {
        let campaign = self
            .db
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", campaign_id)))?;

        let limit = match max_records {
            0 => self.config.default_batch_size,
            n => n.min(self.config.max_batch_size),
        };

        let lists = self.db.active_lists_for_campaign(campaign_id).await?;
        if lists.is_empty() {
            info!("📭 Campaign {} has no active data lists", campaign_id);
            return Ok(QueueGeneration::empty(GenerationSignal::NoEligibleLists));
        }

        info!(
            "📋 Generating queue for campaign {} from {} lists (limit {})",
            campaign_id,
            lists.len(),
            limit
        );

        let window = eligibility_window(&campaign, now);
        let mut tx = self.db.begin().await?;

        // Clearing first makes the replaced contacts eligible again below
        let removed = queue_entries::delete_queued(&mut tx, campaign_id).await?;

        let mut lanes = Vec::with_capacity(lists.len());
        for list in &lists {
            let candidates = fetch_eligible_in_list(&mut tx, &list.id, &window, limit).await?;
            debug!("List {} (weight {}): {} eligible", list.id, list.weight, candidates.len());
            lanes.push(BlendLane::new(list.id.clone(), list.weight, candidates));
        }

        let entries: Vec<QueueEntry> = blend(lanes, limit)
            .into_iter()
            .map(|(list_id, contact)| {
                QueueEntry::queued(campaign_id.clone(), contact.id, list_id, contact.attempt_count, now)
            })
            .collect();

        queue_entries::insert_entries(&mut tx, &entries).await?;
        tx.commit().await?;

        let mut per_list = BTreeMap::new();
        for entry in &entries {
            *per_list.entry(entry.list_id.clone()).or_insert(0) += 1;
        }

        let signal = if entries.is_empty() {
            GenerationSignal::NoEligibleContacts
        } else {
            GenerationSignal::Generated
        };

        info!(
            "✅ Queue for campaign {}: {} entries ({} replaced)",
            campaign_id,
            entries.len(),
            removed
        );
        self.events.publish(DialerEvent::QueueGenerated {
            campaign_id: campaign_id.clone(),
            entries: entries.len(),
        });

        Ok(QueueGeneration {
            entries,
            per_list,
            removed,
            signal,
        })
    }

    /// Contacts that a generation run at this instant could queue
    pub async fn count_eligible(&self, campaign_id: &CampaignId) -> Result<i64> {
        let campaign = self
            .db
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", campaign_id)))?;
        self.db
            .count_eligible_for_campaign(campaign_id, &eligibility_window(&campaign, Utc::now()))
            .await
    }

    pub async fn depth(&self, campaign_id: &CampaignId) -> Result<QueueDepth> {
        Ok(QueueDepth {
            queued: self.db.count_entries(campaign_id, QueueEntryStatus::Queued).await?,
            dialing: self.db.count_entries(campaign_id, QueueEntryStatus::Dialing).await?,
        })
    }

    /// Drop every queued entry of a campaign
    pub async fn clear(&self, campaign_id: &CampaignId) -> Result<u64> {
        let removed = self.db.delete_queued_entries(campaign_id).await?;
        if removed > 0 {
            info!("🧹 Removed {} queued entries from campaign {}", removed, campaign_id);
        }
        Ok(removed)
    }
}

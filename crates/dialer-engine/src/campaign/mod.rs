//! # Campaign Controller
//!
//! Owns campaign configuration and the lifecycle state machine:
//!
//! ```text
//! Draft ──start──▶ Active ◀──resume── Paused
//!   │               │  └────pause────▶  │
//!   │               └──stop──▶ Completed ◀──stop──┘
//!   └──archive──▶ Archived ◀──archive──┘
//! ```
//!
//! Every transition is a compare-and-set on the stored status, so two callers
//! racing on the same campaign cannot both win. Starting requires at least one
//! active data list. Auto-dial additionally needs something to dial; when there
//! is nothing it reports [`StartOutcome::NothingToDial`] and leaves the
//! campaign as it was.
//!
//! Pausing stops the background pacer loop but leaves in-flight dials alone.
//! Stopping also drops the campaign's still-queued entries.

pub mod strategy;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DialerConfig;
use crate::database::{Campaign, DialerDatabase, RetryPolicy};
use crate::error::{DialerError, Result};
use crate::events::{DialerEvent, EventBus};
use crate::pacer::PacerScheduler;
use crate::queue::QueueBuilder;
use crate::types::{CampaignId, CampaignStatus, DialMethod, QueueEntryStatus};
pub use strategy::{DialStrategy, PushPlan};

pub const MIN_DIAL_SPEED: f64 = 1.0;
pub const MAX_DIAL_SPEED: f64 = 4.0;
pub const MAX_PACING_MULTIPLIER: f64 = 10.0;

/// Parameters for a new campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    /// Falls back to the configured default caller id when `None`
    pub caller_id: Option<String>,
    pub dial_method: DialMethod,
    pub dial_speed: f64,
    pub max_concurrent_calls: u32,
    pub abandon_rate_threshold: f64,
    pub pacing_multiplier: f64,
    /// Falls back to the configured queue defaults when `None`
    pub retry_policy: Option<RetryPolicy>,
}

impl NewCampaign {
    pub fn new(name: impl Into<String>, dial_method: DialMethod) -> Self {
        Self {
            name: name.into(),
            caller_id: None,
            dial_method,
            dial_speed: 1.0,
            max_concurrent_calls: 10,
            abandon_rate_threshold: 0.03,
            pacing_multiplier: 1.0,
            retry_policy: None,
        }
    }
}

/// Partial settings update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignSettings {
    pub name: Option<String>,
    pub caller_id: Option<String>,
    pub dial_method: Option<DialMethod>,
    pub dial_speed: Option<f64>,
    pub max_concurrent_calls: Option<u32>,
    pub abandon_rate_threshold: Option<f64>,
    pub pacing_multiplier: Option<f64>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl CampaignSettings {
    fn apply_to(&self, campaign: &mut Campaign) {
        if let Some(name) = &self.name {
            campaign.name = name.clone();
        }
        if let Some(caller_id) = &self.caller_id {
            campaign.caller_id = caller_id.clone();
        }
        if let Some(method) = self.dial_method {
            campaign.dial_method = method;
        }
        if let Some(speed) = self.dial_speed {
            campaign.dial_speed = speed;
        }
        if let Some(max) = self.max_concurrent_calls {
            campaign.max_concurrent_calls = max;
        }
        if let Some(threshold) = self.abandon_rate_threshold {
            campaign.abandon_rate_threshold = threshold;
        }
        if let Some(multiplier) = self.pacing_multiplier {
            campaign.pacing_multiplier = multiplier;
        }
        if let Some(max_attempts) = self.max_attempts {
            campaign.retry_policy.max_attempts = max_attempts;
        }
        if let Some(delay) = self.retry_delay {
            campaign.retry_policy.retry_delay = delay;
        }
    }
}

/// Result of asking a campaign to auto-dial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOutcome {
    /// Campaign is active and its pacer loop is running
    Started { queued: i64 },
    /// No queued entries and no eligible contacts; campaign unchanged
    NothingToDial,
}

/// Check the numeric bounds of a campaign's settings
pub fn validate_campaign(campaign: &Campaign) -> Result<()> {
    if campaign.name.trim().is_empty() {
        return Err(DialerError::validation("campaign name must not be empty"));
    }
    if !(MIN_DIAL_SPEED..=MAX_DIAL_SPEED).contains(&campaign.dial_speed) {
        return Err(DialerError::validation(format!(
            "dial speed must be between {} and {}, got {}",
            MIN_DIAL_SPEED, MAX_DIAL_SPEED, campaign.dial_speed
        )));
    }
    if campaign.max_concurrent_calls < 1 {
        return Err(DialerError::validation("max concurrent calls must be at least 1"));
    }
    if !(0.0..=1.0).contains(&campaign.abandon_rate_threshold) {
        return Err(DialerError::validation(format!(
            "abandon rate threshold must be between 0 and 1, got {}",
            campaign.abandon_rate_threshold
        )));
    }
    if !(campaign.pacing_multiplier > 0.0 && campaign.pacing_multiplier <= MAX_PACING_MULTIPLIER) {
        return Err(DialerError::validation(format!(
            "pacing multiplier must be in (0, {}], got {}",
            MAX_PACING_MULTIPLIER, campaign.pacing_multiplier
        )));
    }
    if campaign.retry_policy.max_attempts < 1 {
        return Err(DialerError::validation("max attempts must be at least 1"));
    }
    Ok(())
}

pub struct CampaignController {
    db: DialerDatabase,
    queue: QueueBuilder,
    scheduler: Arc<PacerScheduler>,
    events: EventBus,
    default_caller_id: String,
    default_retry: RetryPolicy,
}

impl CampaignController {
    pub fn new(
        db: DialerDatabase,
        queue: QueueBuilder,
        scheduler: Arc<PacerScheduler>,
        config: &DialerConfig,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            queue,
            scheduler,
            events,
            default_caller_id: config.general.default_caller_id.clone(),
            default_retry: RetryPolicy {
                max_attempts: config.queue.default_max_attempts,
                retry_delay: Duration::from_secs(config.queue.default_retry_delay_secs),
            },
        }
    }

    pub async fn create_campaign(&self, new: NewCampaign) -> Result<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: CampaignId::new(),
            name: new.name.trim().to_string(),
            caller_id: new.caller_id.unwrap_or_else(|| self.default_caller_id.clone()),
            dial_method: new.dial_method,
            dial_speed: new.dial_speed,
            max_concurrent_calls: new.max_concurrent_calls,
            abandon_rate_threshold: new.abandon_rate_threshold,
            pacing_multiplier: new.pacing_multiplier,
            status: CampaignStatus::Draft,
            retry_policy: new.retry_policy.unwrap_or(self.default_retry),
            created_at: now,
            updated_at: now,
        };
        validate_campaign(&campaign)?;
        self.db.insert_campaign(&campaign).await?;

        info!(
            "📣 Created campaign {} '{}' ({}, {} calls/min/agent)",
            campaign.id, campaign.name, campaign.dial_method, campaign.dial_speed
        );
        self.events.publish(DialerEvent::CampaignCreated {
            campaign_id: campaign.id.clone(),
            name: campaign.name.clone(),
        });
        Ok(campaign)
    }

    pub async fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.db
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", campaign_id)))
    }

    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        self.db.list_campaigns().await
    }

    /// Change settings; validated as a whole before anything is written
    ///
    /// Pacing changes reach a running campaign on its next tick.
    pub async fn update_settings(&self, campaign_id: &CampaignId, settings: CampaignSettings) -> Result<Campaign> {
        let mut campaign = self.get_campaign(campaign_id).await?;
        if campaign.status == CampaignStatus::Archived {
            return Err(DialerError::invalid_transition(format!(
                "campaign {} is archived",
                campaign_id
            )));
        }

        settings.apply_to(&mut campaign);
        if let Some(name) = settings.name.as_ref() {
            campaign.name = name.trim().to_string();
        }
        validate_campaign(&campaign)?;
        campaign.updated_at = Utc::now();

        if !self.db.update_campaign_settings(&campaign).await? {
            return Err(DialerError::not_found(format!("campaign {}", campaign_id)));
        }
        info!("📣 Updated settings of campaign {}", campaign_id);
        self.events.publish(DialerEvent::CampaignUpdated {
            campaign_id: campaign_id.clone(),
        });
        Ok(campaign)
    }

    /// CAS the status from one of `allowed` to `to`
    async fn transition(
        &self,
        campaign_id: &CampaignId,
        allowed: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Campaign> {
        let campaign = self.get_campaign(campaign_id).await?;
        let from = campaign.status;
        if !allowed.contains(&from) {
            return Err(DialerError::invalid_transition(format!(
                "campaign {} cannot go from {} to {}",
                campaign_id, from, to
            )));
        }

        let now = Utc::now();
        if !self.db.transition_campaign_status(campaign_id, from, to, now).await? {
            return Err(DialerError::invalid_transition(format!(
                "campaign {} changed status concurrently",
                campaign_id
            )));
        }

        info!("📣 Campaign {} {} -> {}", campaign_id, from, to);
        self.events.publish(DialerEvent::CampaignStatusChanged {
            campaign_id: campaign_id.clone(),
            from,
            to,
        });
        Ok(Campaign {
            status: to,
            updated_at: now,
            ..campaign
        })
    }

    async fn require_active_list(&self, campaign_id: &CampaignId) -> Result<()> {
        if self.db.active_lists_for_campaign(campaign_id).await?.is_empty() {
            return Err(DialerError::configuration(format!(
                "campaign {} has no active data lists",
                campaign_id
            )));
        }
        Ok(())
    }

    /// `Draft -> Active` without starting the background pacer
    pub async fn start(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        let campaign = self.get_campaign(campaign_id).await?;
        if campaign.status != CampaignStatus::Draft {
            return Err(DialerError::invalid_transition(format!(
                "campaign {} is {}, only draft campaigns can be started",
                campaign_id, campaign.status
            )));
        }
        self.require_active_list(campaign_id).await?;
        self.transition(campaign_id, &[CampaignStatus::Draft], CampaignStatus::Active)
            .await
    }

    /// Activate a push-mode campaign and run its pacer loop
    pub async fn start_auto_dial(&self, campaign_id: &CampaignId) -> Result<StartOutcome> {
        let campaign = self.get_campaign(campaign_id).await?;
        if !strategy::is_push_method(campaign.dial_method) {
            return Err(DialerError::configuration(format!(
                "campaign {} dials {}, which does not auto-dial",
                campaign_id, campaign.dial_method
            )));
        }
        if !matches!(
            campaign.status,
            CampaignStatus::Draft | CampaignStatus::Paused | CampaignStatus::Active
        ) {
            return Err(DialerError::invalid_transition(format!(
                "campaign {} is {}",
                campaign_id, campaign.status
            )));
        }
        self.require_active_list(campaign_id).await?;

        let mut queued = self.db.count_entries(campaign_id, QueueEntryStatus::Queued).await?;
        if queued == 0 {
            if self.queue.count_eligible(campaign_id).await? == 0 {
                warn!("📭 Campaign {} has nothing to dial", campaign_id);
                return Ok(StartOutcome::NothingToDial);
            }
            queued = self.queue.generate_queue(campaign_id, 0).await?.len() as i64;
        }

        if campaign.status != CampaignStatus::Active {
            self.transition(campaign_id, &[campaign.status], CampaignStatus::Active)
                .await?;
        }
        self.scheduler.spawn(campaign_id);
        info!("📞 Auto-dial started for campaign {} ({} queued)", campaign_id, queued);
        Ok(StartOutcome::Started { queued })
    }

    pub async fn pause(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        let campaign = self
            .transition(campaign_id, &[CampaignStatus::Active], CampaignStatus::Paused)
            .await?;
        self.scheduler.stop(campaign_id).await;
        Ok(campaign)
    }

    /// `Paused -> Active`; push campaigns get their pacer loop back
    pub async fn resume(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        let campaign = self
            .transition(campaign_id, &[CampaignStatus::Paused], CampaignStatus::Active)
            .await?;
        if strategy::is_push_method(campaign.dial_method) {
            self.scheduler.spawn(campaign_id);
        }
        Ok(campaign)
    }

    /// Complete the campaign and drop its queued entries
    pub async fn stop(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        let campaign = self
            .transition(
                campaign_id,
                &[CampaignStatus::Active, CampaignStatus::Paused],
                CampaignStatus::Completed,
            )
            .await?;
        self.scheduler.stop(campaign_id).await;
        self.queue.clear(campaign_id).await?;
        Ok(campaign)
    }

    pub async fn archive(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.transition(
            campaign_id,
            &[CampaignStatus::Draft, CampaignStatus::Completed],
            CampaignStatus::Archived,
        )
        .await
    }

    /// Archive under a new name, completing a running campaign first
    pub async fn retire(&self, campaign_id: &CampaignId, new_name: &str) -> Result<Campaign> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(DialerError::validation("campaign name must not be empty"));
        }
        let campaign = self.get_campaign(campaign_id).await?;
        if matches!(campaign.status, CampaignStatus::Active | CampaignStatus::Paused) {
            self.stop(campaign_id).await?;
        }
        let mut campaign = match campaign.status {
            CampaignStatus::Archived => campaign,
            _ => self.archive(campaign_id).await?,
        };

        let now = Utc::now();
        self.db.rename_campaign(campaign_id, new_name, now).await?;
        info!("🗑️ Retired campaign {} as '{}'", campaign_id, new_name);
        campaign.name = new_name.to_string();
        campaign.updated_at = now;
        self.events.publish(DialerEvent::CampaignUpdated {
            campaign_id: campaign_id.clone(),
        });
        Ok(campaign)
    }

    pub fn is_auto_dialing(&self, campaign_id: &CampaignId) -> bool {
        self.scheduler.is_running(campaign_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign() -> Campaign {
        let now = Utc::now();
        Campaign {
            id: CampaignId::from("c1"),
            name: "Spring renewals".into(),
            caller_id: "+15550000000".into(),
            dial_method: DialMethod::Predictive,
            dial_speed: 2.0,
            max_concurrent_calls: 5,
            abandon_rate_threshold: 0.03,
            pacing_multiplier: 1.0,
            status: CampaignStatus::Draft,
            retry_policy: RetryPolicy::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validation_bounds() {
        assert!(validate_campaign(&campaign()).is_ok());

        let mut c = campaign();
        c.dial_speed = 4.5;
        assert!(matches!(validate_campaign(&c), Err(DialerError::Validation(_))));

        let mut c = campaign();
        c.dial_speed = 4.0;
        assert!(validate_campaign(&c).is_ok());

        let mut c = campaign();
        c.max_concurrent_calls = 0;
        assert!(validate_campaign(&c).is_err());

        let mut c = campaign();
        c.abandon_rate_threshold = 1.2;
        assert!(validate_campaign(&c).is_err());

        let mut c = campaign();
        c.pacing_multiplier = 0.0;
        assert!(validate_campaign(&c).is_err());

        let mut c = campaign();
        c.pacing_multiplier = 10.0;
        assert!(validate_campaign(&c).is_ok());

        let mut c = campaign();
        c.retry_policy.max_attempts = 0;
        assert!(validate_campaign(&c).is_err());
    }

    #[test]
    fn test_settings_only_touch_given_fields() {
        let mut c = campaign();
        CampaignSettings {
            dial_speed: Some(3.0),
            retry_delay: Some(Duration::from_secs(60)),
            ..Default::default()
        }
        .apply_to(&mut c);
        assert_eq!(c.dial_speed, 3.0);
        assert_eq!(c.retry_policy.retry_delay, Duration::from_secs(60));
        assert_eq!(c.max_concurrent_calls, 5);
        assert_eq!(c.name, "Spring renewals");
    }
}

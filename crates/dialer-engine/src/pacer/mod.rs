//! # Pacer
//!
//! Decides, tick by tick, how many queue entries to dial for a campaign and
//! hands them to the telephony collaborator.
//!
//! Every entry the pacer dials goes through the same claim sequence:
//!
//! 1. acquire the contact's lease for the dialing actor
//! 2. compare-and-set the entry `queued -> dialing`
//! 3. open a call record and place the call
//!
//! Losing either race skips the entry without side effects. A provider failure
//! is recorded as a `dial_error` outcome for that entry only; the rest of the
//! batch is unaffected. The do-not-call registry is consulted again right
//! before dialing, so a number blocked after the queue was built is finished
//! as `do_not_call` instead of being called.
//!
//! Ticks of one campaign are serialized; ticks of different campaigns run
//! independently.

pub mod rate;
pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::agents::AgentRoster;
use crate::campaign::strategy::{DialStrategy, StrategyInputs};
use crate::config::{DialerConfig, GeneralConfig, PacerConfig};
use crate::database::{AbandonStats, CallRecord, Campaign, Contact, DialerDatabase, QueueEntry};
use crate::error::{DialerError, Result};
use crate::events::{DialerEvent, EventBus};
use crate::lease::LeaseManager;
use crate::outcome::{ContactDisposition, OutcomeMetadata, OutcomeRecorder};
use crate::telephony::{callback_url, PlaceCallRequest, TelephonyProvider};
use crate::types::{
    ActorId, CallOutcome, CampaignId, CampaignStatus, ContactId, DialMethod, QueueEntryId, QueueEntryStatus,
};
use rate::TokenBucket;

pub use scheduler::PacerScheduler;

const DNC_BLOCKED_NOTE: &str = "number is on the do-not-call list";

/// Why a tick or a dial request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Campaign is not `active`
    NotActive,
    /// Campaign dials only on operator request
    PullMode,
    /// Campaign dial method is `skip`
    DialingDisabled,
    NoAgents,
    AtCapacity,
    RateLimited,
    QueueEmpty,
}

/// Result of one pacer tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub campaign_id: Option<CampaignId>,
    pub dial_method: Option<DialMethod>,
    /// Calls handed to the provider successfully
    pub dispatched: usize,
    /// Entries skipped because another actor won the lease or the claim
    pub lease_conflicts: usize,
    /// Calls the provider refused or failed to place
    pub provider_failures: usize,
    /// Claimed entries whose number was on the do-not-call list
    pub dnc_blocked: usize,
    /// Dialing entries outstanding when the tick started
    pub in_flight: i64,
    pub skipped: Option<SkipReason>,
}

impl TickReport {
    fn skipped(campaign_id: &CampaignId, reason: SkipReason) -> Self {
        Self {
            campaign_id: Some(campaign_id.clone()),
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Entries claimed this tick, whether or not the call went through
    pub fn attempted(&self) -> usize {
        self.dispatched + self.provider_failures + self.dnc_blocked
    }
}

/// Result of an operator's request for the next contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DialNext {
    /// Call placed on the agent's behalf
    Dialing {
        entry: QueueEntry,
        contact: Contact,
        provider_call_id: String,
    },
    /// Contact is held for the agent to review, nothing dialed yet
    Preview { entry: QueueEntry, contact: Contact },
    /// No call went out, either because the provider failed or because the
    /// number is on the do-not-call list; the outcome is already recorded
    Failed {
        disposition: Box<ContactDisposition>,
        reason: String,
    },
    Unavailable(SkipReason),
}

enum Placement {
    Placed(String),
    /// Number is on the do-not-call list; nothing was dialed
    Blocked(ContactDisposition),
    Failed {
        disposition: ContactDisposition,
        reason: String,
    },
}

/// Per-campaign pacing state
#[derive(Default)]
struct CampaignPacing {
    tick_lock: Mutex<()>,
    bucket: parking_lot::Mutex<Option<TokenBucket>>,
}

pub struct Pacer {
    db: DialerDatabase,
    config: PacerConfig,
    general: GeneralConfig,
    leases: LeaseManager,
    outcomes: OutcomeRecorder,
    agents: Arc<AgentRoster>,
    telephony: Arc<dyn TelephonyProvider>,
    events: EventBus,
    pacing: DashMap<CampaignId, Arc<CampaignPacing>>,
}

impl Pacer {
    pub fn new(
        db: DialerDatabase,
        config: &DialerConfig,
        agents: Arc<AgentRoster>,
        telephony: Arc<dyn TelephonyProvider>,
        events: EventBus,
    ) -> Self {
        Self {
            leases: LeaseManager::new(db.clone(), config.leases.default_ttl()),
            outcomes: OutcomeRecorder::new(db.clone(), events.clone()),
            db,
            config: config.pacer.clone(),
            general: config.general.clone(),
            agents,
            telephony,
            events,
            pacing: DashMap::new(),
        }
    }

    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    pub fn outcomes(&self) -> &OutcomeRecorder {
        &self.outcomes
    }

    pub fn agents(&self) -> &Arc<AgentRoster> {
        &self.agents
    }

    fn pacing_for(&self, campaign_id: &CampaignId) -> Arc<CampaignPacing> {
        self.pacing.entry(campaign_id.clone()).or_default().clone()
    }

    /// Forget rate state of a campaign, e.g. once it stops
    pub fn reset(&self, campaign_id: &CampaignId) {
        self.pacing.remove(campaign_id);
    }

    async fn load_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.db
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("campaign {}", campaign_id)))
    }

    async fn resolve_strategy(&self, campaign: &Campaign, now: DateTime<Utc>) -> Result<DialStrategy> {
        let abandon = if campaign.dial_method == DialMethod::Predictive {
            self.db
                .abandon_stats(&campaign.id, now - self.config.abandon_window())
                .await?
        } else {
            AbandonStats::default()
        };
        Ok(DialStrategy::resolve(
            campaign,
            &StrategyInputs {
                active_agents: self.agents.active_count(&campaign.id),
                abandon,
                abandon_min_samples: self.config.abandon_min_samples,
                min_throttle_factor: self.config.min_throttle_factor,
            },
        ))
    }

    pub async fn tick(&self, campaign_id: &CampaignId) -> Result<TickReport> {
        self.tick_at(campaign_id, Utc::now()).await
    }

    /// Run one pacing decision for a campaign at `now`
    pub async fn tick_at(&self, campaign_id: &CampaignId, now: DateTime<Utc>) -> Result<TickReport> {
        self.run_tick(campaign_id, now)
            .instrument(info_span!("dialer", component = "pacer", campaign = %campaign_id))
            .await
    }

    async fn run_tick(&self, campaign_id: &CampaignId, now: DateTime<Utc>) -> Result<TickReport> {
        let pacing = self.pacing_for(campaign_id);
        let _serialized = pacing.tick_lock.lock().await;

        let campaign = self.load_campaign(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Ok(TickReport::skipped(campaign_id, SkipReason::NotActive));
        }

        let strategy = self.resolve_strategy(&campaign, now).await?;
        let mut report = TickReport {
            campaign_id: Some(campaign_id.clone()),
            dial_method: Some(strategy.method()),
            ..TickReport::default()
        };

        let plan = match strategy {
            DialStrategy::Skip => {
                report.skipped = Some(SkipReason::DialingDisabled);
                return Ok(report);
            }
            DialStrategy::ManualDial { .. } | DialStrategy::ManualPreview { .. } => {
                report.skipped = Some(SkipReason::PullMode);
                return Ok(report);
            }
            DialStrategy::Progressive(plan) | DialStrategy::Predictive(plan) => plan,
        };

        if plan.active_agents == 0 || plan.rate_per_minute <= 0.0 {
            report.skipped = Some(SkipReason::NoAgents);
            return Ok(report);
        }

        report.in_flight = self.db.count_entries(campaign_id, QueueEntryStatus::Dialing).await?;
        let headroom = i64::from(plan.concurrency_cap) - report.in_flight;
        if headroom <= 0 {
            debug!(
                "Campaign {} at capacity ({}/{})",
                campaign_id, report.in_flight, plan.concurrency_cap
            );
            report.skipped = Some(SkipReason::AtCapacity);
            return Ok(report);
        }

        let tokens = {
            let mut guard = pacing.bucket.lock();
            let bucket = guard
                .get_or_insert_with(|| TokenBucket::new(plan.rate_per_minute, self.config.tick_interval(), now));
            if (bucket.rate_per_minute() - plan.rate_per_minute).abs() > f64::EPSILON {
                // Agent churn and throttling move the rate; the balance carries over
                bucket.retarget(plan.rate_per_minute, self.config.tick_interval(), now);
            }
            bucket.available(now)
        };
        if tokens == 0 {
            report.skipped = Some(SkipReason::RateLimited);
            return Ok(report);
        }

        let budget = (headroom as usize).min(tokens as usize);
        let candidates = self
            .db
            .ready_entries(campaign_id, budget + self.config.selection_slack as usize)
            .await?;
        if candidates.is_empty() {
            report.skipped = Some(SkipReason::QueueEmpty);
            return Ok(report);
        }

        let dialer = ActorId::auto_dialer();
        let mut claimed = Vec::with_capacity(budget);
        for entry in candidates {
            if claimed.len() >= budget {
                break;
            }
            match self.claim(&entry, &dialer, now).await? {
                Some(entry) => {
                    if let Some(bucket) = pacing.bucket.lock().as_mut() {
                        bucket.try_take(now);
                    }
                    claimed.push(entry);
                }
                None => report.lease_conflicts += 1,
            }
        }

        if claimed.is_empty() {
            report.skipped = Some(SkipReason::QueueEmpty);
            return Ok(report);
        }

        let placements = join_all(
            claimed
                .iter()
                .map(|entry| self.place_entry(&campaign, entry, &dialer, now)),
        )
        .await;

        for (entry, placement) in claimed.iter().zip(placements) {
            match placement {
                Ok(Placement::Placed(_)) => report.dispatched += 1,
                Ok(Placement::Failed { .. }) => report.provider_failures += 1,
                Ok(Placement::Blocked(_)) => report.dnc_blocked += 1,
                Err(e) => {
                    // Entry stays dialing; the reaper fails it once the lease lapses
                    warn!("Failed to dispatch entry {}: {}", entry.id, e);
                    report.provider_failures += 1;
                }
            }
        }

        info!(
            "📞 Tick for campaign {}: {} dispatched, {} failed, {} blocked, {} lease conflicts ({} in flight before)",
            campaign_id,
            report.dispatched,
            report.provider_failures,
            report.dnc_blocked,
            report.lease_conflicts,
            report.in_flight
        );
        Ok(report)
    }

    /// Lease the entry's contact and claim the entry for `actor`
    ///
    /// Returns `None` if either step loses to another actor; a lease won
    /// without the claim is given back.
    async fn claim(&self, entry: &QueueEntry, actor: &ActorId, now: DateTime<Utc>) -> Result<Option<QueueEntry>> {
        if !self
            .leases
            .acquire_at(&entry.contact_id, actor, self.leases.default_ttl(), now)
            .await?
        {
            return Ok(None);
        }
        if !self.db.claim_entry(&entry.id, actor, now).await? {
            self.leases.release(&entry.contact_id, actor).await?;
            return Ok(None);
        }
        Ok(Some(QueueEntry {
            status: QueueEntryStatus::Dialing,
            actor_id: Some(actor.clone()),
            dialed_at: Some(now),
            ..entry.clone()
        }))
    }

    async fn place_entry(
        &self,
        campaign: &Campaign,
        entry: &QueueEntry,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Placement> {
        let contact = self
            .db
            .get_contact(&entry.contact_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", entry.contact_id)))?;
        self.place(campaign, entry, &contact, actor, now).await
    }

    async fn place(
        &self,
        campaign: &Campaign,
        entry: &QueueEntry,
        contact: &Contact,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Placement> {
        let Some(phone) = contact.phone.clone() else {
            let disposition = self
                .outcomes
                .record_outcome_at(
                    &entry.id,
                    CallOutcome::InvalidNumber,
                    OutcomeMetadata::with_notes("contact has no phone number"),
                    now,
                )
                .await?;
            return Ok(Placement::Failed {
                disposition,
                reason: "contact has no phone number".to_string(),
            });
        };

        if self.db.is_dnc(&phone).await? {
            warn!("🚫 Not dialing entry {}: {} is on the do-not-call list", entry.id, phone);
            let disposition = self
                .outcomes
                .record_outcome_at(
                    &entry.id,
                    CallOutcome::DoNotCall,
                    OutcomeMetadata::with_notes(DNC_BLOCKED_NOTE),
                    now,
                )
                .await?;
            return Ok(Placement::Blocked(disposition));
        }

        let record = CallRecord::started(entry, actor, &phone, now);
        self.db.insert_call_record(&record).await?;

        let from = if campaign.caller_id.is_empty() {
            self.general.default_caller_id.clone()
        } else {
            campaign.caller_id.clone()
        };
        let request = PlaceCallRequest {
            from,
            to: phone.clone(),
            callback_url: callback_url(&self.general.callback_base_url, entry.id.as_str()),
            actor_hint: actor.to_string(),
        };

        match self.telephony.place_call(request).await {
            Ok(placed) => {
                self.db
                    .set_entry_provider_call_id(&entry.id, &placed.provider_call_id)
                    .await?;
                self.db
                    .set_call_record_provider_id(&record.id, &placed.provider_call_id)
                    .await?;
                debug!("📞 Dialing {} for entry {} ({})", phone, entry.id, placed.provider_call_id);
                self.events.publish(DialerEvent::DialStarted {
                    campaign_id: entry.campaign_id.clone(),
                    entry_id: entry.id.clone(),
                    contact_id: entry.contact_id.clone(),
                    actor_id: actor.clone(),
                    provider_call_id: Some(placed.provider_call_id.clone()),
                });
                Ok(Placement::Placed(placed.provider_call_id))
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("🚫 Provider failed to dial entry {}: {}", entry.id, reason);
                let disposition = self
                    .outcomes
                    .record_outcome_at(&entry.id, CallOutcome::DialError, OutcomeMetadata::with_notes(&reason), now)
                    .await?;
                self.events.publish(DialerEvent::DialFailed {
                    campaign_id: entry.campaign_id.clone(),
                    entry_id: entry.id.clone(),
                    contact_id: entry.contact_id.clone(),
                    reason: reason.clone(),
                });
                Ok(Placement::Failed { disposition, reason })
            }
        }
    }

    pub async fn dial_next(
        &self,
        campaign_id: &CampaignId,
        agent_id: &ActorId,
        contact_id: Option<&ContactId>,
    ) -> Result<DialNext> {
        self.dial_next_at(campaign_id, agent_id, contact_id, Utc::now()).await
    }

    /// Claim the next contact for an agent, or a specific one
    ///
    /// In preview campaigns the claimed entry is returned for review and only
    /// dialed by [`Pacer::confirm_preview`]. Naming a contact skips the queue
    /// order but not the lease: a contact held by someone else yields
    /// [`DialerError::LeaseConflict`].
    pub async fn dial_next_at(
        &self,
        campaign_id: &CampaignId,
        agent_id: &ActorId,
        contact_id: Option<&ContactId>,
        now: DateTime<Utc>,
    ) -> Result<DialNext> {
        let campaign = self.load_campaign(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Ok(DialNext::Unavailable(SkipReason::NotActive));
        }
        let strategy = self.resolve_strategy(&campaign, now).await?;
        let cap = strategy.manual_cap(&campaign);
        if cap == 0 {
            return Ok(DialNext::Unavailable(SkipReason::DialingDisabled));
        }
        let in_flight = self.db.count_entries(campaign_id, QueueEntryStatus::Dialing).await?;
        if in_flight >= i64::from(cap) {
            return Ok(DialNext::Unavailable(SkipReason::AtCapacity));
        }

        let claimed = match contact_id {
            Some(contact_id) => Some(self.claim_contact(&campaign, contact_id, agent_id, now).await?),
            None => self.claim_next(campaign_id, agent_id, now).await?,
        };
        let Some(entry) = claimed else {
            return Ok(DialNext::Unavailable(SkipReason::QueueEmpty));
        };

        let contact = self
            .db
            .get_contact(&entry.contact_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", entry.contact_id)))?;

        if strategy.previews() {
            info!("👤 Agent {} previewing contact {} (entry {})", agent_id, contact.id, entry.id);
            return Ok(DialNext::Preview { entry, contact });
        }

        info!("👤 Agent {} dialing contact {} (entry {})", agent_id, contact.id, entry.id);
        self.dial_claimed(&campaign, entry, contact, agent_id, now).await
    }

    async fn claim_next(
        &self,
        campaign_id: &CampaignId,
        agent_id: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>> {
        let candidates = self
            .db
            .ready_entries(campaign_id, 1 + self.config.selection_slack as usize)
            .await?;
        for entry in candidates {
            if let Some(entry) = self.claim(&entry, agent_id, now).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    async fn claim_contact(
        &self,
        campaign: &Campaign,
        contact_id: &ContactId,
        agent_id: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let contact = self
            .db
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", contact_id)))?;

        let list = self.db.get_list(&contact.list_id).await?;
        if list.and_then(|l| l.campaign_id).as_ref() != Some(&campaign.id) {
            return Err(DialerError::validation(format!(
                "contact {} does not belong to campaign {}",
                contact_id, campaign.id
            )));
        }
        let effective_max = contact.max_attempts.min(campaign.retry_policy.max_attempts);
        if !contact.status.is_dialable() || contact.attempt_count >= effective_max {
            return Err(DialerError::validation(format!(
                "contact {} is {} and cannot be dialed",
                contact_id, contact.status
            )));
        }
        match contact.phone.as_deref() {
            None => {
                return Err(DialerError::validation(format!(
                    "contact {} has no phone number",
                    contact_id
                )))
            }
            Some(phone) if self.db.is_dnc(phone).await? => {
                return Err(DialerError::validation(format!("contact {} is on the do-not-call list", contact_id)))
            }
            Some(_) => {}
        }

        if !self
            .leases
            .acquire_at(contact_id, agent_id, self.leases.default_ttl(), now)
            .await?
        {
            return Err(DialerError::lease_conflict(contact_id.as_str()));
        }

        let entry = match self.db.queued_entry_for_contact(&campaign.id, contact_id).await? {
            Some(entry) => entry,
            None => {
                let entry = QueueEntry::queued(
                    campaign.id.clone(),
                    contact.id.clone(),
                    contact.list_id.clone(),
                    contact.attempt_count,
                    now,
                );
                if self.db.insert_queue_entries(std::slice::from_ref(&entry)).await? == 0 {
                    // Contact already has live work somewhere else
                    self.leases.release(contact_id, agent_id).await?;
                    return Err(DialerError::lease_conflict(contact_id.as_str()));
                }
                entry
            }
        };

        if !self.db.claim_entry(&entry.id, agent_id, now).await? {
            self.leases.release(contact_id, agent_id).await?;
            return Err(DialerError::lease_conflict(contact_id.as_str()));
        }
        Ok(QueueEntry {
            status: QueueEntryStatus::Dialing,
            actor_id: Some(agent_id.clone()),
            dialed_at: Some(now),
            ..entry
        })
    }

    async fn dial_claimed(
        &self,
        campaign: &Campaign,
        entry: QueueEntry,
        contact: Contact,
        agent_id: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<DialNext> {
        match self.place(campaign, &entry, &contact, agent_id, now).await? {
            Placement::Placed(provider_call_id) => Ok(DialNext::Dialing {
                entry: QueueEntry {
                    provider_call_id: Some(provider_call_id.clone()),
                    ..entry
                },
                contact,
                provider_call_id,
            }),
            Placement::Failed { disposition, reason } => Ok(DialNext::Failed {
                disposition: Box::new(disposition),
                reason,
            }),
            Placement::Blocked(disposition) => Ok(DialNext::Failed {
                disposition: Box::new(disposition),
                reason: DNC_BLOCKED_NOTE.to_string(),
            }),
        }
    }

    /// Load a previewed entry, checking that `agent_id` owns it
    async fn previewed_entry(&self, entry_id: &QueueEntryId, agent_id: &ActorId) -> Result<QueueEntry> {
        let entry = self
            .db
            .get_queue_entry(entry_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("queue entry {}", entry_id)))?;
        if entry.status != QueueEntryStatus::Dialing || entry.actor_id.as_ref() != Some(agent_id) {
            return Err(DialerError::invalid_transition(format!(
                "queue entry {} is not held by agent {}",
                entry_id, agent_id
            )));
        }
        if !self.db.call_records_for_entry(entry_id).await?.is_empty() {
            return Err(DialerError::invalid_transition(format!(
                "queue entry {} was already dialed",
                entry_id
            )));
        }
        Ok(entry)
    }

    pub async fn confirm_preview(&self, entry_id: &QueueEntryId, agent_id: &ActorId) -> Result<DialNext> {
        self.confirm_preview_at(entry_id, agent_id, Utc::now()).await
    }

    /// Dial a previewed contact
    pub async fn confirm_preview_at(
        &self,
        entry_id: &QueueEntryId,
        agent_id: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<DialNext> {
        let entry = self.previewed_entry(entry_id, agent_id).await?;
        let campaign = self.load_campaign(&entry.campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Err(DialerError::invalid_transition(format!(
                "campaign {} is {}, not active",
                campaign.id, campaign.status
            )));
        }

        // The call gets a full lease, not what is left of the preview's
        if !self
            .leases
            .renew_at(&entry.contact_id, agent_id, self.leases.default_ttl(), now)
            .await?
        {
            return Err(DialerError::invalid_transition(format!(
                "lease on contact {} lapsed during preview",
                entry.contact_id
            )));
        }

        let contact = self
            .db
            .get_contact(&entry.contact_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("contact {}", entry.contact_id)))?;
        info!("👤 Agent {} confirmed preview of entry {}", agent_id, entry_id);
        self.dial_claimed(&campaign, entry, contact, agent_id, now).await
    }

    /// Pass on a previewed contact without calling it
    pub async fn skip_preview(&self, entry_id: &QueueEntryId, agent_id: &ActorId) -> Result<ContactDisposition> {
        self.previewed_entry(entry_id, agent_id).await?;
        info!("👤 Agent {} skipped preview of entry {}", agent_id, entry_id);
        self.outcomes
            .record_outcome(entry_id, CallOutcome::Skipped, OutcomeMetadata::default())
            .await
    }

    pub async fn heartbeat(&self, entry_id: &QueueEntryId) -> Result<bool> {
        self.heartbeat_at(entry_id, Utc::now(), self.leases.default_ttl()).await
    }

    /// Extend the lease behind a dialing entry so a long call is not reaped
    pub async fn heartbeat_at(&self, entry_id: &QueueEntryId, now: DateTime<Utc>, ttl: Duration) -> Result<bool> {
        let entry = self
            .db
            .get_queue_entry(entry_id)
            .await?
            .ok_or_else(|| DialerError::not_found(format!("queue entry {}", entry_id)))?;
        match (entry.status, entry.actor_id.as_ref()) {
            (QueueEntryStatus::Dialing, Some(actor)) => {
                self.leases.renew_at(&entry.contact_id, actor, ttl, now).await
            }
            _ => Ok(false),
        }
    }
}

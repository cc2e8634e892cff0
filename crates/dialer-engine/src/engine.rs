//! Dialer engine façade
//!
//! Wires the components onto one database and one event bus, and exposes the
//! control surface an HTTP or CLI layer would call. Each component is also
//! reachable directly for finer-grained use.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::agents::AgentRoster;
use crate::campaign::{CampaignController, StartOutcome};
use crate::config::DialerConfig;
use crate::contacts::{ContactStore, IngestOptions, IngestReport};
use crate::data_lists::DataListRegistry;
use crate::database::{Campaign, DialerDatabase};
use crate::error::{DialerError, Result};
use crate::events::EventBus;
use crate::lease::LeaseManager;
use crate::outcome::{ContactDisposition, OutcomeMetadata, OutcomeRecorder};
use crate::pacer::{DialNext, Pacer, PacerScheduler};
use crate::queue::{QueueBuilder, QueueGeneration};
use crate::telephony::TelephonyProvider;
use crate::types::{ActorId, CallOutcome, CampaignId, ContactId, ListId, QueueEntryId};

pub struct DialerEngine {
    config: DialerConfig,
    db: DialerDatabase,
    events: EventBus,
    agents: Arc<AgentRoster>,
    contacts: ContactStore,
    lists: DataListRegistry,
    queue: QueueBuilder,
    pacer: Arc<Pacer>,
    scheduler: Arc<PacerScheduler>,
    campaigns: CampaignController,
}

impl DialerEngine {
    /// Open the configured database and build every component on it
    pub async fn new(config: DialerConfig, telephony: Arc<dyn TelephonyProvider>) -> Result<Self> {
        config.validate().map_err(DialerError::config)?;
        let db = DialerDatabase::from_config(&config.database).await?;
        Ok(Self::with_database(config, db, telephony))
    }

    pub fn with_database(config: DialerConfig, db: DialerDatabase, telephony: Arc<dyn TelephonyProvider>) -> Self {
        let events = EventBus::new(config.general.event_channel_capacity);
        let agents = Arc::new(AgentRoster::new());

        let contacts = ContactStore::new(db.clone(), config.ingest.clone(), events.clone());
        let lists = DataListRegistry::new(db.clone());
        let queue = QueueBuilder::new(db.clone(), config.queue.clone(), events.clone());
        let pacer = Arc::new(Pacer::new(db.clone(), &config, agents.clone(), telephony, events.clone()));
        let scheduler = Arc::new(PacerScheduler::new(pacer.clone(), queue.clone(), &config));
        let campaigns = CampaignController::new(db.clone(), queue.clone(), scheduler.clone(), &config, events.clone());

        info!("✅ Dialer engine ready");
        Self {
            config,
            db,
            events,
            agents,
            contacts,
            lists,
            queue,
            pacer,
            scheduler,
            campaigns,
        }
    }

    pub async fn generate_queue(&self, campaign_id: &CampaignId, max_records: usize) -> Result<QueueGeneration> {
        self.queue.generate_queue(campaign_id, max_records).await
    }

    pub async fn start_auto_dial(&self, campaign_id: &CampaignId) -> Result<StartOutcome> {
        self.campaigns.start_auto_dial(campaign_id).await
    }

    pub async fn pause(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.campaigns.pause(campaign_id).await
    }

    pub async fn resume(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.campaigns.resume(campaign_id).await
    }

    pub async fn stop(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.campaigns.stop(campaign_id).await
    }

    pub async fn dial_next(
        &self,
        campaign_id: &CampaignId,
        agent_id: &ActorId,
        contact_id: Option<&ContactId>,
    ) -> Result<DialNext> {
        self.pacer.dial_next(campaign_id, agent_id, contact_id).await
    }

    pub async fn record_outcome(
        &self,
        entry_id: &QueueEntryId,
        outcome: CallOutcome,
        metadata: OutcomeMetadata,
    ) -> Result<ContactDisposition> {
        self.pacer.outcomes().record_outcome(entry_id, outcome, metadata).await
    }

    pub async fn upload_contacts(
        &self,
        list_id: &ListId,
        rows: &[HashMap<String, String>],
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        self.contacts.upload_contacts(list_id, rows, options).await
    }

    /// Stop every pacer loop and close the database
    pub async fn shutdown(&self) {
        self.scheduler.stop_all().await;
        self.db.close().await;
        info!("🛑 Dialer engine shut down");
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    pub fn database(&self) -> &DialerDatabase {
        &self.db
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn agents(&self) -> &AgentRoster {
        &self.agents
    }

    pub fn contacts(&self) -> &ContactStore {
        &self.contacts
    }

    pub fn lists(&self) -> &DataListRegistry {
        &self.lists
    }

    pub fn queue(&self) -> &QueueBuilder {
        &self.queue
    }

    pub fn leases(&self) -> &LeaseManager {
        self.pacer.leases()
    }

    pub fn outcomes(&self) -> &OutcomeRecorder {
        self.pacer.outcomes()
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn scheduler(&self) -> &PacerScheduler {
        &self.scheduler
    }

    pub fn campaigns(&self) -> &CampaignController {
        &self.campaigns
    }
}

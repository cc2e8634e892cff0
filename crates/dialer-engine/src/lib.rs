//! # Dialer Engine
//!
//! Outbound campaign dialing for the rvoip stack: contact lists are blended
//! into per-campaign queues, a pacer dials them at a rate derived from agent
//! availability, and every dial holds an exclusive lease on its contact so no
//! two actors ever call the same person at once.
//!
//! ## Components
//!
//! - [`contacts::ContactStore`] - contact records, bulk ingestion, do-not-call registry
//! - [`data_lists::DataListRegistry`] - named contact lists with blend weights
//! - [`queue::QueueBuilder`] - eligibility filtering and weighted queue generation
//! - [`lease::LeaseManager`] - compare-and-set contact leases with expiry
//! - [`pacer::Pacer`] / [`pacer::PacerScheduler`] - rate and concurrency control, background loops
//! - [`outcome::OutcomeRecorder`] - outcome classification, retry and exhaustion
//! - [`campaign::CampaignController`] - campaign settings and lifecycle
//! - [`engine::DialerEngine`] - all of the above wired onto one database
//!
//! Call placement is delegated to a [`telephony::TelephonyProvider`]; the
//! engine never speaks SIP itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_dialer_engine::prelude::*;
//!
//! # async fn example(provider: Arc<dyn TelephonyProvider>) -> Result<()> {
//! let mut config = DialerConfig::default();
//! config.database.database_path = ":memory:".to_string();
//! let engine = DialerEngine::new(config, provider).await?;
//!
//! let campaign = engine
//!     .campaigns()
//!     .create_campaign(NewCampaign::new("Renewals", DialMethod::Progressive))
//!     .await?;
//! let list = engine.lists().create_list("Q3 leads", 100, Some(&campaign.id)).await?;
//! // ... upload contacts into `list.id` ...
//! # let _ = list;
//!
//! engine.agents().set_available(&campaign.id, &ActorId::from("agent-7"), true);
//! match engine.start_auto_dial(&campaign.id).await? {
//!     StartOutcome::Started { queued } => println!("dialing {} entries", queued),
//!     StartOutcome::NothingToDial => println!("nothing eligible yet"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod campaign;
pub mod config;
pub mod contacts;
pub mod data_lists;
pub mod database;
pub mod engine;
pub mod error;
pub mod events;
pub mod lease;
pub mod logging;
pub mod outcome;
pub mod pacer;
pub mod queue;
pub mod telephony;
pub mod types;

pub use config::DialerConfig;
pub use engine::DialerEngine;
pub use error::{DialerError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::agents::AgentRoster;
    pub use crate::campaign::{CampaignController, CampaignSettings, DialStrategy, NewCampaign, StartOutcome};
    pub use crate::config::DialerConfig;
    pub use crate::contacts::{ContactStore, FieldMapping, IngestOptions, IngestReport, RejectReason};
    pub use crate::data_lists::DataListRegistry;
    pub use crate::database::{
        CallRecord, Campaign, Contact, DataList, DialerDatabase, Lease, QueueEntry, RetryPolicy,
    };
    pub use crate::engine::DialerEngine;
    pub use crate::error::{DialerError, Result};
    pub use crate::events::{DialerEvent, EventBus, EventHandler, TimestampedEvent};
    pub use crate::lease::LeaseManager;
    pub use crate::logging::{setup_logging, LoggingConfig};
    pub use crate::outcome::{ContactDisposition, OutcomeMetadata, OutcomeRecorder};
    pub use crate::pacer::{DialNext, Pacer, PacerScheduler, SkipReason, TickReport};
    pub use crate::queue::{GenerationSignal, QueueBuilder, QueueGeneration};
    pub use crate::telephony::{PlaceCallRequest, PlacedCall, ProviderError, TelephonyProvider};
    pub use crate::types::{
        ActorId, CallOutcome, CampaignId, CampaignStatus, ContactId, ContactStatus, DialMethod, ListId,
        QueueEntryId, QueueEntryStatus,
    };
}

//! Background pacing loops
//!
//! One tokio task per running campaign. Each task ticks the [`Pacer`] on the
//! configured interval, reaps dialing entries whose lease ran out every few
//! ticks, and regenerates the queue when it drains (if enabled).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{Pacer, SkipReason, TickReport};
use crate::config::DialerConfig;
use crate::error::{DialerError, Result};
use crate::queue::{GenerationSignal, QueueBuilder};
use crate::types::CampaignId;

#[derive(Debug, Clone)]
struct LoopSettings {
    tick_interval: Duration,
    reap_every_ticks: u32,
    auto_replenish: bool,
}

struct RunningCampaign {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Per-campaign work done on each tick
#[derive(Clone)]
struct CampaignLoop {
    campaign_id: CampaignId,
    pacer: Arc<Pacer>,
    queue: QueueBuilder,
    settings: LoopSettings,
}

impl CampaignLoop {
    async fn cycle(&self, tick_number: u64, now: DateTime<Utc>) -> Result<TickReport> {
        let reap_every = u64::from(self.settings.reap_every_ticks);
        if reap_every > 0 && tick_number % reap_every == 0 {
            let reaped = self
                .pacer
                .outcomes()
                .reap_stale_dialing_at(&self.campaign_id, now)
                .await?;
            if reaped > 0 {
                info!("🧹 Reaped {} stale dialing entries in campaign {}", reaped, self.campaign_id);
            }
            self.pacer.leases().purge_expired().await?;
        }

        let report = self.pacer.tick_at(&self.campaign_id, now).await?;
        if report.skipped == Some(SkipReason::QueueEmpty) && self.settings.auto_replenish {
            let generation = self.queue.generate_queue_at(&self.campaign_id, 0, now).await?;
            if generation.signal != GenerationSignal::Generated {
                debug!("Campaign {} has nothing left to queue: {:?}", self.campaign_id, generation.signal);
            }
        }
        Ok(report)
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        info!("🔄 Pacer loop started for campaign {}", self.campaign_id);
        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_number: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }

            tick_number += 1;
            match self.cycle(tick_number, Utc::now()).await {
                Ok(_) => {}
                Err(DialerError::NotFound(what)) => {
                    warn!("Stopping pacer loop for campaign {}: {} not found", self.campaign_id, what);
                    break;
                }
                Err(e) => error!("Pacer tick failed for campaign {}: {}", self.campaign_id, e),
            }
        }

        info!("🛑 Pacer loop stopped for campaign {}", self.campaign_id);
    }
}

/// Owns the background pacing tasks
pub struct PacerScheduler {
    pacer: Arc<Pacer>,
    queue: QueueBuilder,
    settings: LoopSettings,
    running: DashMap<CampaignId, RunningCampaign>,
}

impl PacerScheduler {
    pub fn new(pacer: Arc<Pacer>, queue: QueueBuilder, config: &DialerConfig) -> Self {
        Self {
            pacer,
            queue,
            settings: LoopSettings {
                tick_interval: config.pacer.tick_interval(),
                reap_every_ticks: config.leases.reap_every_ticks,
                auto_replenish: config.queue.auto_replenish,
            },
            running: DashMap::new(),
        }
    }

    fn campaign_loop(&self, campaign_id: &CampaignId) -> CampaignLoop {
        CampaignLoop {
            campaign_id: campaign_id.clone(),
            pacer: self.pacer.clone(),
            queue: self.queue.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Start the campaign's loop; a no-op if it is already running
    pub fn spawn(&self, campaign_id: &CampaignId) -> bool {
        if let Some(existing) = self.running.get(campaign_id) {
            if !existing.handle.is_finished() {
                debug!("Pacer loop for campaign {} already running", campaign_id);
                return false;
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.campaign_loop(campaign_id).run(stop_rx));
        self.running.insert(
            campaign_id.clone(),
            RunningCampaign {
                stop: stop_tx,
                handle,
            },
        );
        true
    }

    /// Signal the campaign's loop to stop and wait for it to exit
    ///
    /// A call already handed to the provider is not cancelled.
    pub async fn stop(&self, campaign_id: &CampaignId) -> bool {
        let Some((_, running)) = self.running.remove(campaign_id) else {
            return false;
        };
        let _ = running.stop.send(true);
        if let Err(e) = running.handle.await {
            if !e.is_cancelled() {
                error!("Pacer loop for campaign {} ended abnormally: {}", campaign_id, e);
            }
        }
        self.pacer.reset(campaign_id);
        true
    }

    pub async fn stop_all(&self) {
        let campaigns: Vec<CampaignId> = self.running.iter().map(|r| r.key().clone()).collect();
        for campaign_id in campaigns {
            self.stop(&campaign_id).await;
        }
    }

    pub fn is_running(&self, campaign_id: &CampaignId) -> bool {
        self.running
            .get(campaign_id)
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn running_campaigns(&self) -> Vec<CampaignId> {
        let mut campaigns: Vec<CampaignId> = self
            .running
            .iter()
            .filter(|r| !r.handle.is_finished())
            .map(|r| r.key().clone())
            .collect();
        campaigns.sort();
        campaigns
    }

    /// Run one loop iteration in the foreground
    ///
    /// `tick_number` drives the reaping cadence the way the background loop's
    /// counter does.
    pub async fn run_cycle_at(
        &self,
        campaign_id: &CampaignId,
        tick_number: u64,
        now: DateTime<Utc>,
    ) -> Result<TickReport> {
        self.campaign_loop(campaign_id).cycle(tick_number, now).await
    }
}

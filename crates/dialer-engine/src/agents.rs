//! Agent availability per campaign
//!
//! Agent login, skills and routing live elsewhere in the stack; the dialer
//! only needs to know how many agents are ready to take calls for each
//! campaign, since that count drives the progressive and predictive rate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

use crate::types::{ActorId, CampaignId};

#[derive(Debug, Clone)]
struct Presence {
    available: HashSet<ActorId>,
    changed_at: DateTime<Utc>,
}

/// In-memory roster of available agents, keyed by campaign
#[derive(Debug, Default)]
pub struct AgentRoster {
    campaigns: DashMap<CampaignId, Presence>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an agent available (or not) for a campaign
    pub fn set_available(&self, campaign_id: &CampaignId, agent_id: &ActorId, available: bool) {
        let mut presence = self.campaigns.entry(campaign_id.clone()).or_insert_with(|| Presence {
            available: HashSet::new(),
            changed_at: Utc::now(),
        });
        let changed = if available {
            presence.available.insert(agent_id.clone())
        } else {
            presence.available.remove(agent_id)
        };
        if changed {
            presence.changed_at = Utc::now();
            info!(
                "👤 Agent {} {} for campaign {} ({} available)",
                agent_id,
                if available { "available" } else { "unavailable" },
                campaign_id,
                presence.available.len()
            );
        }
    }

    pub fn is_available(&self, campaign_id: &CampaignId, agent_id: &ActorId) -> bool {
        self.campaigns
            .get(campaign_id)
            .map(|p| p.available.contains(agent_id))
            .unwrap_or(false)
    }

    pub fn active_count(&self, campaign_id: &CampaignId) -> usize {
        self.campaigns.get(campaign_id).map(|p| p.available.len()).unwrap_or(0)
    }

    pub fn available_agents(&self, campaign_id: &CampaignId) -> Vec<ActorId> {
        let mut agents: Vec<ActorId> = self
            .campaigns
            .get(campaign_id)
            .map(|p| p.available.iter().cloned().collect())
            .unwrap_or_default();
        agents.sort();
        agents
    }

    pub fn last_change(&self, campaign_id: &CampaignId) -> Option<DateTime<Utc>> {
        self.campaigns.get(campaign_id).map(|p| p.changed_at)
    }

    /// Forget every agent of a campaign
    pub fn clear(&self, campaign_id: &CampaignId) {
        self.campaigns.remove(campaign_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_is_tracked_per_campaign() {
        let roster = AgentRoster::new();
        let sales = CampaignId::from("sales");
        let support = CampaignId::from("support");
        let ada = ActorId::from("ada");

        roster.set_available(&sales, &ada, true);
        roster.set_available(&sales, &ActorId::from("bob"), true);
        roster.set_available(&sales, &ada, true);

        assert_eq!(roster.active_count(&sales), 2);
        assert_eq!(roster.active_count(&support), 0);
        assert!(roster.is_available(&sales, &ada));
        assert!(!roster.is_available(&support, &ada));

        roster.set_available(&sales, &ada, false);
        assert_eq!(roster.available_agents(&sales), vec![ActorId::from("bob")]);

        roster.clear(&sales);
        assert_eq!(roster.active_count(&sales), 0);
        assert!(roster.last_change(&sales).is_none());
    }
}

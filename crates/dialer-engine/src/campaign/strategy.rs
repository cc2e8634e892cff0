//! Dial strategy resolution
//!
//! A campaign's dial method is resolved once per pacer tick into a
//! [`DialStrategy`], so every decision in that tick sees the same rate and
//! concurrency cap.

use serde::{Deserialize, Serialize};

use crate::database::{AbandonStats, Campaign};
use crate::pacer::rate::throttle_factor;
use crate::types::DialMethod;

/// Push-mode pacing numbers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PushPlan {
    /// Target call initiations per minute
    pub rate_per_minute: f64,
    /// Maximum dialing entries outstanding at once
    pub concurrency_cap: u32,
    /// Abandon-rate throttle applied (1.0 = none)
    pub throttle: f64,
    pub active_agents: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DialStrategy {
    Progressive(PushPlan),
    Predictive(PushPlan),
    /// Operator pulls the next contact and it is dialed at once
    ManualDial { concurrency_cap: u32 },
    /// Operator pulls the next contact and reviews it before dialing
    ManualPreview { concurrency_cap: u32 },
    Skip,
}

/// Runtime inputs to strategy resolution
#[derive(Debug, Clone, Copy)]
pub struct StrategyInputs {
    pub active_agents: usize,
    pub abandon: AbandonStats,
    pub abandon_min_samples: u32,
    pub min_throttle_factor: f64,
}

impl DialStrategy {
    pub fn resolve(campaign: &Campaign, inputs: &StrategyInputs) -> Self {
        let agents = inputs.active_agents;
        let base_rate = campaign.dial_speed * campaign.pacing_multiplier * agents as f64;
        let max_concurrent = campaign.max_concurrent_calls.max(1);

        match campaign.dial_method {
            DialMethod::Progressive => DialStrategy::Progressive(PushPlan {
                rate_per_minute: base_rate,
                concurrency_cap: max_concurrent.min(agents as u32),
                throttle: 1.0,
                active_agents: agents,
            }),
            DialMethod::Predictive => {
                let throttle = throttle_factor(
                    &inputs.abandon,
                    campaign.abandon_rate_threshold,
                    inputs.abandon_min_samples,
                    inputs.min_throttle_factor,
                );
                let cap = ((f64::from(max_concurrent) * throttle).floor() as u32).max(1);
                DialStrategy::Predictive(PushPlan {
                    rate_per_minute: base_rate * throttle,
                    concurrency_cap: cap,
                    throttle,
                    active_agents: agents,
                })
            }
            DialMethod::ManualDial => DialStrategy::ManualDial { concurrency_cap: max_concurrent },
            DialMethod::ManualPreview => DialStrategy::ManualPreview { concurrency_cap: max_concurrent },
            DialMethod::Skip => DialStrategy::Skip,
        }
    }

    pub fn method(&self) -> DialMethod {
        match self {
            DialStrategy::Progressive(_) => DialMethod::Progressive,
            DialStrategy::Predictive(_) => DialMethod::Predictive,
            DialStrategy::ManualDial { .. } => DialMethod::ManualDial,
            DialStrategy::ManualPreview { .. } => DialMethod::ManualPreview,
            DialStrategy::Skip => DialMethod::Skip,
        }
    }

    /// Pacer pushes calls on its own clock
    pub fn is_push(&self) -> bool {
        matches!(self, DialStrategy::Progressive(_) | DialStrategy::Predictive(_))
    }

    /// Calls start only on operator request
    pub fn is_pull(&self) -> bool {
        matches!(self, DialStrategy::ManualDial { .. } | DialStrategy::ManualPreview { .. })
    }

    pub fn push_plan(&self) -> Option<&PushPlan> {
        match self {
            DialStrategy::Progressive(plan) | DialStrategy::Predictive(plan) => Some(plan),
            _ => None,
        }
    }

    /// Cap on outstanding dials, zero when dialing is disabled
    ///
    /// Operator requests in a push campaign are held to the campaign's
    /// configured maximum rather than the agent-derived push cap.
    pub fn manual_cap(&self, campaign: &Campaign) -> u32 {
        match self {
            DialStrategy::ManualDial { concurrency_cap } | DialStrategy::ManualPreview { concurrency_cap } => {
                *concurrency_cap
            }
            DialStrategy::Progressive(_) | DialStrategy::Predictive(_) => campaign.max_concurrent_calls.max(1),
            DialStrategy::Skip => 0,
        }
    }

    /// Operator requests hold the contact for review instead of dialing
    pub fn previews(&self) -> bool {
        matches!(self, DialStrategy::ManualPreview { .. })
    }
}

/// Whether a dial method runs the push loop
pub fn is_push_method(method: DialMethod) -> bool {
    matches!(method, DialMethod::Progressive | DialMethod::Predictive)
}

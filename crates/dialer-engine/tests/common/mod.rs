//! Shared fixtures for the dialer integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rvoip_dialer_engine::prelude::*;

/// Telephony double that records every request
#[derive(Default)]
pub struct MockProvider {
    placed: Mutex<Vec<PlaceCallRequest>>,
    failing: Mutex<HashSet<String>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `phone` fail with `Unavailable`
    pub fn fail_number(&self, phone: &str) {
        self.failing.lock().insert(phone.to_string());
    }

    pub fn placed(&self) -> Vec<PlaceCallRequest> {
        self.placed.lock().clone()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.lock().len()
    }
}

#[async_trait]
impl TelephonyProvider for MockProvider {
    async fn place_call(&self, request: PlaceCallRequest) -> std::result::Result<PlacedCall, ProviderError> {
        if self.failing.lock().contains(&request.to) {
            return Err(ProviderError::Unavailable(format!("no route to {}", request.to)));
        }
        let mut placed = self.placed.lock();
        placed.push(request);
        Ok(PlacedCall {
            provider_call_id: format!("mock-call-{}", placed.len()),
        })
    }
}

pub struct TestDialer {
    pub engine: DialerEngine,
    pub provider: Arc<MockProvider>,
}

pub async fn test_dialer() -> TestDialer {
    test_dialer_with(DialerConfig::default()).await
}

pub async fn test_dialer_with(config: DialerConfig) -> TestDialer {
    let provider = MockProvider::new();
    let db = DialerDatabase::new_in_memory()
        .await
        .expect("Failed to create in-memory database");
    let engine = DialerEngine::with_database(config, db, provider.clone());
    TestDialer { engine, provider }
}

/// Canonical test phone number `n` of batch `batch`
pub fn phone(batch: u32, n: u32) -> String {
    format!("+1555{:03}{:04}", batch, n)
}

/// `count` valid upload rows with distinct phones
pub fn contact_rows(batch: u32, count: u32) -> Vec<HashMap<String, String>> {
    (0..count)
        .map(|n| {
            HashMap::from([
                ("first_name".to_string(), format!("First{}", n)),
                ("last_name".to_string(), format!("Batch{}", batch)),
                ("phone".to_string(), phone(batch, n)),
            ])
        })
        .collect()
}

pub fn campaign_params(method: DialMethod) -> NewCampaign {
    NewCampaign {
        dial_speed: 2.0,
        max_concurrent_calls: 10,
        ..NewCampaign::new(format!("{} campaign", method), method)
    }
}

/// Campaign with a single weight-100 list holding `contacts` contacts
pub async fn campaign_with_contacts(
    engine: &DialerEngine,
    new: NewCampaign,
    contacts: u32,
) -> (Campaign, DataList) {
    let campaign = engine
        .campaigns()
        .create_campaign(new)
        .await
        .expect("Failed to create campaign");
    let list = add_list(engine, &campaign.id, 100, 1, contacts).await;
    (campaign, list)
}

pub async fn add_list(
    engine: &DialerEngine,
    campaign_id: &CampaignId,
    weight: u32,
    batch: u32,
    contacts: u32,
) -> DataList {
    let list = engine
        .lists()
        .create_list(&format!("list-{}", batch), weight, Some(campaign_id))
        .await
        .expect("Failed to create list");
    let report = engine
        .upload_contacts(&list.id, &contact_rows(batch, contacts), &IngestOptions::default())
        .await
        .expect("Failed to upload contacts");
    assert_eq!(report.accepted, contacts as usize);
    list
}

/// Mark `count` agents available for a campaign
pub fn staff(engine: &DialerEngine, campaign_id: &CampaignId, count: usize) -> Vec<ActorId> {
    (0..count)
        .map(|n| {
            let agent = ActorId::from(format!("agent-{}", n));
            engine.agents().set_available(campaign_id, &agent, true);
            agent
        })
        .collect()
}

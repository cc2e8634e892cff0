//! Performance benchmarks for the dialer engine
//!
//! These benchmarks measure the hot paths of outbound dialing: list blending,
//! queue generation and the claim-and-dial pacer tick.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rvoip_dialer_engine::prelude::*;
use rvoip_dialer_engine::queue::blend::{blend, BlendLane};
use tokio::runtime::Runtime;

struct NullProvider;

#[async_trait]
impl TelephonyProvider for NullProvider {
    async fn place_call(&self, request: PlaceCallRequest) -> std::result::Result<PlacedCall, ProviderError> {
        Ok(PlacedCall {
            provider_call_id: format!("bench-{}", request.to),
        })
    }
}

fn rows(count: u32) -> Vec<HashMap<String, String>> {
    (0..count)
        .map(|n| {
            HashMap::from([
                ("first_name".to_string(), format!("Lead{}", n)),
                ("phone".to_string(), format!("+1555{:07}", n)),
            ])
        })
        .collect()
}

async fn seeded_engine(contacts: u32) -> (DialerEngine, CampaignId) {
    let mut config = DialerConfig::default();
    config.pacer.tick_interval_ms = 60_000;
    let database = DialerDatabase::new_in_memory().await.unwrap();
    let engine = DialerEngine::with_database(config, database, Arc::new(NullProvider));

    let campaign = engine
        .campaigns()
        .create_campaign(NewCampaign {
            dial_speed: 4.0,
            max_concurrent_calls: 100,
            ..NewCampaign::new("bench", DialMethod::Predictive)
        })
        .await
        .unwrap();
    let list = engine
        .lists()
        .create_list("bench-list", 100, Some(&campaign.id))
        .await
        .unwrap();
    engine
        .upload_contacts(&list.id, &rows(contacts), &IngestOptions::default())
        .await
        .unwrap();
    (engine, campaign.id)
}

/// Benchmark weighted blending of three lists
fn benchmark_blend(c: &mut Criterion) {
    c.bench_function("blend_three_lists_1000", |b| {
        b.iter(|| {
            let lanes = vec![
                BlendLane::new("a", 60, 0..1000),
                BlendLane::new("b", 30, 0..1000),
                BlendLane::new("c", 10, 0..1000),
            ];
            black_box(blend(lanes, 1000));
        });
    });
}

/// Benchmark queue regeneration over 2,000 contacts
fn benchmark_queue_generation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (engine, campaign_id) = rt.block_on(seeded_engine(2000));

    c.bench_function("generate_queue_500", |b| {
        b.to_async(&rt).iter(|| async {
            let generation = engine.generate_queue(&campaign_id, 500).await.unwrap();
            black_box(generation);
        });
    });
}

/// Benchmark one pacer tick dispatching a batch
fn benchmark_pacer_tick(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("pacer_tick_20_agents", |b| {
        b.to_async(&rt).iter(|| async {
            let (engine, campaign_id) = seeded_engine(100).await;
            engine.campaigns().start(&campaign_id).await.unwrap();
            engine.generate_queue(&campaign_id, 0).await.unwrap();
            for n in 0..20 {
                engine
                    .agents()
                    .set_available(&campaign_id, &ActorId::from(format!("agent-{}", n)), true);
            }

            let report = engine.pacer().tick(&campaign_id).await.unwrap();
            black_box(report);
        });
    });
}

criterion_group!(
    benches,
    benchmark_blend,
    benchmark_queue_generation,
    benchmark_pacer_tick
);

criterion_main!(benches);

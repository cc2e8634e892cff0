//! Data list ownership, weighting and deletion

mod common;

use std::time::Duration;

use chrono::Utc;
use rvoip_dialer_engine::prelude::*;

use common::*;

#[tokio::test]
async fn test_attach_reassigns_and_detach_releases() {
    let dialer = test_dialer().await;
    let campaigns = dialer.engine.campaigns();
    let first = campaigns.create_campaign(campaign_params(DialMethod::Progressive)).await.unwrap();
    let second = campaigns.create_campaign(campaign_params(DialMethod::Predictive)).await.unwrap();
    let lists = dialer.engine.lists();

    let list = lists.create_list("shared", 40, Some(&first.id)).await.unwrap();
    assert_eq!(lists.lists_for_campaign(&first.id).await.unwrap().len(), 1);

    let moved = lists.attach_to_campaign(&list.id, &second.id, 300).await.unwrap();
    assert_eq!(moved.campaign_id, Some(second.id.clone()));
    assert_eq!(moved.weight, 100);
    assert!(lists.lists_for_campaign(&first.id).await.unwrap().is_empty());

    let detached = lists.detach(&list.id).await.unwrap();
    assert_eq!(detached.campaign_id, None);
    assert!(lists.active_lists_for_campaign(&second.id).await.unwrap().is_empty());

    assert!(matches!(
        lists.attach_to_campaign(&list.id, &CampaignId::from("nope"), 10).await,
        Err(DialerError::NotFound(_))
    ));
    assert!(matches!(
        lists.create_list("", 10, None).await,
        Err(DialerError::Validation(_))
    ));
}

#[tokio::test]
async fn test_weight_change_only_affects_next_generation() {
    let dialer = test_dialer().await;
    let campaign = dialer
        .engine
        .campaigns()
        .create_campaign(campaign_params(DialMethod::Predictive))
        .await
        .unwrap();
    let a = add_list(&dialer.engine, &campaign.id, 50, 1, 40).await;
    let b = add_list(&dialer.engine, &campaign.id, 50, 2, 40).await;

    let even = dialer.engine.generate_queue(&campaign.id, 20).await.unwrap();
    assert_eq!(even.count_for(&a.id), 10);
    assert_eq!(even.count_for(&b.id), 10);

    dialer.engine.lists().set_weight(&b.id, 0).await.unwrap();
    let queued = dialer
        .engine
        .database()
        .entries_for_campaign(&campaign.id, Some(QueueEntryStatus::Queued))
        .await
        .unwrap();
    assert_eq!(queued.iter().filter(|e| e.list_id == b.id).count(), 10);

    // Weight 0 clamps to 1: b gets one slot in every 51
    let skewed = dialer.engine.generate_queue(&campaign.id, 20).await.unwrap();
    assert!(skewed.count_for(&b.id) <= 1);
    assert!(skewed.count_for(&a.id) >= 19);
}

#[tokio::test]
async fn test_delete_list_cascades_unless_dialing() {
    let dialer = test_dialer().await;
    let (campaign, list) = campaign_with_contacts(&dialer.engine, campaign_params(DialMethod::ManualDial), 3).await;
    dialer.engine.campaigns().start(&campaign.id).await.unwrap();
    dialer.engine.generate_queue(&campaign.id, 0).await.unwrap();

    let now = Utc::now();
    let DialNext::Dialing { entry, .. } = dialer
        .engine
        .pacer()
        .dial_next_at(&campaign.id, &ActorId::from("agent-1"), None, now)
        .await
        .unwrap()
    else {
        panic!("expected a dial");
    };

    let lists = dialer.engine.lists();
    assert!(matches!(
        lists.delete_list(&list.id).await,
        Err(DialerError::InvalidTransition(_))
    ));

    dialer
        .engine
        .outcomes()
        .record_outcome_at(&entry.id, CallOutcome::NoAnswer, OutcomeMetadata::default(), now)
        .await
        .unwrap();
    assert_eq!(lists.delete_list(&list.id).await.unwrap(), 3);
    assert!(matches!(lists.get_list(&list.id).await, Err(DialerError::NotFound(_))));
    assert!(matches!(
        dialer.engine.contacts().get_contact(&entry.contact_id).await,
        Err(DialerError::NotFound(_))
    ));
    assert!(matches!(lists.delete_list(&list.id).await, Err(DialerError::NotFound(_))));
}

#[tokio::test]
async fn test_expired_leases_are_purged() {
    let dialer = test_dialer().await;
    let (_, list) = campaign_with_contacts(&dialer.engine, campaign_params(DialMethod::ManualDial), 2).await;
    let contacts = dialer.engine.contacts().contacts_in_list(&list.id).await.unwrap();
    let leases = dialer.engine.leases();
    let actor = ActorId::from("agent-1");
    let past = Utc::now() - chrono::Duration::minutes(10);

    leases.acquire_at(&contacts[0].id, &actor, Duration::from_secs(60), past).await.unwrap();
    leases.acquire(&contacts[1].id, &actor, Duration::from_secs(60)).await.unwrap();

    assert_eq!(leases.purge_expired().await.unwrap(), 1);
    assert_eq!(leases.live_count().await.unwrap(), 1);
    assert!(leases.holder(&contacts[1].id).await.unwrap().is_some());
}

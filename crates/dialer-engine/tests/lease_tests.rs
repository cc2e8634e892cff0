//! Contact lease behaviour: exclusivity, expiry, renewal

mod common;

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use rvoip_dialer_engine::config::DatabaseConfig;
use rvoip_dialer_engine::prelude::*;

use common::*;

async fn one_contact() -> (TestDialer, ContactId) {
    let dialer = test_dialer().await;
    let (_, list) = campaign_with_contacts(&dialer.engine, campaign_params(DialMethod::ManualDial), 1).await;
    let contact = dialer.engine.contacts().contacts_in_list(&list.id).await.unwrap()[0]
        .id
        .clone();
    (dialer, contact)
}

#[tokio::test]
async fn test_concurrent_acquirers_yield_one_winner() {
    let (dialer, contact) = one_contact().await;
    let leases = dialer.engine.leases();
    let actors: Vec<ActorId> = (0..16).map(|n| ActorId::from(format!("actor-{}", n))).collect();

    let results = join_all(
        actors
            .iter()
            .map(|actor| leases.acquire(&contact, actor, Duration::from_secs(60))),
    )
    .await;

    let winners = results.into_iter().filter(|r| matches!(r, Ok(true))).count();
    assert_eq!(winners, 1);
    assert_eq!(leases.live_count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lease_race_on_shared_file_database() {
    let path = std::env::temp_dir().join(format!("dialer-leases-{}.db", uuid::Uuid::new_v4()));
    let config = DatabaseConfig {
        database_path: path.to_string_lossy().into_owned(),
        max_connections: 8,
        acquire_timeout_secs: 10,
    };
    let db = DialerDatabase::from_config(&config).await.unwrap();
    let engine = DialerEngine::with_database(DialerConfig::default(), db.clone(), MockProvider::new());
    let (_, list) = campaign_with_contacts(&engine, campaign_params(DialMethod::ManualDial), 8).await;
    let contacts = engine.contacts().contacts_in_list(&list.id).await.unwrap();

    // Every actor races for every contact from its own task and connection
    let mut tasks = Vec::new();
    for n in 0..16 {
        let leases = LeaseManager::new(db.clone(), Duration::from_secs(60));
        let contacts: Vec<ContactId> = contacts.iter().map(|c| c.id.clone()).collect();
        tasks.push(tokio::spawn(async move {
            let actor = ActorId::from(format!("actor-{}", n));
            let mut won = Vec::new();
            for contact in contacts {
                if leases.acquire(&contact, &actor, Duration::from_secs(60)).await.unwrap() {
                    won.push(contact);
                }
            }
            won
        }));
    }

    let mut winners: Vec<ContactId> = Vec::new();
    for task in join_all(tasks).await {
        winners.extend(task.unwrap());
    }
    winners.sort();
    let total = winners.len();
    winners.dedup();
    assert_eq!(total, contacts.len(), "one winner per contact");
    assert_eq!(winners.len(), contacts.len());
    assert_eq!(engine.leases().live_count().await.unwrap(), contacts.len() as i64);

    db.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

#[tokio::test]
async fn test_release_hands_contact_to_next_actor() {
    let (dialer, contact) = one_contact().await;
    let leases = dialer.engine.leases();
    let a = ActorId::from("agent-a");
    let b = ActorId::from("agent-b");
    let ttl = Duration::from_secs(60);

    assert!(leases.acquire(&contact, &a, ttl).await.unwrap());
    assert!(!leases.acquire(&contact, &b, ttl).await.unwrap());

    // Only the holder can release
    assert!(!leases.release(&contact, &b).await.unwrap());
    assert_eq!(leases.holder(&contact).await.unwrap().unwrap().holder, a);

    assert!(leases.release(&contact, &a).await.unwrap());
    assert!(!leases.release(&contact, &a).await.unwrap());
    assert!(leases.acquire(&contact, &b, ttl).await.unwrap());
}

#[tokio::test]
async fn test_live_lease_refuses_its_own_holder() {
    let (dialer, contact) = one_contact().await;
    let leases = dialer.engine.leases();
    let a = ActorId::from("agent-a");

    assert!(leases.acquire(&contact, &a, Duration::from_secs(60)).await.unwrap());
    assert!(!leases.acquire(&contact, &a, Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn test_expired_lease_is_acquirable() {
    let (dialer, contact) = one_contact().await;
    let leases = dialer.engine.leases();
    let a = ActorId::from("agent-a");
    let b = ActorId::from("agent-b");
    let now = Utc::now();

    assert!(leases.acquire_at(&contact, &a, Duration::from_secs(30), now).await.unwrap());
    assert!(!leases
        .acquire_at(&contact, &b, Duration::from_secs(30), now + chrono::Duration::seconds(29))
        .await
        .unwrap());
    assert!(leases
        .acquire_at(&contact, &b, Duration::from_secs(30), now + chrono::Duration::seconds(30))
        .await
        .unwrap());

    let holder = leases
        .holder_at(&contact, now + chrono::Duration::seconds(31))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(holder.holder, b);
}

#[tokio::test]
async fn test_renew_extends_only_a_live_lease() {
    let (dialer, contact) = one_contact().await;
    let leases = dialer.engine.leases();
    let a = ActorId::from("agent-a");
    let b = ActorId::from("agent-b");
    let ttl = Duration::from_secs(30);
    let now = Utc::now();

    assert!(leases.acquire_at(&contact, &a, ttl, now).await.unwrap());
    assert!(!leases.renew_at(&contact, &b, ttl, now).await.unwrap());
    assert!(leases
        .renew_at(&contact, &a, ttl, now + chrono::Duration::seconds(20))
        .await
        .unwrap());

    // Still held past the original expiry
    let later = now + chrono::Duration::seconds(40);
    assert!(leases.holder_at(&contact, later).await.unwrap().is_some());
    assert!(!leases.acquire_at(&contact, &b, ttl, later).await.unwrap());

    // Too late to renew once it has lapsed
    let lapsed = now + chrono::Duration::seconds(60);
    assert!(!leases.renew_at(&contact, &a, ttl, lapsed).await.unwrap());
}

#[tokio::test]
async fn test_zero_ttl_is_rejected() {
    let (dialer, contact) = one_contact().await;
    let result = dialer
        .engine
        .leases()
        .acquire(&contact, &ActorId::from("agent-a"), Duration::ZERO)
        .await;
    assert!(matches!(result, Err(DialerError::Validation(_))));
}

#[tokio::test]
async fn test_contact_reports_lock_state() {
    let (dialer, contact) = one_contact().await;
    let a = ActorId::from("agent-a");
    dialer
        .engine
        .leases()
        .acquire(&contact, &a, Duration::from_secs(60))
        .await
        .unwrap();

    let locked = dialer.engine.contacts().get_contact(&contact).await.unwrap();
    assert!(locked.lock.locked);
    assert_eq!(locked.lock.locked_by, Some(a.clone()));

    dialer.engine.leases().release(&contact, &a).await.unwrap();
    let unlocked = dialer.engine.contacts().get_contact(&contact).await.unwrap();
    assert!(!unlocked.lock.locked);
}

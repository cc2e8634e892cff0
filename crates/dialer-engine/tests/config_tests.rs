//! Configuration loading and logging setup

mod common;

use rvoip_dialer_engine::prelude::*;
use serial_test::serial;
use tracing::Level;

use common::*;

fn write_config(contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("dialer-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_setup_logging_installs_once() {
    let config = LoggingConfig::new(Level::DEBUG).with_file_info();
    assert!(setup_logging(config.clone()).is_ok());

    // The subscriber is process-wide
    assert!(matches!(setup_logging(config), Err(DialerError::Config(_))));
}

#[tokio::test]
#[serial]
async fn test_engine_from_config_file() {
    let path = write_config(
        r#"
        [general]
        default_caller_id = "+15557770000"

        [pacer]
        tick_interval_ms = 500

        [database]
        database_path = ":memory:"

        [logging]
        level = "debug"
        "#,
    );
    let config = DialerConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.pacer.tick_interval_ms, 500);
    assert_eq!(config.leases.default_ttl_secs, 120);
    assert_eq!(LoggingConfig::from_settings(&config.logging).unwrap().level, Level::DEBUG);

    let engine = DialerEngine::new(config, MockProvider::new()).await.unwrap();
    let campaign = engine
        .campaigns()
        .create_campaign(NewCampaign::new("from file", DialMethod::Progressive))
        .await
        .unwrap();
    assert_eq!(campaign.caller_id, "+15557770000");
    engine.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let path = write_config("[queue]\ndefault_batch_size = 50\nmax_batch_size = 10\n");
    let result = DialerConfig::from_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(DialerError::Config(_))));

    let missing = DialerConfig::from_file(std::env::temp_dir().join("no-such-dialer-config.toml"));
    assert!(matches!(missing, Err(DialerError::Config(_))));

    let mut config = DialerConfig::default();
    config.general.callback_base_url.clear();
    let engine = DialerEngine::new(config, MockProvider::new()).await;
    assert!(matches!(engine, Err(DialerError::Config(_))));
}

//! Hardware integration tests for the MAGSYS HGM09s gaussmeter
//!
//! These tests require a real instrument connected to the system.
//! Run with: cargo test --test hgm09s_hardware_test --features hardware_tests -- --ignored --nocapture
//!
//! Hardware Setup:
//! - HGM09s with its USB-serial bridge
//! - Address taken from config/hgm.toml or `HGM_INSTRUMENT__ADDRESS`
//! - Probe away from strong fields; nothing here changes the saved settings

#![cfg(feature = "hardware_tests")]

use hgm_daq::config::HgmConfig;
use hgm_daq::{AdapterState, Gaussmeter};

async fn connected() -> Gaussmeter {
    let config = HgmConfig::load().unwrap();
    let meter = Gaussmeter::from_config(&config.instrument).unwrap();
    meter.connect().await.unwrap();
    meter
}

#[tokio::test]
#[ignore] // Hardware-only test
async fn test_connect_and_identify() {
    let meter = connected().await;
    assert_eq!(meter.state(), AdapterState::Ready);
    println!("Identity: {:?}", meter.identity().await);
    meter.disconnect().await;
}

#[tokio::test]
#[ignore]
async fn test_read_all_attributes() {
    let meter = connected().await;
    let unit = meter.read_unit().await.unwrap();
    let range = meter.read_range().await.unwrap();
    let mode = meter.read_mode().await.unwrap();
    let field = meter.read_field().await.unwrap();
    println!("unit={} range={} mode={} field={}", unit, range, mode, field);
    assert!(field.value.is_finite());
    meter.disconnect().await;
}

#[tokio::test]
#[ignore]
async fn test_repeated_reads_stay_in_step() {
    let meter = connected().await;
    for _ in 0..20 {
        meter.read_field().await.unwrap();
        meter.read_mode().await.unwrap();
    }
    meter.disconnect().await;
}

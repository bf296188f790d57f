// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use fingertip_pulse::{Config, PulseError};
use std::path::PathBuf;
use std::time::Duration;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fingertip-pulse-config-{}-{}",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.duration_seconds, 30);
    assert_eq!(config.camera_device, "/dev/video0");
    assert!(config.torch, "Torch should be attempted by default");
    assert_eq!(config.frame_rate, 30);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = scratch_dir("missing");
    let config = Config::load_from(&dir.join("config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let dir = scratch_dir("roundtrip");
    let path = dir.join("nested").join("config.json");

    let config = Config {
        duration_seconds: 20,
        camera_device: "/dev/video2".to_string(),
        torch: false,
        frame_rate: 60,
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = scratch_dir("partial");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{ "duration_seconds": 15 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.duration_seconds, 15);
    assert_eq!(config.frame_rate, 30);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = scratch_dir("malformed");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(PulseError::Config(_))));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_invalid_values_rejected() {
    let zero_duration = Config {
        duration_seconds: 0,
        ..Config::default()
    };
    assert!(matches!(zero_duration.validate(), Err(PulseError::Config(_))));

    let fast = Config {
        frame_rate: 500,
        ..Config::default()
    };
    assert!(fast.validate().is_err());
}

#[test]
fn test_session_config_from_config() {
    let config = Config {
        duration_seconds: 15,
        frame_rate: 25,
        torch: false,
        ..Config::default()
    };
    let session = config.session_config();

    assert_eq!(session.duration, Duration::from_secs(15));
    assert_eq!(session.duration_ms(), 15_000);
    assert_eq!(session.frame_interval, Duration::from_millis(40));
    assert_eq!(session.progress_interval, Duration::from_millis(100));
    assert_eq!(session.settle_delay, Duration::from_millis(500));
    assert_eq!(session.publish_warmup, Duration::from_millis(3000));
    assert!(!session.torch);
}

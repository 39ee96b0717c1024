//! Tests for configuration validation and loading

use gang_controller::config::{ControllerConfig, DEFAULT_MAX_RETRIES, DEFAULT_STALE_THRESHOLD_SECS};
use std::time::Duration;

#[test]
fn test_default_config_is_valid() {
    let cfg = ControllerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.stale_threshold_secs, DEFAULT_STALE_THRESHOLD_SECS);
    assert_eq!(cfg.max_retries, DEFAULT_MAX_RETRIES);
    assert!(cfg.namespace.is_none());
}

#[test]
fn test_invalid_worker_count() {
    let cfg = ControllerConfig::new().with_worker_count(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_stale_threshold() {
    let cfg = ControllerConfig::new().with_stale_threshold(Duration::ZERO);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_group_label() {
    let cfg = ControllerConfig::new().with_group_label("  ");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_backoff_bounds() {
    let cfg = ControllerConfig::new().with_backoff(Duration::from_secs(2), Duration::from_secs(1));
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_partial() {
    let cfg =
        ControllerConfig::from_json_str(r#"{"worker_count": 3, "namespace": "batch"}"#).unwrap();
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.namespace.as_deref(), Some("batch"));
    assert_eq!(cfg.stale_threshold_secs, DEFAULT_STALE_THRESHOLD_SECS);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(ControllerConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
    assert!(ControllerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_json_roundtrip_preserves_fields() {
    let cfg = ControllerConfig::new()
        .with_worker_count(5)
        .with_group_label("example.com/gang")
        .with_conflict_retries(9);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(ControllerConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_empty_namespace_variable_means_all() {
    let cfg = ControllerConfig::from_lookup(|k| (k == "GANG_NAMESPACE").then(String::new)).unwrap();
    assert!(cfg.namespace.is_none());
}

//! Configuration models for the controller.

pub mod controller;

pub use controller::{
    ControllerConfig, DEFAULT_CONFLICT_RETRIES, DEFAULT_MAX_RETRIES, DEFAULT_STALE_THRESHOLD_SECS,
};

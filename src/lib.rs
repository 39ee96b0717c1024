//! # Gang Controller
//!
//! Keeps the status phase of gang-scheduled pod groups in line with the
//! observed state of their member pods.
//!
//! A pod group declares a minimum member count. Its members carry a label
//! naming the group. The controller watches both kinds of object, folds
//! member changes into per-group phase histograms, and writes the derived
//! group phase back with optimistic concurrency.
//!
//! ## Phase rules
//!
//! Evaluated in order, first match wins:
//!
//! - `Finished` and `Failed` are terminal and never change
//! - fewer members than `min_member` gives `PreScheduling`
//! - every member completed gives `Failed` if any failed, else `Finished`
//! - at least `min_member` running gives `Running`
//! - `Scheduling` with `scheduled_count >= min_member` gives `Scheduled`
//! - otherwise the recorded phase is kept
//!
//! Groups older than the staleness threshold (48h by default) are skipped
//! unless already terminal.
//!
//! ## Running the controller
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gang_controller::builders::build_controller;
//! use gang_controller::config::ControllerConfig;
//! use gang_controller::infra::InMemoryStore;
//! use gang_controller::runtime::stop_channel;
//!
//! gang_controller::util::init_tracing();
//! let config = ControllerConfig::from_env()?;
//! let workers = config.worker_count;
//! let controller = build_controller(config, Arc::new(InMemoryStore::new()))?;
//!
//! let (handle, signal) = stop_channel();
//! std::thread::spawn(move || {
//!     // ... later
//!     handle.stop();
//! });
//! controller.run(workers, signal)?;
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Object model, phase rules, member index and the reconciler.
pub mod core;
/// Controller configuration.
pub mod config;
/// Builders to construct a controller from configuration.
pub mod builders;
/// Store adapters.
pub mod infra;
/// Controller loop and shutdown signalling.
pub mod runtime;
/// Shared utilities.
pub mod util;

//! Wires the member index, staleness filter, reconciler and controller from
//! a [`ControllerConfig`].

use std::sync::Arc;

use crate::config::ControllerConfig;
use crate::core::{
    ControllerError, MemberIndex, ObjectStore, Reconciler, SharedTransitionSink, StalenessFilter,
};
use crate::runtime::Controller;
use crate::util::clock::{Clock, SystemClock};

/// Builder for a [`Controller`].
pub struct ControllerBuilder<S> {
    store: Arc<S>,
    config: ControllerConfig,
    clock: Arc<dyn Clock>,
    transitions: Option<SharedTransitionSink>,
}

impl<S: ObjectStore> ControllerBuilder<S> {
    /// Start from a store and configuration.
    pub fn new(store: Arc<S>, config: ControllerConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            transitions: None,
        }
    }

    /// Configuration the controller will be built with.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Replace the wall clock used for staleness checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record every persisted phase transition into `sink`.
    #[must_use]
    pub fn with_transition_sink(mut self, sink: SharedTransitionSink) -> Self {
        self.transitions = Some(sink);
        self
    }

    /// Validate the configuration and assemble the controller.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when validation fails.
    pub fn build(self) -> Result<Controller<S>, ControllerError> {
        self.config
            .validate()
            .map_err(ControllerError::InvalidConfig)?;

        let index = Arc::new(MemberIndex::new(self.config.group_label.clone()));
        let staleness = StalenessFilter::with_clock(self.config.stale_threshold(), self.clock);
        let mut reconciler =
            Reconciler::new(Arc::clone(&self.store), index, staleness, &self.config);
        if let Some(sink) = self.transitions {
            reconciler = reconciler.with_transition_sink(sink);
        }
        Ok(Controller::new(self.store, reconciler, self.config))
    }
}

/// Build a controller with the system clock and no transition sink.
///
/// # Errors
///
/// `InvalidConfig` when validation fails.
pub fn build_controller<S: ObjectStore>(
    config: ControllerConfig,
    store: Arc<S>,
) -> Result<Controller<S>, ControllerError> {
    ControllerBuilder::new(store, config).build()
}

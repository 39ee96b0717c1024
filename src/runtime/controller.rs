//! Blocking controller loop.
//!
//! `run` subscribes to group and member watches, primes the member index and
//! the work queue from a full list, then starts:
//!
//! - one feed thread dispatching watch events into the reconciler
//! - `worker_count` worker threads, each owning a single-threaded tokio
//!   runtime and draining the shared work queue
//!
//! It blocks until the stop signal fires, shuts the queue down and joins
//! every thread before returning.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{never, select, Receiver};
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::core::model::{Group, LabelSelector, Member, WatchEvent};
use crate::core::{ControllerError, ObjectStore, Reconciler, ReconcilerStats};

use super::stop::{stop_channel, StopSignal};

enum FeedStep {
    Continue,
    Stop,
    GroupsClosed,
    MembersClosed,
}

/// Runs a [`Reconciler`] against an [`ObjectStore`].
pub struct Controller<S> {
    store: Arc<S>,
    reconciler: Arc<Reconciler<S>>,
    config: ControllerConfig,
}

impl<S: ObjectStore> Controller<S> {
    /// Assemble a controller. Prefer [`crate::builders::ControllerBuilder`].
    pub fn new(store: Arc<S>, reconciler: Reconciler<S>, config: ControllerConfig) -> Self {
        Self {
            store,
            reconciler: Arc::new(reconciler),
            config,
        }
    }

    /// The reconciler driven by this controller.
    #[must_use]
    pub const fn reconciler(&self) -> &Arc<Reconciler<S>> {
        &self.reconciler
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current reconciler counters.
    #[must_use]
    pub fn stats(&self) -> ReconcilerStats {
        self.reconciler.stats()
    }

    /// Run until `stop` fires.
    ///
    /// The queue is shut down on return, so a controller runs at most once.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero worker count or a second run, store errors
    /// from the initial watch and list, and `Internal` if a thread or runtime
    /// cannot be created.
    pub fn run(&self, worker_count: usize, stop: StopSignal) -> Result<(), ControllerError> {
        if worker_count == 0 {
            return Err(ControllerError::InvalidConfig(
                "worker_count must be greater than 0".into(),
            ));
        }
        if self.reconciler.queue().is_shutting_down() {
            return Err(ControllerError::InvalidConfig(
                "controller has already been stopped".into(),
            ));
        }

        let namespace = self.config.namespace.as_deref();
        info!(
            workers = worker_count,
            namespace = namespace.unwrap_or("*"),
            stale_threshold_secs = self.config.stale_threshold_secs,
            "starting group status controller"
        );

        // Subscribe before listing so no change falls between the two.
        let group_rx = self.store.watch_groups(namespace)?;
        let member_rx = self.store.watch_members(namespace)?;
        self.prime()?;

        self.reconciler.set_worker_count(worker_count);
        // Lets `run` end the feed thread itself when startup fails.
        let (halt, halt_signal) = stop_channel();
        let mut threads = Vec::with_capacity(worker_count + 1);
        let spawned = self.start_threads(
            worker_count,
            group_rx,
            member_rx,
            [stop.clone(), halt_signal],
            &mut threads,
        );

        match spawned {
            Ok(()) => {
                info!("controller started");
                stop.wait();
                info!("stop signal received, shutting down");
            }
            Err(ref e) => error!(error = %e, "failed to start controller threads"),
        }

        halt.stop();
        self.reconciler.queue().shutdown();
        for handle in threads {
            let name = handle.thread().name().unwrap_or("unnamed").to_owned();
            if handle.join().is_err() {
                warn!(thread = %name, "controller thread panicked");
            }
        }
        info!(stats = ?self.reconciler.stats(), "controller stopped");
        spawned
    }

    /// Load current members into the index and enqueue every listed group.
    fn prime(&self) -> Result<(), ControllerError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let namespace = self.config.namespace.as_deref();
        let selector = LabelSelector::Exists(self.reconciler.index().label_key().to_owned());

        let (members, groups) = rt.block_on(async {
            let members = self.store.list_members(namespace, &selector).await?;
            let groups = self.store.list_groups(namespace).await?;
            Ok::<_, ControllerError>((members, groups))
        })?;

        debug!(members = members.len(), groups = groups.len(), "initial list loaded");
        for member in members {
            self.reconciler.handle_member_event(&WatchEvent::Added(member));
        }
        for group in groups {
            self.reconciler.handle_group_event(&WatchEvent::Added(group));
        }
        Ok(())
    }

    fn start_threads(
        &self,
        worker_count: usize,
        group_rx: Receiver<WatchEvent<Group>>,
        member_rx: Receiver<WatchEvent<Member>>,
        stops: [StopSignal; 2],
        threads: &mut Vec<JoinHandle<()>>,
    ) -> Result<(), ControllerError> {
        threads.push(self.spawn_feed(group_rx, member_rx, stops)?);
        for worker_id in 0..worker_count {
            threads.push(self.spawn_worker(worker_id)?);
        }
        Ok(())
    }

    fn spawn_feed(
        &self,
        mut group_rx: Receiver<WatchEvent<Group>>,
        mut member_rx: Receiver<WatchEvent<Member>>,
        stops: [StopSignal; 2],
    ) -> Result<JoinHandle<()>, ControllerError> {
        let reconciler = Arc::clone(&self.reconciler);
        let handle = thread::Builder::new()
            .name("gang-feed".into())
            .spawn(move || {
                let [stop, halt] = stops;
                loop {
                    let step = select! {
                        recv(stop.receiver()) -> _ => FeedStep::Stop,
                        recv(halt.receiver()) -> _ => FeedStep::Stop,
                        recv(group_rx) -> event => match event {
                            Ok(event) => {
                                reconciler.handle_group_event(&event);
                                FeedStep::Continue
                            }
                            Err(_) => FeedStep::GroupsClosed,
                        },
                        recv(member_rx) -> event => match event {
                            Ok(event) => {
                                reconciler.handle_member_event(&event);
                                FeedStep::Continue
                            }
                            Err(_) => FeedStep::MembersClosed,
                        },
                    };
                    match step {
                        FeedStep::Continue => {}
                        FeedStep::Stop => break,
                        FeedStep::GroupsClosed => {
                            warn!("group watch closed");
                            group_rx = never();
                        }
                        FeedStep::MembersClosed => {
                            warn!("member watch closed");
                            member_rx = never();
                        }
                    }
                }
                debug!("feed thread exiting");
            })?;
        Ok(handle)
    }

    fn spawn_worker(&self, worker_id: usize) -> Result<JoinHandle<()>, ControllerError> {
        let reconciler = Arc::clone(&self.reconciler);
        let handle = thread::Builder::new()
            .name(format!("gang-worker-{worker_id}"))
            .stack_size(self.config.thread_stack_size)
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(worker_id, error = %e, "failed to create worker runtime");
                        return;
                    }
                };
                debug!(worker_id, "worker started");
                while reconciler.process_next(&rt) {}
                debug!(worker_id, "worker exiting");
            })?;
        Ok(handle)
    }
}

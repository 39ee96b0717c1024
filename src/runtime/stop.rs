//! Shutdown signalling for the controller loop.
//!
//! The signal is a channel that never carries a message: stopping drops the
//! only sender, which disconnects every receiver at once. That lets any number
//! of threads (the feed dispatcher, the caller blocked in `run`) observe the
//! same stop without coordination.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// Owner side; stopping is idempotent.
#[derive(Debug)]
pub struct StopHandle {
    tx: Mutex<Option<Sender<()>>>,
}

/// Observer side; cheap to clone.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: Receiver<()>,
}

/// Create a connected handle/signal pair.
#[must_use]
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = bounded(0);
    (
        StopHandle {
            tx: Mutex::new(Some(tx)),
        },
        StopSignal { rx },
    )
}

impl StopHandle {
    /// Fire the signal. Dropping the handle has the same effect.
    pub fn stop(&self) {
        self.tx.lock().take();
    }

    /// Whether `stop` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl StopSignal {
    /// Block until stopped.
    pub fn wait(&self) {
        // Nothing is ever sent, so recv only returns on disconnect.
        let _ = self.rx.recv();
    }

    /// Block until stopped or `timeout` elapses. Returns true if stopped.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Disconnected))
    }

    /// Non-blocking check.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// Receiver for use in `crossbeam_channel::select!`.
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

//! Telemetry helpers for structured logging.

use tracing_subscriber::EnvFilter;

/// Default filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "gang_controller=info";

/// Install a fmt subscriber for the controller process.
///
/// Embedders that install their own subscriber keep it; this is a no-op when
/// a global dispatcher already exists. `RUST_LOG` wins over
/// [`DEFAULT_LOG_FILTER`].
pub fn init_tracing() {
    init_tracing_with_filter(DEFAULT_LOG_FILTER);
}

/// Install a fmt subscriber, falling back to `fallback` when `RUST_LOG` is unset.
pub fn init_tracing_with_filter(fallback: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}

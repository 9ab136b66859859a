//! Observability: event bus, logging and metrics.
//!
//! The crate always records through the `tracing` and `metrics` facades.
//! Hosts that want output call [`init`] to install a subscriber and
//! [`install_prometheus`] to install a recorder; otherwise both are no-ops.

mod event_bus;
mod logging;
mod metrics;

pub use event_bus::{
    DEFAULT_HISTORY_CAPACITY, EventBus, FilteredReceiver, Listener, SubscriptionId,
};
pub use logging::{LOG_FILTER_ENV, LOG_FORMAT_ENV, LogFormat, LoggingConfig};
pub use metrics::install_prometheus;

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or the filter
/// directive is invalid.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "logging_init".to_string(),
            cause: "logging already initialized".to_string(),
        });
    }

    let filter = EnvFilter::try_new(&config.filter).map_err(|e| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: format!("invalid filter '{}': {e}", config.filter),
    })?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
    }

    LOGGING_INIT.set(()).map_err(|()| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: "failed to mark logging initialized".to_string(),
    })
}

/// Helper to convert init errors.
#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: e.to_string(),
    }
}

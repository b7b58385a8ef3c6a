//! # Logging
//!
//! The crate reports through `tracing`: the scheduler logs run start and stop,
//! adapters log connections and batches, and `logged` streams emit one event per
//! value under the `cycleweave::logged` target.
//!
//! Applications that do not install their own subscriber can call [`init`],
//! which writes formatted events to stderr filtered by `RUST_LOG`
//! (default `info`).

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the default subscriber, failing if one is already installed.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
    .with(tracing_subscriber::fmt::layer().with_target(true))
    .try_init()
}

/// Installs the default subscriber unless one is already installed.
pub fn init() {
  let _ = try_init();
}

//! Tracing initialization
//!
//! Opt-in: the library itself only emits `tracing` events and never
//! installs a global subscriber. Hosts and tests call [`init`] once.

use tracing_subscriber::EnvFilter;

/// Installs an env-filtered fmt subscriber. Safe to call repeatedly; later
/// calls are no-ops because `try_init` refuses to replace an existing
/// subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scrollscout=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

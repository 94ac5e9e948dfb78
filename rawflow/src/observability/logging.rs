//! `tracing` subscriber installation.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `rawflow=debug`.
pub const LOG_ENV: &str = "RAWFLOW_LOG";

/// Installs a global `fmt` subscriber.
///
/// The filter comes from [`LOG_ENV`] if set and valid, otherwise from
/// `default_directive`. Returns `false` if a global subscriber was already
/// installed, in which case nothing changes.
pub fn init_tracing(default_directive: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = if json { builder.json().try_init() } else { builder.try_init() };
    installed.is_ok()
}

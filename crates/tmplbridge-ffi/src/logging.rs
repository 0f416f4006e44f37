//! Tracing subscriber bootstrap for hosts that load the library

use tmplbridge_core::config::consts::logging::{DEFAULT_LOG_FILTER, LOG_ENV_VAR};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `TMPLBRIDGE_LOG`.
///
/// Falls back to `warn` when the variable is unset or unparsable. Returns
/// false if a global subscriber is already installed, in which case nothing
/// changes.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

//! Logging setup shared by the dogfood binaries.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `debug` or
/// `dogfood_runtime::bundle=trace`.
pub const LOG_ENV: &str = "DOGFOOD_LOG";

/// Install a stderr subscriber filtered by `DOGFOOD_LOG`, or `default` when
/// it is unset or invalid. Stdout is left to the bundled program.
pub fn init(default: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "CARBON_REPORT_LOG";

/// Stderr subscriber filtered by `CARBON_REPORT_LOG`, `info` when unset or
/// unparseable. Stdout stays free for banners and tables.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

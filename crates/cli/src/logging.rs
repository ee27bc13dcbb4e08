use std::env;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Filter from `RUST_LOG`-style directives, or `warn` when unset or invalid.
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Logs to stderr so `--json` output on stdout stays clean.
pub fn init() {
    let directives = env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();
}

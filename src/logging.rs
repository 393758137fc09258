use std::env;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ZULIP_ARCHIVE_LOG";
const DEFAULT_FILTER: &str = "zulip_archive=info";

fn filter_directives() -> String {
    for var in [LOG_ENV, "RUST_LOG"] {
        if let Ok(value) = env::var(var)
            && !value.trim().is_empty()
        {
            return value.trim().to_string();
        }
    }
    DEFAULT_FILTER.to_string()
}

/// Install the stderr subscriber. Stdout stays reserved for command reports.
pub fn init() {
    let env_filter =
        EnvFilter::try_new(filter_directives()).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

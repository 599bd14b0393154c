//! Structured logging to stderr.
//!
//! Stdout belongs to the console and diagnostics output, so log lines always
//! go to stderr. The filter comes from `ALARMCLOCK_LOG` and defaults to `info`.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub const LOG_FILTER_ENV: &str = "ALARMCLOCK_LOG";

pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    if tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .try_init()
        .is_err()
    {
        return;
    }

    tracing::debug!(filter_env = LOG_FILTER_ENV, "logging initialized");
}

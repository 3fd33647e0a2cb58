/// Structured logging setup (SPEC_FULL.md §10.1).
///
/// Mirrors the teacher's `tracing` + `tracing-subscriber` usage throughout
/// `src/database` and `src/handlers`: an `EnvFilter` seeded from `LOG_LEVEL`
/// (falling back to `info`), writing JSON lines so the terminal HUD and log
/// aggregation never have to share a human-formatted line grammar.
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_current_span(false);

    if subscriber.try_init().is_err() {
        // A subscriber is already installed (e.g. under a test harness); not
        // an error condition worth surfacing.
    }
}

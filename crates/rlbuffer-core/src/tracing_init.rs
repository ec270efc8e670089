//! Shared tracing/logging initialization.
//!
//! Binaries built on `rlbuffer-core` set up `tracing_subscriber` the same
//! way: an env-filter seeded from [`LogSettings`] and optional JSON output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogSettings;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise both `bin_target` and the core
/// library log at `logging.level`. With `logging.json` every line is a
/// structured JSON object.
pub fn init_tracing(bin_target: &str, logging: &LogSettings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(bin_target, &logging.level)));

    let (json, plain) = if logging.json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(plain)
        .init();
}

/// Filter directive giving the binary and the core library the same level,
/// so `--log-level debug` also surfaces per-flush relay events.
pub fn default_filter(bin_target: &str, level: &str) -> String {
    format!("{bin_target}={level},rlbuffer_core={level}")
}

//! Logging setup
//!
//! Pretty output in debug builds, JSON lines in release builds.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` wins over `log_level`. Release output carries the current span,
/// so every line of a turn is tagged with its conversation id.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},rootbot_engine={level},tower_http=info",
            level = log_level
        ))
    });

    #[cfg(debug_assertions)]
    let format = fmt::layer().pretty().with_target(false);

    #[cfg(not(debug_assertions))]
    let format = fmt::layer().json().with_current_span(true);

    // A second call (tests, embedding) keeps the first subscriber
    tracing_subscriber::registry()
        .with(env_filter)
        .with(format)
        .try_init()
        .ok();
}

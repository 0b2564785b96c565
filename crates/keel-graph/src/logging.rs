//! Logging bootstrap for applications embedding the planner.
//!
//! The library itself only emits `tracing` events; install a subscriber of
//! your own, or call [`init_logging`] from application code. Only available
//! with the `logging` feature.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install a compact global subscriber at the given default level.
///
/// `RUST_LOG` still takes precedence when set. Safe to call more than once;
/// only the first call takes effect.
pub fn init_logging(default_level: &str) {
    INIT.call_once(|| {
        let filter = match default_level.parse() {
            Ok(directive) => EnvFilter::builder()
                .with_default_directive(directive)
                .from_env_lossy(),
            Err(_) => EnvFilter::new("info"),
        };
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}

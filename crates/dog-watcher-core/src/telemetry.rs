//! Centralised tracing initialisation for the dog-watcher binary.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting. The library
//! itself never installs a subscriber.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Legacy variable holding a bare level name such as `DEBUG` or `info`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Build the filter: `RUST_LOG` first, then `LOG_LEVEL`, then `level`.
pub fn build_filter(log_level: Option<&str>, level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        log_level
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
            .and_then(|l| EnvFilter::try_new(l).ok())
            .unwrap_or_else(|| EnvFilter::new(level.as_str()))
    })
}

/// Initialise the global tracing subscriber.
///
/// * `json`: when `true`, emit newline-delimited JSON log lines.
/// * `level`: default verbosity when neither `RUST_LOG` nor `LOG_LEVEL` is set.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let log_level = std::env::var(LOG_LEVEL_ENV).ok();
    let env_filter = build_filter(log_level.as_deref(), level);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

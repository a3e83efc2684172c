//! Logging setup for library consumers.
//!
//! Builds a `tracing` subscriber from [`LoggingConfig`]: one default level
//! plus per-module overrides (`datastore = "trace"`). The `RUST_LOG`
//! environment variable, when set, replaces the configured levels
//! entirely.

use std::fmt;
use std::sync::Once;

use chrono::Timelike;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Time-of-day timestamps with millisecond precision.
struct Clock;

impl FormatTime for Clock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = chrono::Local::now();
        write!(
            w,
            "{:02}:{:02}:{:02}.{:03}",
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        )
    }
}

/// Initialize logging with configuration.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(Clock)
            .with_level(true)
            .with_filter(env_filter(config));
        tracing_subscriber::registry().with(layer).init();
    });
}

/// Initialize logging with the default configuration (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Filter from `RUST_LOG` when set, otherwise from the config.
///
/// Module overrides are sorted so the filter is stable across runs; a
/// config with unparseable directives falls back to `warn` rather than
/// leaving the process without a subscriber.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return from_env;
    }

    let mut overrides: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{module}={level}"))
        .collect();
    overrides.sort();
    overrides.insert(0, config.default.clone());

    EnvFilter::try_new(overrides.join(",")).unwrap_or_else(|e| {
        eprintln!("symdex: invalid logging config ({e}); using 'warn'");
        EnvFilter::new("warn")
    })
}

/// Render one component event as `[component] event` with an optional
/// detail tail. Shared by the event macros; not part of the public API.
#[doc(hidden)]
pub fn render_event(component: &str, event: &str, detail: Option<fmt::Arguments<'_>>) -> String {
    match detail {
        Some(detail) => format!("[{component}] {event}: {detail}"),
        None => format!("[{component}] {event}"),
    }
}

/// Log a component event at info level.
///
/// # Examples
/// ```ignore
/// log_event!("datastore", "purged", "{unit_name}");
/// log_event!("system", "opened");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("{}", $crate::logging::render_event($component, $event, None))
    };
    ($component:expr, $event:expr, $($arg:tt)+) => {
        tracing::info!(
            "{}",
            $crate::logging::render_event($component, $event, Some(format_args!($($arg)+)))
        )
    };
}

/// Debug-only component event logging.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("{}", $crate::logging::render_event($component, $event, None))
    };
    ($component:expr, $event:expr, $($arg:tt)+) => {
        tracing::debug!(
            "{}",
            $crate::logging::render_event($component, $event, Some(format_args!($($arg)+)))
        )
    };
}

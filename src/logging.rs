//! Tracing setup and compact event macros.
//!
//! Levels come from `[logging]` in the config; `RUST_LOG` overrides both,
//! e.g. `RUST_LOG=fsrelay=debug fsrelay watch`.

use std::sync::Once;

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// HH:MM:SS.mmm, local time.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initialize logging once. Later calls are no-ops, so library embedders
/// and the CLI can both call it safely.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let mut directives = config.default.clone();
            for (module, level) in &config.modules {
                directives.push_str(&format!(",{module}={level}"));
            }
            EnvFilter::new(&directives)
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize with defaults (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info-level event with component context.
///
/// ```ignore
/// log_event!("watcher", "started");
/// log_event!("dispatch", "broadcast", "{} bytes", n);
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-level counterpart of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

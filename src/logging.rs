//! Unified logging for diagnostic output.
//!
//! Provides compact timestamped logging with per-module level configuration.
//! Supports `RUST_LOG` environment variable for runtime overrides.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "info"
//! file = "/var/log/fswatcher.log"   # optional, stderr otherwise
//!
//! [logging.modules]
//! "fswatcher::watcher" = "debug"
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug fswatcher /var/log
//! ```

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    // RUST_LOG env var takes precedence over config
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.filter_directives())
    }
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only first call takes effect).
///
/// When `log_file` is given, output is appended to it without ANSI colours.
/// If the file cannot be opened, logging falls back to stderr and the error
/// is returned.
pub fn init_with_config(config: &LoggingConfig, log_file: Option<&Path>) -> std::io::Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        let filter = build_filter(config);

        let file = log_file.map(|path| OpenOptions::new().create(true).append(true).open(path));

        match file {
            Some(Ok(file)) => {
                let fmt_layer = tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_timer(CompactTime)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter);

                tracing_subscriber::registry().with(fmt_layer).init();
            }
            other => {
                if let Some(Err(e)) = other {
                    result = Err(e);
                }

                let fmt_layer = tracing_subscriber::fmt::layer()
                    .with_target(true) // Show target for filtering visibility
                    .with_timer(CompactTime)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .with_filter(filter);

                tracing_subscriber::registry().with(fmt_layer).init();
            }
        }
    });

    result
}

/// Initialize logging with default configuration to stderr.
pub fn init() {
    let _ = init_with_config(&LoggingConfig::default(), None);
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("registry", "watching directory", "{}", path.display());
/// log_event!("watcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($handler:expr, $event:expr) => {
        tracing::info!("[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("watcher", "filtered", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($handler:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}

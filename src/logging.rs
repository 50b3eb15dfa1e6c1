//! Logging setup: stderr for one-shot commands, a file while the TUI owns the terminal

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "SHEETFOLIO_LOG";

const DEFAULT_FILTER: &str = "warn,sheetfolio=info";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn log_file_path() -> PathBuf {
    std::env::temp_dir().join("sheetfolio.log")
}

/// Install the global subscriber. Returns the log file path when logging to a file.
pub fn init_logging(to_file: bool) -> Option<PathBuf> {
    if to_file {
        let path = log_file_path();
        let dir = path.parent().map(PathBuf::from).unwrap_or_else(std::env::temp_dir);
        let appender = tracing_appender::rolling::never(dir, "sheetfolio.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        FILE_GUARD.set(guard).ok();

        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .ok();
        Some(path)
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
        None
    }
}

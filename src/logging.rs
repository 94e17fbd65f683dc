//! Log initialization.
//!
//! Logs go to daily rolling files under `~/.noteai/logs`, never to the
//! terminal, so they do not interleave with the chat output.

use crate::config::Settings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV: &str = "NOTEAI_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// The level comes from `NOTEAI_LOG` (default `info`). The returned guard
/// must be held for the life of the process; dropping it stops log output.
/// Returns `None` if the log directory cannot be created.
pub fn init_logging() -> Option<WorkerGuard> {
    let log_dir = Settings::log_dir();

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "noteai: warning: failed to create log directory {}: {e}",
            log_dir.display()
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "noteai.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .try_init();

    if let Err(e) = installed {
        eprintln!("noteai: warning: logging already initialized: {e}");
    }

    Some(guard)
}

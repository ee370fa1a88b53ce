//! Structured JSONL logging plus human-readable stderr output.
//!
//! - **JSONL to file** (~/.storybook/logs/storybook-ondevice.jsonl) for tooling
//! - **Compact to stderr** for developers
//!
//! # Usage
//!
//! ```rust,ignore
//! use storybook_ondevice::logging;
//!
//! // Keep the guard alive for the duration of the program
//! let _guard = logging::init();
//! tracing::info!(event_type = "reload", "Preview reloaded");
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::bootstrap::ReloadOutcome;
use crate::watcher::StoryReloadEvent;

const LOG_FILE_NAME: &str = "storybook-ondevice.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
/// If the log file cannot be opened, only stderr logging is set up.
pub fn init() -> LoggingGuard {
    let log_dir = get_log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join(LOG_FILE_NAME);

    // Environment filter - default to info, allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,notify=warn,globset=warn"));

    // Pretty layer for stderr (human developers)
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let (json_layer, file_guard) = match open_log_file(&log_path) {
        Ok(file) => {
            // Non-blocking writer so a slow disk never stalls a reload
            let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file);

            let json_layer = fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_span_events(FmtSpan::NONE);
            (Some(json_layer), Some(file_guard))
        }
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            (None, None)
        }
    };

    // A `None` json layer leaves stderr as the only output
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Get the log directory path (~/.storybook/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".storybook").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("storybook-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join(LOG_FILE_NAME)
}

// =============================================================================
// STRUCTURED LOGGING HELPERS
// =============================================================================

/// Log a completed reload with what triggered it
pub fn log_reload_event(trigger: Option<&StoryReloadEvent>, outcome: &ReloadOutcome) {
    let trigger = trigger
        .map(|t| format!("{:?}", t))
        .unwrap_or_else(|| "startup".to_string());

    match outcome {
        ReloadOutcome::ColdStart { sources } => {
            tracing::info!(
                event_type = "reload",
                transition = "cold_start",
                trigger = %trigger,
                sources = sources,
                "Preview started"
            );
        }
        ReloadOutcome::HotUpdate { sources, stories } => {
            tracing::info!(
                event_type = "reload",
                transition = "hot_update",
                trigger = %trigger,
                sources = sources,
                stories = stories,
                "Preview updated"
            );
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, warn};

/// Error severity for display in a story slot or the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // informational
    Warning,  // recoverable, scoped to one story or source
    Error,    // operation failed
    Critical, // bootstrap cannot continue
}

/// Domain-specific errors for story discovery and preview reloads
#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Story root '{}' does not exist", .path.display())]
    RootNotFound { path: PathBuf },

    #[error("Invalid story file specifier '{specifier}': {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    #[error("Invalid story file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("No story is registered for import path '{0}'")]
    StaleImport(String),

    #[error("Failed to load story '{import_path}': {source}")]
    StoryLoad {
        import_path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Preview session failed to start: {0}")]
    SessionStart(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File watch error: {0}")]
    FileWatch(#[from] notify::Error),

    #[error("Failed to build project annotations: {0}")]
    Annotations(String),
}

impl StoryError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RootNotFound { .. } => ErrorSeverity::Warning,
            Self::InvalidSpecifier { .. } => ErrorSeverity::Warning,
            Self::InvalidPattern(_) => ErrorSeverity::Warning,
            Self::StaleImport(_) => ErrorSeverity::Error,
            Self::StoryLoad { .. } => ErrorSeverity::Error,
            Self::SessionStart(_) => ErrorSeverity::Critical,
            Self::Config(_) => ErrorSeverity::Warning,
            Self::FileWatch(_) => ErrorSeverity::Warning,
            Self::Annotations(_) => ErrorSeverity::Error,
        }
    }

    /// Message shown inside the affected story's slot
    pub fn user_message(&self) -> String {
        match self {
            Self::RootNotFound { path } => {
                format!("Story directory {} is missing", path.display())
            }
            Self::InvalidSpecifier { specifier, .. } => {
                format!("Story files '{}' could not be understood", specifier)
            }
            Self::InvalidPattern(e) => format!("Story file pattern is invalid: {}", e),
            Self::StaleImport(path) => {
                format!("{} is no longer part of the story list; reload the preview", path)
            }
            Self::StoryLoad { import_path, .. } => format!("Could not load {}", import_path),
            Self::SessionStart(msg) => format!("Preview could not start: {}", msg),
            Self::Config(msg) => format!("Configuration issue: {}", msg),
            Self::FileWatch(e) => format!("File watcher issue: {}", e),
            Self::Annotations(msg) => format!("Global story settings failed: {}", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when a failure is local to one story or source and the reload continues.
///
/// # Examples
///
/// ```ignore
/// use storybook_ondevice::error::ResultExt;
///
/// // One broken tree must not stop the others from being indexed
/// let keys = source.loader.keys().warn_on_err().unwrap_or_default();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = %error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = %error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

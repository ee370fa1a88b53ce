//! Configuration module - story sources and preview options
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions (StorybookConfig, StoriesSpecifier, etc.)
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{DEFAULT_CONFIG_PATH, DEFAULT_PREVIEW_PATH, DEFAULT_STORY_FILES};

pub use types::{PreviewOptions, StoriesSpecifier, StorybookConfig, WatchConfig};

pub use loader::{config_path, load_config, try_load_config};

#[cfg(test)]
pub use defaults::{DEFAULT_STORY_SOURCES, DEFAULT_WATCH_DEBOUNCE_MS};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Where the config file lives unless `--config` says otherwise
pub const DEFAULT_CONFIG_PATH: &str = "./.storybook/main.json";

/// Story file specifier shared by every default source
pub const DEFAULT_STORY_FILES: &str = "**/*.stories.?(ts|tsx|js|jsx)";

/// Default story sources as (title prefix, directory), in display order
pub const DEFAULT_STORY_SOURCES: &[(&str, &str)] = &[
    ("", "./components"),
    ("OtherComponents", "./other_components"),
];

/// Interaction play functions are not run when a story is first shown
pub const DEFAULT_PLAY_FN: bool = false;

/// Project preview annotations file, relative to the project root
pub const DEFAULT_PREVIEW_PATH: &str = "./.storybook/preview.json";

/// File watcher debounce interval
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 300;

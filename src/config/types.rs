//! Configuration type definitions

use serde::{Deserialize, Serialize};

use super::defaults::*;

// ============================================
// STORY SOURCES
// ============================================

/// One directory tree to scan for stories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoriesSpecifier {
    /// Prefix shown in front of every title from this tree ("" for none)
    #[serde(default)]
    pub title_prefix: String,
    /// Tree root, relative to the project root
    pub directory: String,
    /// Glob for story files inside the tree
    #[serde(default = "default_story_files")]
    pub files: String,
}

fn default_story_files() -> String {
    DEFAULT_STORY_FILES.to_string()
}

impl StoriesSpecifier {
    pub fn new(title_prefix: impl Into<String>, directory: impl Into<String>) -> Self {
        StoriesSpecifier {
            title_prefix: title_prefix.into(),
            directory: directory.into(),
            files: default_story_files(),
        }
    }
}

// ============================================
// PREVIEW OPTIONS
// ============================================

/// Options handed to the preview runtime on cold start and hot update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOptions {
    /// Run interaction play functions when a story loads
    #[serde(default = "default_play_fn")]
    pub play_fn: bool,
}

fn default_play_fn() -> bool {
    DEFAULT_PLAY_FN
}

impl Default for PreviewOptions {
    fn default() -> Self {
        PreviewOptions {
            play_fn: DEFAULT_PLAY_FN,
        }
    }
}

// ============================================
// WATCHER
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_WATCH_DEBOUNCE_MS
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
        }
    }
}

// ============================================
// MAIN CONFIG
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorybookConfig {
    /// Story sources, in display order
    #[serde(default = "default_stories")]
    pub stories: Vec<StoriesSpecifier>,
    #[serde(default)]
    pub options: PreviewOptions,
    /// Project preview annotations (JSON); `None` uses DEFAULT_PREVIEW_PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default)]
    pub watch: WatchConfig,
}

fn default_stories() -> Vec<StoriesSpecifier> {
    DEFAULT_STORY_SOURCES
        .iter()
        .map(|(prefix, directory)| StoriesSpecifier::new(*prefix, *directory))
        .collect()
}

impl Default for StorybookConfig {
    fn default() -> Self {
        StorybookConfig {
            stories: default_stories(),
            options: PreviewOptions::default(),
            preview: None,
            watch: WatchConfig::default(),
        }
    }
}

impl StorybookConfig {
    /// Returns the preview annotations path, or DEFAULT_PREVIEW_PATH if not configured
    pub fn get_preview_path(&self) -> &str {
        self.preview.as_deref().unwrap_or(DEFAULT_PREVIEW_PATH)
    }
}

//! Storybook - story discovery for the on-device preview
//!
//! This module finds story files in the configured directory trees and turns
//! them into something the preview runtime can load on demand.
//!
//! # Components
//!
//! - [`StoryMatcher`] - Decides which files are stories
//! - [`TreeLoader`] / [`FsTreeLoader`] - Enumerate and load stories in one tree
//! - [`StoryRegistry`] - Ordered [`StorySource`]s for a session
//! - [`prepare_stories`] - Registry -> [`ImportMap`] + [`StoryIndex`]
//!
//! # Usage
//!
//! ```ignore
//! use storybook_ondevice::config::StorybookConfig;
//! use storybook_ondevice::storybook::{prepare_stories, FsLoaderFactory, StoryRegistry};
//!
//! let config = StorybookConfig::default();
//! let registry = StoryRegistry::assemble(&config.stories, project_root, &FsLoaderFactory);
//! let prepared = prepare_stories(&registry, config.options);
//! let button = prepared.import_map.resolve("./components/Button.stories.tsx")?;
//! ```

mod import_map;
mod loader;
pub mod matcher;
mod registry;
mod story;

pub use import_map::{
    auto_title, prepare_stories, sanitize_id, ImportFn, ImportMap, PreparedStories,
    SourceFailure, StoryIndex, StoryIndexEntry,
};
pub use loader::{FsTreeLoader, LazyStory, TreeLoader};
pub use matcher::{StoryMatcher, STORY_FILE_PATTERN};
pub use registry::{FsLoaderFactory, LoaderFactory, StoryRegistry, StorySource};
pub use story::StoryModule;

//! Import map and story index
//!
//! `prepare_stories` walks every source of a registry and produces the import
//! map (import path -> deferred load) and the story index the sidebar lists.
//! A source that cannot be enumerated is skipped and reported; the remaining
//! sources still contribute their stories.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::loader::LazyStory;
use super::registry::{StoryRegistry, StorySource};
use super::story::StoryModule;
use crate::config::PreviewOptions;
use crate::error::{Result, StoryError};

/// Resolves an import path to its story, against one specific import map
pub type ImportFn = Arc<dyn Fn(&str) -> Result<Arc<StoryModule>> + Send + Sync>;

/// Import path -> deferred story load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportMap {
    entries: BTreeMap<String, LazyStory>,
}

impl ImportMap {
    pub fn get(&self, import_path: &str) -> Option<&LazyStory> {
        self.entries.get(import_path)
    }

    pub fn contains(&self, import_path: &str) -> bool {
        self.entries.contains_key(import_path)
    }

    /// Load the story behind `import_path`.
    ///
    /// A path this map does not know is a stale reference and fails with
    /// [`StoryError::StaleImport`]; it never resolves to an empty module.
    pub fn resolve(&self, import_path: &str) -> Result<Arc<StoryModule>> {
        self.entries
            .get(import_path)
            .ok_or_else(|| StoryError::StaleImport(import_path.to_string()))?
            .resolve()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind an import fn to this map. The fn only ever sees this map.
    pub fn into_import_fn(self) -> ImportFn {
        let map = Arc::new(self);
        Arc::new(move |import_path: &str| map.resolve(import_path))
    }

    fn insert(&mut self, import_path: String, story: LazyStory) -> bool {
        if self.entries.contains_key(&import_path) {
            return false;
        }
        self.entries.insert(import_path, story);
        true
    }
}

/// One story file as listed in the sidebar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryIndexEntry {
    /// Stable kebab-case id derived from the title
    pub id: String,
    /// Title prefix + path-derived title, `/`-separated
    pub title: String,
    pub import_path: String,
    pub title_prefix: String,
}

/// Story files in registry order, then path order within a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryIndex {
    entries: Vec<StoryIndexEntry>,
}

impl StoryIndex {
    pub fn entries(&self) -> &[StoryIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, id_or_import_path: &str) -> Option<&StoryIndexEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id_or_import_path || e.import_path == id_or_import_path)
    }

    /// Top-level groups (first title segment) in first-seen order
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for entry in &self.entries {
            let group = entry.title.split('/').next().unwrap_or_default();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }
}

/// A source that could not be enumerated during preparation
#[derive(Debug)]
pub struct SourceFailure {
    pub directory: String,
    pub error: StoryError,
}

/// Result of walking a registry
#[derive(Debug, Default)]
pub struct PreparedStories {
    pub import_map: ImportMap,
    pub index: StoryIndex,
    pub options: PreviewOptions,
    pub failures: Vec<SourceFailure>,
}

/// Walk every source of `registry` and build the import map and index
#[instrument(name = "prepare_stories", skip_all, fields(sources = registry.len()))]
pub fn prepare_stories(registry: &StoryRegistry, options: PreviewOptions) -> PreparedStories {
    let mut prepared = PreparedStories {
        options,
        ..Default::default()
    };

    for source in registry.sources() {
        let keys = match source.loader.keys() {
            Ok(keys) => keys,
            Err(error) => {
                warn!(
                    error = %error,
                    directory = %source.directory,
                    "Skipping story source"
                );
                prepared.failures.push(SourceFailure {
                    directory: source.directory.clone(),
                    error,
                });
                continue;
            }
        };

        for relative in keys {
            let import_path = source.import_path(&relative);
            let lazy = LazyStory::new(import_path.clone(), relative.clone(), source.loader.clone());

            if !prepared.import_map.insert(import_path.clone(), lazy) {
                warn!(
                    import_path = %import_path,
                    directory = %source.directory,
                    "Import path already registered by an earlier source"
                );
                continue;
            }

            prepared.index.entries.push(index_entry(source, &relative, import_path));
        }
    }

    info!(
        stories = prepared.import_map.len(),
        failed_sources = prepared.failures.len(),
        play_fn = prepared.options.play_fn,
        "Stories prepared"
    );
    prepared
}

fn index_entry(source: &StorySource, relative: &str, import_path: String) -> StoryIndexEntry {
    let title = auto_title(&source.title_prefix, relative);
    debug!(import_path = %import_path, title = %title, "Indexed story file");
    StoryIndexEntry {
        id: sanitize_id(&title),
        title,
        import_path,
        title_prefix: source.title_prefix.clone(),
    }
}

/// Title from the file's location: prefix, directories, then the file name
/// without its `.stories.<ext>` suffix. `Button/Button.stories.tsx` and
/// `Button/index.stories.tsx` both collapse to `Button`.
pub fn auto_title(title_prefix: &str, relative: &str) -> String {
    let path = relative.trim_start_matches("./");
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(file) = segments.pop() {
        let stem = file.split(".stories.").next().unwrap_or(file);
        let duplicate = segments.last() == Some(&stem);
        if !stem.is_empty() && stem != "index" && !duplicate {
            segments.push(stem);
        }
    }

    let prefix = title_prefix.trim_matches('/');
    if !prefix.is_empty() {
        segments.insert(0, prefix);
    }
    segments.join("/")
}

/// Lowercase kebab-case id, one dash between words
pub fn sanitize_id(title: &str) -> String {
    let mut id = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            id.push(ch.to_ascii_lowercase());
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    id.trim_matches('-').to_string()
}

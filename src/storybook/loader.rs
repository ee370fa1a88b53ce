//! Tree loaders
//!
//! A [`TreeLoader`] is scoped to one directory tree. It enumerates the story
//! files under its root and loads one of them on request. Nothing touches the
//! filesystem until `keys` or `load` is called, so a missing root only shows
//! up when that tree is first used.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use glob::glob;
use tracing::{debug, warn};

use super::matcher::{normalize_relative, StoryMatcher};
use super::story::StoryModule;
use crate::error::{Result, StoryError};

/// Enumerate and resolve story files inside one directory tree
pub trait TreeLoader: Send + Sync {
    /// Root of the tree this loader is scoped to
    fn root(&self) -> &Path;

    /// Relative paths (`./a/B.stories.tsx`) of every story in the tree, sorted
    fn keys(&self) -> Result<Vec<String>>;

    /// Load the story at `relative_path`
    fn load(&self, relative_path: &str) -> Result<StoryModule>;
}

/// Filesystem loader, recursive or flat
pub struct FsTreeLoader {
    root: PathBuf,
    recursive: bool,
    matcher: StoryMatcher,
}

impl FsTreeLoader {
    pub fn new(root: impl Into<PathBuf>, recursive: bool, matcher: StoryMatcher) -> Self {
        FsTreeLoader {
            root: root.into(),
            recursive,
            matcher,
        }
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoryError::RootNotFound {
                path: self.root.clone(),
            })
        }
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        Some(normalize_relative(&joined))
    }
}

impl fmt::Debug for FsTreeLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsTreeLoader")
            .field("root", &self.root)
            .field("recursive", &self.recursive)
            .field("pattern", &self.matcher.as_str())
            .finish()
    }
}

impl TreeLoader for FsTreeLoader {
    fn root(&self) -> &Path {
        &self.root
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.ensure_root()?;

        let escaped_root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = if self.recursive {
            format!("{}/**/*", escaped_root)
        } else {
            format!("{}/*", escaped_root)
        };

        debug!(pattern = %pattern, "Globbing for story files");

        let entries = glob(&pattern).map_err(|e| StoryError::InvalidSpecifier {
            specifier: pattern.clone(),
            reason: e.to_string(),
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    if let Some(key) = self.relative_key(&path) {
                        if self.matcher.is_match(&key) {
                            keys.push(key);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, root = %self.root.display(), "Failed to process glob entry");
                }
            }
        }

        keys.sort();
        debug!(root = %self.root.display(), count = keys.len(), "Enumerated story files");
        Ok(keys)
    }

    fn load(&self, relative_path: &str) -> Result<StoryModule> {
        self.ensure_root()?;

        let key = normalize_relative(relative_path);
        if !self.matcher.is_match(&key) {
            return Err(StoryError::StoryLoad {
                import_path: key,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path does not name a story file",
                ),
            });
        }

        let file_path = self.root.join(key.trim_start_matches("./"));
        let source = std::fs::read_to_string(&file_path).map_err(|e| StoryError::StoryLoad {
            import_path: key.clone(),
            source: e,
        })?;

        let mut module = StoryModule::parse(key, &source);
        module.file_path = Some(file_path);
        Ok(module)
    }
}

/// Deferred story load bound to one tree loader
///
/// Nothing is read until [`LazyStory::resolve`] runs. A successful load is
/// kept and shared by every clone; a failed load is retried on the next call.
#[derive(Clone)]
pub struct LazyStory {
    import_path: String,
    relative_path: String,
    loader: Arc<dyn TreeLoader>,
    module: Arc<OnceLock<Arc<StoryModule>>>,
}

impl LazyStory {
    pub fn new(
        import_path: impl Into<String>,
        relative_path: impl Into<String>,
        loader: Arc<dyn TreeLoader>,
    ) -> Self {
        LazyStory {
            import_path: import_path.into(),
            relative_path: relative_path.into(),
            loader,
            module: Arc::new(OnceLock::new()),
        }
    }

    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn is_loaded(&self) -> bool {
        self.module.get().is_some()
    }

    pub fn resolve(&self) -> Result<Arc<StoryModule>> {
        if let Some(module) = self.module.get() {
            return Ok(module.clone());
        }

        let loaded = Arc::new(self.loader.load(&self.relative_path)?);
        debug!(import_path = %self.import_path, "Story loaded");
        Ok(self.module.get_or_init(|| loaded).clone())
    }
}

impl PartialEq for LazyStory {
    fn eq(&self, other: &Self) -> bool {
        self.import_path == other.import_path
            && self.relative_path == other.relative_path
            && self.loader.root() == other.loader.root()
    }
}

impl fmt::Debug for LazyStory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStory")
            .field("import_path", &self.import_path)
            .field("root", &self.loader.root())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

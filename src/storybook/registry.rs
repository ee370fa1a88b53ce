//! Story registry - the ordered list of story sources for a session
//!
//! A registry is assembled from the configured specifiers on every reload and
//! replaced wholesale; sources are never edited in place. Assembly is pure:
//! it compiles matchers and binds loaders but never reads the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::loader::{FsTreeLoader, TreeLoader};
use super::matcher::{normalize_relative, StoryMatcher};
use super::story::StoryModule;
use crate::config::StoriesSpecifier;
use crate::error::{Result, StoryError};

/// Builds the tree loader for one source
///
/// Mirrors a host's `loadTree(root, recursive, pattern)` capability.
pub trait LoaderFactory: Send + Sync {
    fn tree_loader(
        &self,
        root: PathBuf,
        recursive: bool,
        matcher: StoryMatcher,
    ) -> Arc<dyn TreeLoader>;
}

impl<F> LoaderFactory for F
where
    F: Fn(PathBuf, bool, StoryMatcher) -> Arc<dyn TreeLoader> + Send + Sync,
{
    fn tree_loader(
        &self,
        root: PathBuf,
        recursive: bool,
        matcher: StoryMatcher,
    ) -> Arc<dyn TreeLoader> {
        self(root, recursive, matcher)
    }
}

/// Loads stories straight from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoaderFactory;

impl LoaderFactory for FsLoaderFactory {
    fn tree_loader(
        &self,
        root: PathBuf,
        recursive: bool,
        matcher: StoryMatcher,
    ) -> Arc<dyn TreeLoader> {
        Arc::new(FsTreeLoader::new(root, recursive, matcher))
    }
}

/// Stand-in loader for a source whose specifier did not compile.
/// Every use reports the specifier error for that source alone.
struct InvalidSourceLoader {
    root: PathBuf,
    specifier: String,
    reason: String,
}

impl InvalidSourceLoader {
    fn error(&self) -> StoryError {
        StoryError::InvalidSpecifier {
            specifier: self.specifier.clone(),
            reason: self.reason.clone(),
        }
    }
}

impl TreeLoader for InvalidSourceLoader {
    fn root(&self) -> &Path {
        &self.root
    }

    fn keys(&self) -> Result<Vec<String>> {
        Err(self.error())
    }

    fn load(&self, _relative_path: &str) -> Result<StoryModule> {
        Err(self.error())
    }
}

/// One directory tree of stories
pub struct StorySource {
    /// Display prefix for titles from this tree ("" for none)
    pub title_prefix: String,
    /// Directory as configured, normalized to `./dir` form
    pub directory: String,
    /// Glob the matcher was compiled from
    pub files: String,
    pub matcher: StoryMatcher,
    pub loader: Arc<dyn TreeLoader>,
}

impl StorySource {
    /// Import path for a file inside this tree
    ///
    /// `./components` + `./Button.stories.tsx` gives
    /// `./components/Button.stories.tsx`.
    pub fn import_path(&self, relative_path: &str) -> String {
        let relative = normalize_relative(relative_path);
        format!(
            "{}/{}",
            self.directory.trim_end_matches('/'),
            relative.trim_start_matches("./")
        )
    }

    pub fn root(&self) -> &Path {
        self.loader.root()
    }
}

impl fmt::Debug for StorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorySource")
            .field("title_prefix", &self.title_prefix)
            .field("directory", &self.directory)
            .field("files", &self.files)
            .field("root", &self.loader.root())
            .finish()
    }
}

/// Ordered story sources; order drives grouping in the story list
#[derive(Debug, Clone, Default)]
pub struct StoryRegistry {
    sources: Vec<Arc<StorySource>>,
}

impl StoryRegistry {
    pub fn new(sources: Vec<StorySource>) -> Self {
        StoryRegistry {
            sources: sources.into_iter().map(Arc::new).collect(),
        }
    }

    /// Assemble one source per specifier, in order.
    ///
    /// Directories are resolved against `project_root`. A specifier that does
    /// not compile still yields a source; its loader fails when used.
    pub fn assemble(
        specifiers: &[StoriesSpecifier],
        project_root: &Path,
        loaders: &dyn LoaderFactory,
    ) -> Self {
        let sources = specifiers
            .iter()
            .map(|spec| build_source(spec, project_root, loaders))
            .collect::<Vec<_>>();

        debug!(sources = sources.len(), "Story registry assembled");
        Self::new(sources)
    }

    pub fn sources(&self) -> &[Arc<StorySource>] {
        &self.sources
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorySource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Find sources by title prefix
    pub fn sources_with_prefix(&self, title_prefix: &str) -> Vec<&StorySource> {
        self.iter()
            .filter(|s| s.title_prefix == title_prefix)
            .collect()
    }

    /// Title prefixes in registry order, without duplicates
    pub fn title_prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = Vec::new();
        for source in self.iter() {
            if !prefixes.contains(&source.title_prefix.as_str()) {
                prefixes.push(&source.title_prefix);
            }
        }
        prefixes
    }
}

fn normalize_directory(directory: &str) -> String {
    let directory = directory.replace('\\', "/");
    let directory = directory.trim_end_matches('/');
    if directory.starts_with('/') || directory.starts_with("./") || directory.starts_with("../")
    {
        directory.to_string()
    } else if directory.is_empty() || directory == "." {
        ".".to_string()
    } else {
        format!("./{}", directory)
    }
}

fn build_source(
    spec: &StoriesSpecifier,
    project_root: &Path,
    loaders: &dyn LoaderFactory,
) -> StorySource {
    let directory = normalize_directory(&spec.directory);
    let root = project_root.join(directory.trim_start_matches("./"));

    let (matcher, loader) = match StoryMatcher::from_specifier(&spec.files) {
        Ok(matcher) => {
            let loader = loaders.tree_loader(root, true, matcher.clone());
            (matcher, loader)
        }
        Err(e) => {
            warn!(
                error = %e,
                directory = %directory,
                files = %spec.files,
                "Story specifier is invalid; source will report the error when used"
            );
            let loader: Arc<dyn TreeLoader> = Arc::new(InvalidSourceLoader {
                root,
                specifier: spec.files.clone(),
                reason: e.to_string(),
            });
            (StoryMatcher::canonical(), loader)
        }
    };

    StorySource {
        title_prefix: spec.title_prefix.clone(),
        directory,
        files: spec.files.clone(),
        matcher,
        loader,
    }
}

//! Reload coordination
//!
//! [`Bootstrap::reload`] runs once per reload trigger. It rebuilds the story
//! registry, publishes it, then either creates the preview session (cold
//! start) or updates the existing one in place (hot update). Session state
//! lives in an explicit [`PreviewContext`] rather than a hidden global.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::annotations::{AnnotationProvider, DefaultAnnotations, GetProjectAnnotations};
use crate::config::StorybookConfig;
use crate::error::{Result, StoryError};
use crate::preview::{Preview, PreviewHost, PreviewSession, StoriesChanged};
use crate::storybook::{prepare_stories, FsLoaderFactory, LoaderFactory, StoryRegistry};

/// Session slot plus the published story registry
///
/// The session slot is locked for the whole of a reload, so reloads are
/// serialized and the exists-check and the transition happen together.
pub struct PreviewContext<S> {
    view: Mutex<Option<Arc<S>>>,
    stories: RwLock<Option<Arc<StoryRegistry>>>,
}

impl<S> PreviewContext<S> {
    pub fn new() -> Self {
        PreviewContext {
            view: Mutex::new(None),
            stories: RwLock::new(None),
        }
    }

    /// The live session, if a cold start has happened
    pub fn view(&self) -> Option<Arc<S>> {
        self.view.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.view.lock().is_some()
    }

    /// Registry assembled by the latest reload, for story lists and tooling
    pub fn published_stories(&self) -> Option<Arc<StoryRegistry>> {
        self.stories.read().clone()
    }

    fn publish_stories(&self, registry: Arc<StoryRegistry>) {
        *self.stories.write() = Some(registry);
    }
}

impl<S> Default for PreviewContext<S> {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_CONTEXT: LazyLock<PreviewContext<Preview>> = LazyLock::new(PreviewContext::new);

/// Process-wide context for the in-process [`Preview`]
pub fn global_context() -> &'static PreviewContext<Preview> {
    &GLOBAL_CONTEXT
}

/// Optional "accept this update" notification some hosts expose
pub trait HotAcceptHook: Send + Sync {
    fn accept(&self);
}

/// Which transition a reload took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    ColdStart { sources: usize },
    HotUpdate { sources: usize, stories: usize },
}

/// Everything a reload needs besides the context
pub struct Bootstrap<H: PreviewHost> {
    project_root: PathBuf,
    config: StorybookConfig,
    host: H,
    loaders: Arc<dyn LoaderFactory>,
    annotations: Arc<dyn AnnotationProvider>,
    hot: Option<Arc<dyn HotAcceptHook>>,
}

impl<H: PreviewHost> Bootstrap<H> {
    /// Filesystem loaders and the default annotations, rooted at `project_root`
    pub fn new(project_root: impl Into<PathBuf>, config: StorybookConfig, host: H) -> Self {
        let project_root = project_root.into();
        let preview_path = project_root.join(config.get_preview_path());
        Bootstrap {
            project_root,
            config,
            host,
            loaders: Arc::new(FsLoaderFactory),
            annotations: Arc::new(DefaultAnnotations::new(preview_path)),
            hot: None,
        }
    }

    pub fn with_loader_factory(mut self, loaders: Arc<dyn LoaderFactory>) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn with_annotations(mut self, annotations: Arc<dyn AnnotationProvider>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_hot_accept(mut self, hook: Arc<dyn HotAcceptHook>) -> Self {
        self.hot = Some(hook);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &StorybookConfig {
        &self.config
    }

    /// Swap in a new config; it takes effect on the next reload
    pub fn set_config(&mut self, config: StorybookConfig) {
        self.config = config;
    }

    /// Build the story registry from the current config. Touches no files.
    pub fn assemble_registry(&self) -> StoryRegistry {
        StoryRegistry::assemble(&self.config.stories, &self.project_root, &*self.loaders)
    }

    /// Handle one reload trigger.
    ///
    /// Only a failed cold start is an error; problems with single sources or
    /// stories are logged and left to their own slots.
    #[instrument(name = "reload", skip_all)]
    pub fn reload(&self, ctx: &PreviewContext<H::Session>) -> Result<ReloadOutcome> {
        let started = Instant::now();
        let registry = Arc::new(self.assemble_registry());
        ctx.publish_stories(registry.clone());

        if let Some(hook) = &self.hot {
            hook.accept();
        }

        let mut view = ctx.view.lock();
        let existing = view.clone();
        let outcome = match existing {
            None => {
                let session = self.cold_start(registry.clone())?;
                *view = Some(session);
                ReloadOutcome::ColdStart {
                    sources: registry.len(),
                }
            }
            Some(session) => self.hot_update(&session, &registry),
        };
        drop(view);

        info!(
            outcome = ?outcome,
            duration_ms = started.elapsed().as_millis() as u64,
            "Reload complete"
        );
        Ok(outcome)
    }

    fn cold_start(&self, registry: Arc<StoryRegistry>) -> Result<Arc<H::Session>> {
        let annotations = self
            .annotations
            .project_annotations()
            .map_err(|e| StoryError::SessionStart(e.to_string()))?;

        debug!(
            annotations = annotations.len(),
            sources = registry.len(),
            "Cold start"
        );
        self.host.start(annotations, registry, self.config.options)
    }

    fn hot_update(&self, session: &H::Session, registry: &StoryRegistry) -> ReloadOutcome {
        let prepared = prepare_stories(registry, self.config.options);
        let stories = prepared.import_map.len();

        session.on_stories_changed(StoriesChanged::from_prepared(prepared));

        let provider = self.annotations.clone();
        let get: GetProjectAnnotations = Arc::new(move || provider.project_annotations());
        session.on_project_annotations_changed(get);

        ReloadOutcome::HotUpdate {
            sources: registry.len(),
            stories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, AnnotationSet};
    use crate::config::{PreviewOptions, StoriesSpecifier};
    use crate::preview::PreviewRuntime;
    use crate::storybook::{ImportFn, StoryIndex};
    use serde_json::json;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Start,
        StoriesChanged,
        AnnotationsChanged,
    }

    #[derive(Default)]
    struct RecordingSession {
        calls: Mutex<Vec<Call>>,
        import_fn: Mutex<Option<ImportFn>>,
        index: Mutex<StoryIndex>,
        annotations: Mutex<AnnotationSet>,
        options: Mutex<Option<PreviewOptions>>,
    }

    impl RecordingSession {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn import(&self, path: &str) -> Result<Arc<crate::storybook::StoryModule>> {
            let import_fn = self.import_fn.lock().clone().expect("no import fn yet");
            import_fn(path)
        }
    }

    impl PreviewSession for RecordingSession {
        fn on_stories_changed(&self, update: StoriesChanged) {
            self.calls.lock().push(Call::StoriesChanged);
            *self.import_fn.lock() = Some(update.import_fn);
            *self.index.lock() = update.index;
        }

        fn on_project_annotations_changed(&self, get: GetProjectAnnotations) {
            self.calls.lock().push(Call::AnnotationsChanged);
            *self.annotations.lock() = get().unwrap();
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        starts: AtomicUsize,
    }

    impl PreviewHost for RecordingHost {
        type Session = RecordingSession;

        fn start(
            &self,
            annotations: AnnotationSet,
            registry: Arc<StoryRegistry>,
            options: PreviewOptions,
        ) -> Result<Arc<RecordingSession>> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            let prepared = prepare_stories(&registry, options);
            let session = RecordingSession::default();
            session.calls.lock().push(Call::Start);
            *session.index.lock() = prepared.index;
            *session.import_fn.lock() = Some(prepared.import_map.into_import_fn());
            *session.annotations.lock() = annotations;
            *session.options.lock() = Some(options);
            Ok(Arc::new(session))
        }
    }

    struct FailingHost;

    impl PreviewHost for FailingHost {
        type Session = RecordingSession;

        fn start(
            &self,
            _annotations: AnnotationSet,
            _registry: Arc<StoryRegistry>,
            _options: PreviewOptions,
        ) -> Result<Arc<RecordingSession>> {
            Err(StoryError::SessionStart("renderer unavailable".to_string()))
        }
    }

    /// Annotation provider whose output changes between calls
    struct CountingAnnotations {
        builds: AtomicUsize,
    }

    impl AnnotationProvider for CountingAnnotations {
        fn project_annotations(&self) -> Result<AnnotationSet> {
            let build = self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(std::iter::once(Annotation::new("counter", json!({ "build": build }))).collect())
        }
    }

    struct CountingHook(AtomicUsize);

    impl HotAcceptHook for CountingHook {
        fn accept(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "export const Default = {};").unwrap();
    }

    fn config(specs: &[(&str, &str)]) -> StorybookConfig {
        StorybookConfig {
            stories: specs
                .iter()
                .map(|(prefix, dir)| StoriesSpecifier::new(*prefix, *dir))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cold_start_creates_session() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            config(&[("", "./components")]),
            RecordingHost::default(),
        );
        let ctx = PreviewContext::new();
        assert!(!ctx.is_active());

        let outcome = bootstrap.reload(&ctx).unwrap();

        assert_eq!(outcome, ReloadOutcome::ColdStart { sources: 1 });
        let session = ctx.view().unwrap();
        assert_eq!(session.calls(), vec![Call::Start]);
        assert_eq!(*session.options.lock(), Some(PreviewOptions { play_fn: false }));
        let keys: Vec<String> = session
            .index
            .lock()
            .entries()
            .iter()
            .map(|e| e.import_path.clone())
            .collect();
        assert_eq!(keys, vec!["./components/Button.stories.tsx"]);
        assert!(session.import("./components/Button.stories.tsx").is_ok());
        assert_eq!(session.annotations.lock().len(), 8);
    }

    #[test]
    fn test_hot_update_notifies_stories_then_annotations() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            config(&[("", "./components")]),
            RecordingHost::default(),
        );
        let ctx = PreviewContext::new();
        bootstrap.reload(&ctx).unwrap();
        let outcome = bootstrap.reload(&ctx).unwrap();

        assert_eq!(
            outcome,
            ReloadOutcome::HotUpdate {
                sources: 1,
                stories: 1
            }
        );
        assert_eq!(
            ctx.view().unwrap().calls(),
            vec![Call::Start, Call::StoriesChanged, Call::AnnotationsChanged]
        );
        assert_eq!(bootstrap.host.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_identity_survives_hot_update() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            config(&[("", "./components")]),
            RecordingHost::default(),
        )
        .with_annotations(Arc::new(CountingAnnotations {
            builds: AtomicUsize::new(0),
        }));
        let ctx = PreviewContext::new();

        bootstrap.reload(&ctx).unwrap();
        let before = ctx.view().unwrap();
        write(temp_dir.path(), "components/Card.stories.tsx");
        bootstrap.reload(&ctx).unwrap();
        let after = ctx.view().unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.index.lock().len(), 2);
        assert_eq!(
            after.annotations.lock().parameter("build"),
            Some(&json!(1))
        );
    }

    #[test]
    fn test_rename_makes_old_path_stale() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            config(&[("", "./components")]),
            RecordingHost::default(),
        );
        let ctx = PreviewContext::new();
        bootstrap.reload(&ctx).unwrap();

        fs::rename(
            temp_dir.path().join("components/Button.stories.tsx"),
            temp_dir.path().join("components/Btn.stories.tsx"),
        )
        .unwrap();
        bootstrap.reload(&ctx).unwrap();

        let session = ctx.view().unwrap();
        assert!(session.import("./components/Btn.stories.tsx").is_ok());
        assert!(matches!(
            session.import("./components/Button.stories.tsx"),
            Err(StoryError::StaleImport(_))
        ));
    }

    #[test]
    fn test_two_sources_import_map() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");
        write(temp_dir.path(), "other_components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            StorybookConfig::default(),
            PreviewRuntime,
        );
        let ctx = PreviewContext::new();
        bootstrap.reload(&ctx).unwrap();

        let preview = ctx.view().unwrap();
        let index = preview.story_index();
        let paths: Vec<&str> = index.entries().iter().map(|e| e.import_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "./components/Button.stories.tsx",
                "./other_components/Button.stories.tsx"
            ]
        );
        assert!(preview.import("./other_components/Button.stories.tsx").is_ok());
    }

    #[test]
    fn test_unchanged_registry_keeps_index_across_hot_updates() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            config(&[("", "./components")]),
            PreviewRuntime,
        );
        let ctx = PreviewContext::new();
        bootstrap.reload(&ctx).unwrap();
        bootstrap.reload(&ctx).unwrap();
        let first = ctx.view().unwrap().story_index();
        bootstrap.reload(&ctx).unwrap();
        let second = ctx.view().unwrap().story_index();

        assert_eq!(first, second);
        assert_eq!(ctx.view().unwrap().generation(), 2);
    }

    #[test]
    fn test_registry_is_published_every_reload() {
        let temp_dir = TempDir::new().unwrap();
        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            StorybookConfig::default(),
            RecordingHost::default(),
        );
        let ctx = PreviewContext::new();
        assert!(ctx.published_stories().is_none());

        bootstrap.reload(&ctx).unwrap();
        let first = ctx.published_stories().unwrap();
        bootstrap.reload(&ctx).unwrap();
        let second = ctx.published_stories().unwrap();

        assert_eq!(first.len(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_cold_start_leaves_context_uninitialized() {
        let temp_dir = TempDir::new().unwrap();
        let bootstrap = Bootstrap::new(temp_dir.path(), StorybookConfig::default(), FailingHost);
        let ctx = PreviewContext::new();

        assert!(matches!(
            bootstrap.reload(&ctx),
            Err(StoryError::SessionStart(_))
        ));
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_missing_tree_still_activates_session() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "components/Button.stories.tsx");

        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            StorybookConfig::default(),
            PreviewRuntime,
        );
        let ctx = PreviewContext::new();

        assert!(bootstrap.reload(&ctx).is_ok());
        assert_eq!(ctx.view().unwrap().story_index().len(), 1);
    }

    #[test]
    fn test_hot_accept_hook_runs_each_reload() {
        let temp_dir = TempDir::new().unwrap();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let bootstrap = Bootstrap::new(
            temp_dir.path(),
            StorybookConfig::default(),
            RecordingHost::default(),
        )
        .with_hot_accept(hook.clone());
        let ctx = PreviewContext::new();

        bootstrap.reload(&ctx).unwrap();
        bootstrap.reload(&ctx).unwrap();

        assert_eq!(hook.0.load(Ordering::SeqCst), 2);
    }
}

//! Preview session
//!
//! [`PreviewHost`] creates a session on cold start; [`PreviewSession`] takes the
//! in-place updates of a hot reload. [`Preview`] is the in-process session used
//! by the CLI. It owns the current import fn, story index and annotations, and
//! is only ever updated in place so handles held elsewhere stay valid.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::annotations::{AnnotationSet, GetProjectAnnotations};
use crate::config::PreviewOptions;
use crate::error::{ErrorSeverity, Result};
use crate::storybook::{prepare_stories, ImportFn, PreparedStories, StoryIndex, StoryModule, StoryRegistry};

/// Payload of a stories-changed notification
#[derive(Clone)]
pub struct StoriesChanged {
    /// Resolves import paths against the freshly prepared import map
    pub import_fn: ImportFn,
    pub index: StoryIndex,
}

impl StoriesChanged {
    pub fn from_prepared(prepared: PreparedStories) -> Self {
        StoriesChanged {
            index: prepared.index,
            import_fn: prepared.import_map.into_import_fn(),
        }
    }
}

/// A live preview that accepts hot updates
pub trait PreviewSession: Send + Sync {
    /// Rebind story resolution to a new import map
    fn on_stories_changed(&self, update: StoriesChanged);

    /// Replace the project annotations; `get` builds them fresh
    fn on_project_annotations_changed(&self, get: GetProjectAnnotations);
}

/// Creates preview sessions
pub trait PreviewHost: Send + Sync {
    type Session: PreviewSession;

    /// Cold start: the session prepares its own stories from `registry`
    fn start(
        &self,
        annotations: AnnotationSet,
        registry: Arc<StoryRegistry>,
        options: PreviewOptions,
    ) -> Result<Arc<Self::Session>>;
}

/// What a story slot shows
#[derive(Debug, Clone)]
pub enum StorySlot {
    Ready(Arc<StoryModule>),
    Failed {
        import_path: String,
        message: String,
        severity: ErrorSeverity,
    },
}

struct PreviewState {
    import_fn: ImportFn,
    index: StoryIndex,
    annotations: AnnotationSet,
    options: PreviewOptions,
    generation: u64,
}

/// In-process preview session
pub struct Preview {
    state: RwLock<PreviewState>,
}

impl Preview {
    #[instrument(name = "preview_start", skip_all, fields(sources = registry.len()))]
    pub fn start(
        annotations: AnnotationSet,
        registry: &StoryRegistry,
        options: PreviewOptions,
    ) -> Self {
        let StoriesChanged { import_fn, index } =
            StoriesChanged::from_prepared(prepare_stories(registry, options));

        info!(
            stories = index.len(),
            annotations = annotations.len(),
            play_fn = options.play_fn,
            "Preview session started"
        );

        Preview {
            state: RwLock::new(PreviewState {
                import_fn,
                index,
                annotations,
                options,
                generation: 0,
            }),
        }
    }

    /// Load a story through the current import fn
    pub fn import(&self, import_path: &str) -> Result<Arc<StoryModule>> {
        let import_fn = self.state.read().import_fn.clone();
        import_fn(import_path)
    }

    /// Load a story for display; failures stay inside the slot
    pub fn render_slot(&self, import_path: &str) -> StorySlot {
        match self.import(import_path) {
            Ok(module) => StorySlot::Ready(module),
            Err(e) => {
                warn!(error = %e, import_path = %import_path, "Story failed to load");
                StorySlot::Failed {
                    import_path: import_path.to_string(),
                    message: e.user_message(),
                    severity: e.severity(),
                }
            }
        }
    }

    pub fn story_index(&self) -> StoryIndex {
        self.state.read().index.clone()
    }

    pub fn annotations(&self) -> AnnotationSet {
        self.state.read().annotations.clone()
    }

    pub fn parameters(&self) -> Map<String, Value> {
        self.state.read().annotations.merged_parameters()
    }

    pub fn options(&self) -> PreviewOptions {
        self.state.read().options
    }

    /// Number of stories-changed updates applied since start
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }
}

impl PreviewSession for Preview {
    fn on_stories_changed(&self, update: StoriesChanged) {
        let mut state = self.state.write();
        state.import_fn = update.import_fn;
        state.index = update.index;
        state.generation += 1;
        info!(
            stories = state.index.len(),
            generation = state.generation,
            "Stories changed"
        );
    }

    fn on_project_annotations_changed(&self, get: GetProjectAnnotations) {
        match get() {
            Ok(annotations) => {
                info!(annotations = annotations.len(), "Project annotations changed");
                self.state.write().annotations = annotations;
            }
            Err(e) => {
                error!(error = %e, "Keeping previous project annotations");
            }
        }
    }
}

/// Host for [`Preview`] sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewRuntime;

impl PreviewHost for PreviewRuntime {
    type Session = Preview;

    fn start(
        &self,
        annotations: AnnotationSet,
        registry: Arc<StoryRegistry>,
        options: PreviewOptions,
    ) -> Result<Arc<Preview>> {
        Ok(Arc::new(Preview::start(annotations, &registry, options)))
    }
}

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{recommended_watcher, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Result, StoryError};
use crate::storybook::matcher::normalize_relative;
use crate::storybook::{StoryMatcher, StoryRegistry};

/// Event emitted when the preview needs a reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryReloadEvent {
    /// A story file was modified
    FileChanged(PathBuf),
    /// A new story file appeared (created or renamed into place)
    FileCreated(PathBuf),
    /// A story file went away (deleted or renamed away)
    FileDeleted(PathBuf),
    /// The project preview annotations file changed
    PreviewChanged,
    /// A directory inside a story tree was added or removed
    FullReload,
}

struct WatchTarget {
    root: PathBuf,
    matcher: StoryMatcher,
}

/// What to watch and how to classify what happens there
///
/// Roots and the preview path are held in canonical absolute form, and event
/// paths are resolved the same way before comparison, so relative project
/// roots and backends that report absolute or symlink-resolved paths agree.
pub struct WatchPlan {
    targets: Vec<WatchTarget>,
    preview_path: PathBuf,
}

impl WatchPlan {
    pub fn from_registry(registry: &StoryRegistry, preview_path: impl Into<PathBuf>) -> Self {
        let targets = registry
            .iter()
            .map(|source| WatchTarget {
                root: resolve_path(source.root()),
                matcher: source.matcher.clone(),
            })
            .collect();
        WatchPlan {
            targets,
            preview_path: resolve_path(&preview_path.into()),
        }
    }

    /// Story roots in resolved form
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.targets.iter().map(|t| t.root.as_path())
    }

    /// Map one filesystem event path to a reload event, if it matters
    pub fn classify(&self, path: &Path, kind: &EventKind) -> Option<StoryReloadEvent> {
        let resolved = resolve_path(path);
        let path = resolved.as_path();
        if path == self.preview_path {
            return match kind {
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                    Some(StoryReloadEvent::PreviewChanged)
                }
                _ => None,
            };
        }

        let target = self.targets.iter().find(|t| path.starts_with(&t.root))?;
        let relative = path.strip_prefix(&target.root).ok()?;
        let key = normalize_relative(&relative.to_string_lossy());

        if !target.matcher.is_match(&key) {
            let directory_changed = matches!(
                kind,
                EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
            ) || (matches!(kind, EventKind::Modify(ModifyKind::Name(_))) && path.is_dir());
            return directory_changed.then_some(StoryReloadEvent::FullReload);
        }

        match kind {
            EventKind::Create(_) => Some(StoryReloadEvent::FileCreated(path.to_path_buf())),
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    Some(StoryReloadEvent::FileCreated(path.to_path_buf()))
                } else {
                    Some(StoryReloadEvent::FileDeleted(path.to_path_buf()))
                }
            }
            EventKind::Modify(_) => Some(StoryReloadEvent::FileChanged(path.to_path_buf())),
            EventKind::Remove(_) => Some(StoryReloadEvent::FileDeleted(path.to_path_buf())),
            _ => None,
        }
    }
}

/// Watches every story tree and the preview file, emitting debounced reload events
pub struct StoryWatcher {
    plan: Option<WatchPlan>,
    debounce: Duration,
    tx: Option<Sender<StoryReloadEvent>>,
    stop: Arc<AtomicBool>,
    watcher_thread: Option<thread::JoinHandle<()>>,
}

impl StoryWatcher {
    /// Create a new StoryWatcher
    ///
    /// Returns a tuple of (watcher, receiver) where receiver will emit
    /// StoryReloadEvent when story files or the preview file change.
    pub fn new(plan: WatchPlan, debounce: Duration) -> (Self, Receiver<StoryReloadEvent>) {
        let (tx, rx) = channel();
        let watcher = StoryWatcher {
            plan: Some(plan),
            debounce,
            tx: Some(tx),
            stop: Arc::new(AtomicBool::new(false)),
            watcher_thread: None,
        };
        (watcher, rx)
    }

    /// Start watching in a background thread
    pub fn start(&mut self) -> Result<()> {
        let (tx, plan) = match (self.tx.take(), self.plan.take()) {
            (Some(tx), Some(plan)) => (tx, plan),
            _ => return Err(StoryError::Config("watcher already started".to_string())),
        };

        let debounce = self.debounce;
        let stop = self.stop.clone();
        let thread_handle = thread::spawn(move || {
            if let Err(e) = Self::watch_loop(plan, debounce, tx, stop) {
                warn!(error = %e, watcher = "stories", "Story watcher error");
            }
        });

        self.watcher_thread = Some(thread_handle);
        Ok(())
    }

    /// Internal watch loop running in background thread
    fn watch_loop(
        plan: WatchPlan,
        debounce: Duration,
        tx: Sender<StoryReloadEvent>,
        stop: Arc<AtomicBool>,
    ) -> Result<()> {
        // Pending events per path, flushed once they have been quiet for `debounce`
        let pending: Mutex<HashMap<PathBuf, (StoryReloadEvent, Instant)>> =
            Mutex::new(HashMap::new());

        let (watch_tx, watch_rx) = channel();
        let mut watcher: Box<dyn Watcher> = Box::new(recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                let _ = watch_tx.send(res);
            },
        )?);

        let mut missing: Vec<PathBuf> = Vec::new();
        for root in plan.roots() {
            if root.is_dir() {
                watcher.watch(root, RecursiveMode::Recursive)?;
                info!(path = %root.display(), recursive = true, "Story watcher started");
            } else {
                warn!(path = %root.display(), "Story root missing, watching for it to appear");
                missing.push(root.to_path_buf());
            }
        }

        if let Some(parent) = plan.preview_path.parent().filter(|p| p.is_dir()) {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
            info!(path = %plan.preview_path.display(), "Preview watcher started");
        }

        while !stop.load(Ordering::Relaxed) {
            match watch_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(event)) => {
                    for path in &event.paths {
                        if let Some(reload_event) = plan.classify(path, &event.kind) {
                            debug!(path = %path.display(), event_type = ?reload_event, "Story file event");
                            pending
                                .lock()
                                .insert(path.clone(), (reload_event, Instant::now()));
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, watcher = "stories", "File watcher error");
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            for root in watch_appeared_roots(watcher.as_mut(), &mut missing) {
                pending
                    .lock()
                    .insert(root, (StoryReloadEvent::FullReload, Instant::now()));
            }

            let now = Instant::now();
            let expired: Vec<(PathBuf, StoryReloadEvent)> = {
                let mut pending = pending.lock();
                let paths: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, (_, at))| now.duration_since(*at) >= debounce)
                    .map(|(path, _)| path.clone())
                    .collect();
                paths
                    .into_iter()
                    .filter_map(|path| pending.remove(&path).map(|(event, _)| (path, event)))
                    .collect()
            };

            // Send events outside the lock
            for (path, event) in expired {
                info!(path = %path.display(), event_type = ?event, "Emitting story reload event");
                if tx.send(event).is_err() {
                    info!(watcher = "stories", "Receiver dropped, story watcher shutting down");
                    return Ok(());
                }
            }
        }

        info!(watcher = "stories", "Story watcher shutting down");
        Ok(())
    }
}

/// Start watching every missing root that now exists; returns those roots
fn watch_appeared_roots(watcher: &mut dyn Watcher, missing: &mut Vec<PathBuf>) -> Vec<PathBuf> {
    let mut appeared = Vec::new();
    missing.retain(|root| {
        if !root.is_dir() {
            return true;
        }
        match watcher.watch(root, RecursiveMode::Recursive) {
            Ok(()) => {
                info!(path = %root.display(), recursive = true, "Story root appeared, watching");
                appeared.push(root.clone());
                false
            }
            Err(e) => {
                warn!(error = %e, path = %root.display(), "Failed to watch story root");
                true
            }
        }
    });
    appeared
}

/// Absolute, symlink-resolved form of `path`. The longest existing prefix is
/// canonicalized and the rest appended, so deleted or not-yet-created paths
/// resolve consistently with existing ones.
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path.to_path_buf(),
        }
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

impl Drop for StoryWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.watcher_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoriesSpecifier;
    use crate::storybook::FsLoaderFactory;
    use notify::event::DataChange;
    use notify::event::RenameMode;
    use std::fs;
    use tempfile::TempDir;

    fn plan(project: &Path) -> WatchPlan {
        let registry = StoryRegistry::assemble(
            &[
                StoriesSpecifier::new("", "./components"),
                StoriesSpecifier::new("OtherComponents", "./other_components"),
            ],
            project,
            &FsLoaderFactory,
        );
        WatchPlan::from_registry(&registry, project.join(".storybook/preview.json"))
    }

    #[test]
    fn test_story_file_events() {
        let project = Path::new("/project");
        let plan = plan(project);
        let story = project.join("components/forms/Input.stories.tsx");

        assert_eq!(
            plan.classify(&story, &EventKind::Create(CreateKind::File)),
            Some(StoryReloadEvent::FileCreated(story.clone()))
        );
        assert_eq!(
            plan.classify(
                &story,
                &EventKind::Modify(ModifyKind::Data(DataChange::Content))
            ),
            Some(StoryReloadEvent::FileChanged(story.clone()))
        );
        assert_eq!(
            plan.classify(&story, &EventKind::Remove(RemoveKind::File)),
            Some(StoryReloadEvent::FileDeleted(story.clone()))
        );
    }

    #[test]
    fn test_rename_away_is_a_delete() {
        let project = Path::new("/project");
        let plan = plan(project);
        let gone = project.join("other_components/Button.stories.tsx");

        assert_eq!(
            plan.classify(&gone, &EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(StoryReloadEvent::FileDeleted(gone.clone()))
        );
    }

    #[test]
    fn test_rename_into_place_is_a_create() {
        let temp_dir = TempDir::new().unwrap();
        let plan = plan(temp_dir.path());
        let path = temp_dir.path().join("components/Btn.stories.tsx");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "export const A = {};").unwrap();

        assert_eq!(
            plan.classify(&path, &EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(StoryReloadEvent::FileCreated(path.canonicalize().unwrap()))
        );
    }

    #[test]
    fn test_irrelevant_files_are_ignored() {
        let project = Path::new("/project");
        let plan = plan(project);

        for path in [
            project.join("components/Button.tsx"),
            project.join("components/.cache/Button.stories.tsx"),
            project.join("src/App.stories.tsx"),
        ] {
            assert_eq!(
                plan.classify(&path, &EventKind::Create(CreateKind::File)),
                None,
                "{}",
                path.display()
            );
        }
    }

    #[test]
    fn test_folder_changes_trigger_full_reload() {
        let project = Path::new("/project");
        let plan = plan(project);

        assert_eq!(
            plan.classify(
                &project.join("components/forms"),
                &EventKind::Remove(RemoveKind::Folder)
            ),
            Some(StoryReloadEvent::FullReload)
        );
    }

    #[test]
    fn test_preview_file_changes() {
        let project = Path::new("/project");
        let plan = plan(project);

        assert_eq!(
            plan.classify(
                &project.join(".storybook/preview.json"),
                &EventKind::Modify(ModifyKind::Data(DataChange::Content))
            ),
            Some(StoryReloadEvent::PreviewChanged)
        );
        assert_eq!(
            plan.classify(
                &project.join(".storybook/main.json"),
                &EventKind::Modify(ModifyKind::Data(DataChange::Content))
            ),
            None
        );
    }

    #[test]
    fn test_relative_root_matches_absolute_event_paths() {
        let plan = plan(Path::new("."));
        let cwd = std::env::current_dir().unwrap();
        let absolute = cwd.join("components/Button.stories.tsx");

        assert_eq!(
            plan.classify(&absolute, &EventKind::Create(CreateKind::File)),
            Some(StoryReloadEvent::FileCreated(absolute.clone()))
        );
        assert_eq!(
            plan.classify(
                Path::new("./components/Button.stories.tsx"),
                &EventKind::Create(CreateKind::File)
            ),
            Some(StoryReloadEvent::FileCreated(absolute))
        );
        assert_eq!(
            plan.classify(
                &cwd.join(".storybook/preview.json"),
                &EventKind::Modify(ModifyKind::Data(DataChange::Content))
            ),
            Some(StoryReloadEvent::PreviewChanged)
        );
    }

    #[test]
    fn test_canonical_event_paths_match_non_canonical_root() {
        let temp_dir = TempDir::new().unwrap();
        let components = temp_dir.path().join("components");
        fs::create_dir_all(&components).unwrap();
        let story = components.join("Card.stories.tsx");
        fs::write(&story, "export const A = {};").unwrap();

        // Root given through a `..` detour; events arrive canonicalized
        let detour = temp_dir.path().join("components").join("..");
        let plan = plan(&detour);
        let reported = story.canonicalize().unwrap();

        assert_eq!(
            plan.classify(
                &reported,
                &EventKind::Modify(ModifyKind::Data(DataChange::Content))
            ),
            Some(StoryReloadEvent::FileChanged(reported.clone()))
        );
    }

    #[test]
    fn test_missing_root_is_watched_once_it_appears() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("other_components");
        let mut watcher = recommended_watcher(|_res: notify::Result<notify::Event>| {}).unwrap();
        let mut missing = vec![root.clone()];

        assert!(watch_appeared_roots(&mut watcher, &mut missing).is_empty());
        assert_eq!(missing, vec![root.clone()]);

        fs::create_dir_all(&root).unwrap();
        assert_eq!(watch_appeared_roots(&mut watcher, &mut missing), vec![root]);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_story_watcher_start_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, _rx) =
            StoryWatcher::new(plan(temp_dir.path()), Duration::from_millis(10));

        watcher.start().unwrap();
        assert!(matches!(watcher.start(), Err(StoryError::Config(_))));
    }

    #[test]
    fn test_story_reload_event_equality() {
        let path1 = PathBuf::from("/p/components/A.stories.tsx");
        let path2 = PathBuf::from("/p/components/B.stories.tsx");

        assert_eq!(
            StoryReloadEvent::FileChanged(path1.clone()),
            StoryReloadEvent::FileChanged(path1.clone())
        );
        assert_ne!(
            StoryReloadEvent::FileChanged(path1.clone()),
            StoryReloadEvent::FileChanged(path2)
        );
        assert_ne!(
            StoryReloadEvent::FileChanged(path1.clone()),
            StoryReloadEvent::FileCreated(path1)
        );
    }
}

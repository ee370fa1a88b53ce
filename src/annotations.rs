//! Project annotations
//!
//! Global parameters applied to every story. The set is an ordered list of
//! modules; when two modules set the same key the later one wins. The set is
//! rebuilt from scratch on every cold start and hot update.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, StoryError};

/// Rebuilds the project annotations on demand
pub type GetProjectAnnotations = Arc<dyn Fn() -> Result<AnnotationSet> + Send + Sync>;

/// One annotation module
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub parameters: Map<String, Value>,
}

impl Annotation {
    pub fn new(name: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Annotation {
            name: name.into(),
            parameters,
        }
    }
}

/// Ordered annotation modules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append; later annotations shadow earlier ones
    pub fn push(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.annotations.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// All parameters folded in order, last wins per top-level key
    pub fn merged_parameters(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for annotation in &self.annotations {
            for (key, value) in &annotation.parameters {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Effective value of one parameter
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.annotations
            .iter()
            .rev()
            .find_map(|a| a.parameters.get(key))
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        AnnotationSet {
            annotations: iter.into_iter().collect(),
        }
    }
}

/// Source of the project annotation set
pub trait AnnotationProvider: Send + Sync {
    fn project_annotations(&self) -> Result<AnnotationSet>;
}

// ============================================
// BUILT-IN MODULES
// ============================================

pub fn notes_addon() -> Annotation {
    Annotation::new("addon-ondevice-notes", json!({ "notes": { "markdown": true } }))
}

pub fn controls_addon() -> Annotation {
    Annotation::new(
        "addon-ondevice-controls",
        json!({ "controls": { "expanded": false, "hideNoControlsWarning": false } }),
    )
}

pub fn knobs_addon() -> Annotation {
    Annotation::new("addon-ondevice-knobs", json!({ "knobs": { "escapeHTML": true } }))
}

pub fn backgrounds_addon() -> Annotation {
    Annotation::new(
        "addon-ondevice-backgrounds",
        json!({
            "backgrounds": {
                "default": "plain",
                "values": [
                    { "name": "plain", "value": "white" },
                    { "name": "warm", "value": "hotpink" },
                    { "name": "cool", "value": "deepskyblue" }
                ]
            }
        }),
    )
}

pub fn actions_addon() -> Annotation {
    Annotation::new("addon-ondevice-actions", json!({ "actions": { "enabled": true } }))
}

/// Defaults of the preview runtime itself
pub fn preview_runtime_defaults() -> Annotation {
    Annotation::new(
        "preview-runtime",
        json!({ "layout": "padded", "renderer": "react-native" }),
    )
}

/// Action logging core: any `on*` arg is recorded as an action
pub fn actions_core() -> Annotation {
    Annotation::new(
        "addon-actions",
        json!({ "actions": { "enabled": true, "argTypesRegex": "^on[A-Z].*" } }),
    )
}

#[derive(Debug, Default, Deserialize)]
struct ProjectPreview {
    #[serde(default)]
    parameters: Map<String, Value>,
}

/// Read the project's own preview file; a missing file is an empty module
pub fn project_preview(path: &Path) -> Result<Annotation> {
    let preview = match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<ProjectPreview>(&contents)
            .map_err(|e| StoryError::Annotations(format!("{}: {}", path.display(), e)))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Preview file not found, using no project parameters");
            ProjectPreview::default()
        }
        Err(e) => {
            return Err(StoryError::Annotations(format!("{}: {}", path.display(), e)));
        }
    };

    Ok(Annotation {
        name: "project-preview".to_string(),
        parameters: preview.parameters,
    })
}

/// The standard annotation set, with the project preview re-read every time
#[derive(Debug, Clone)]
pub struct DefaultAnnotations {
    preview_path: PathBuf,
}

impl DefaultAnnotations {
    pub fn new(preview_path: impl Into<PathBuf>) -> Self {
        DefaultAnnotations {
            preview_path: preview_path.into(),
        }
    }
}

impl AnnotationProvider for DefaultAnnotations {
    fn project_annotations(&self) -> Result<AnnotationSet> {
        let mut set = AnnotationSet::new();
        set.push(notes_addon());
        set.push(controls_addon());
        set.push(knobs_addon());
        set.push(backgrounds_addon());
        set.push(actions_addon());
        set.push(project_preview(&self.preview_path)?);
        set.push(preview_runtime_defaults());
        set.push(actions_core());

        debug!(annotations = set.len(), "Project annotations built");
        Ok(set)
    }
}

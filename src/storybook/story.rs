use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// A loaded story file
///
/// Holds the component story format metadata the preview needs to list and
/// select stories. The file itself is rendered by the preview runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryModule {
    /// Path relative to the tree root, as `./Button.stories.tsx`
    pub relative_path: String,
    /// Location on disk when the module came from the filesystem
    pub file_path: Option<PathBuf>,
    /// `title` from the default export, if declared
    pub title: Option<String>,
    /// Named story exports, in source order
    pub exports: Vec<String>,
}

static DEFAULT_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)export\s+default\s*\{.*?\btitle\s*:\s*["'`]([^"'`]+)["'`]"#)
        .expect("Invalid regex")
});

static NAMED_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+(?:const|let|var|function)\s+([A-Za-z_$][\w$]*)")
        .expect("Invalid regex")
});

impl StoryModule {
    /// Extract story metadata from component story format source
    pub fn parse(relative_path: impl Into<String>, source: &str) -> Self {
        let title = DEFAULT_TITLE
            .captures(source)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());

        let exports = NAMED_EXPORT
            .captures_iter(source)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect();

        StoryModule {
            relative_path: relative_path.into(),
            file_path: None,
            title,
            exports,
        }
    }
}

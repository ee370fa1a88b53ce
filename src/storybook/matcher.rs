//! Story file matching
//!
//! Paths are matched in the form a tree loader reports them: relative to the
//! tree root and written `./dir/Name.stories.tsx`. Any path segment starting
//! with `.` is rejected before the pattern is consulted, so hidden files and
//! directories never become stories. A matcher compiled from a configured
//! glob only narrows the canonical rule; it never widens it.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, StoryError};

/// Canonical story file rule: no hidden segments, a non-empty file name and a
/// `.stories.` suffix followed by an optional `ts|tsx|js|jsx` extension.
pub const STORY_FILE_PATTERN: &str =
    r"^\./(?:[^./][^/]*/)*[^./][^/]*?\.stories\.(?:ts|tsx|js|jsx)?$";

static STORY_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(STORY_FILE_PATTERN).expect("Invalid regex"));

/// Compiled matcher for story files relative to one tree root
#[derive(Debug, Clone)]
pub struct StoryMatcher {
    regex: Regex,
    specifier: Option<String>,
}

impl StoryMatcher {
    /// The canonical `*.stories.(ts|tsx|js|jsx)` rule
    pub fn canonical() -> Self {
        StoryMatcher {
            regex: STORY_FILE_RE.clone(),
            specifier: None,
        }
    }

    /// Compile a glob specifier such as `**/*.stories.?(ts|tsx|js|jsx)`.
    ///
    /// Supported syntax: `**/`, `*`, `?`, `[...]`, `{a,b}` and the extglobs
    /// `?(a|b)`, `@(a|b)`, `*(a|b)`, `+(a|b)`. Alternatives may nest.
    /// Paths must satisfy both the glob and [`STORY_FILE_PATTERN`].
    pub fn from_specifier(specifier: &str) -> Result<Self> {
        let body = glob_to_regex(specifier)?;
        let regex = Regex::new(&format!(r"^\./{}$", body))?;
        Ok(StoryMatcher {
            regex,
            specifier: Some(specifier.to_string()),
        })
    }

    /// Whether `relative_path` (as `./a/B.stories.tsx`) names a story file
    pub fn is_match(&self, relative_path: &str) -> bool {
        let normalized = normalize_relative(relative_path);
        if has_hidden_segment(&normalized) {
            return false;
        }
        STORY_FILE_RE.is_match(&normalized) && self.regex.is_match(&normalized)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The glob this matcher was built from, if any
    pub fn specifier(&self) -> Option<&str> {
        self.specifier.as_deref()
    }
}

impl Default for StoryMatcher {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Write a relative path in `./a/b` form with forward slashes
pub fn normalize_relative(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    format!("./{}", trimmed)
}

fn has_hidden_segment(normalized: &str) -> bool {
    normalized
        .trim_start_matches("./")
        .split('/')
        .any(|segment| segment.is_empty() || segment.starts_with('.'))
}

fn invalid(specifier: &str, reason: &str) -> StoryError {
    StoryError::InvalidSpecifier {
        specifier: specifier.to_string(),
        reason: reason.to_string(),
    }
}

/// Translate a glob into a regex body matching paths without the leading `./`
fn glob_to_regex(specifier: &str) -> Result<String> {
    let glob = specifier.trim_start_matches("./");
    if glob.is_empty() {
        return Err(invalid(specifier, "empty specifier"));
    }
    let chars: Vec<char> = glob.chars().collect();
    translate(&chars, specifier)
}

fn translate(chars: &[char], specifier: &str) -> Result<String> {
    let mut out = String::with_capacity(chars.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '?' | '@' | '*' | '+' if next == Some('(') => {
                let close = find_closing(chars, i + 1, '(', ')')
                    .ok_or_else(|| invalid(specifier, "unclosed '('"))?;
                let group = alternatives(&chars[i + 2..close], '|', specifier)?;
                let quantifier = match c {
                    '?' => "?",
                    '*' => "*",
                    '+' => "+",
                    _ => "",
                };
                out.push_str(&format!("(?:{}){}", group, quantifier));
                i = close + 1;
            }
            '*' if next == Some('*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '{' => {
                let close = find_closing(chars, i, '{', '}')
                    .ok_or_else(|| invalid(specifier, "unclosed '{'"))?;
                let group = alternatives(&chars[i + 1..close], ',', specifier)?;
                out.push_str(&format!("(?:{})", group));
                i = close + 1;
            }
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| invalid(specifier, "unclosed '['"))?;
                out.push_str(&char_class(&chars[i + 1..close], specifier)?);
                i = close + 1;
            }
            ')' | '}' => return Err(invalid(specifier, "unbalanced closing bracket")),
            _ => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    Ok(out)
}

/// `[abc]` / `[!abc]` as a regex class confined to one path segment
fn char_class(body: &[char], specifier: &str) -> Result<String> {
    let (negated, members) = match body.first() {
        Some('!') | Some('^') => (true, &body[1..]),
        _ => (false, body),
    };
    let members: String = members
        .iter()
        .filter(|&&ch| ch != '/')
        .map(|&ch| match ch {
            '\\' | '[' | ']' | '&' | '~' => format!("\\{}", ch),
            _ => ch.to_string(),
        })
        .collect();

    if negated {
        Ok(format!("[^/{}]", members))
    } else if members.is_empty() {
        Err(invalid(specifier, "character class matches no file name characters"))
    } else {
        Ok(format!("[{}]", members))
    }
}

/// Split on top-level `separator` and translate each alternative
fn alternatives(body: &[char], separator: char, specifier: &str) -> Result<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, &ch) in body.iter().enumerate() {
        match ch {
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            _ if ch == separator && depth == 0 => {
                parts.push(translate(&body[start..idx], specifier)?);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(translate(&body[start..], specifier)?);
    Ok(parts.join("|"))
}

fn find_closing(chars: &[char], open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &ch) in chars[open_at..].iter().enumerate() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return Some(open_at + offset);
            }
        }
    }
    None
}

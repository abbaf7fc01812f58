//! Delimiter-based splitting of one generated text into named files
//!
//! A section starts at a marker line `=== <name> ===` and runs up to the next
//! marker line or the end of the text. Names compare case-insensitively and
//! only the first marker for a name counts. Each expected name is resolved on
//! its own, so a partial result is still a result.

use buildora_core::{BuildoraError, FileUpdate, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Pseudo-file carrying the suggested project name
pub const PROJECT_NAME: &str = "project_name";

/// The three files a generated project consists of
pub const PROJECT_FILES: [&str; 3] = ["index.html", "style.css", "script.js"];

const DEFAULT_PROJECT_NAME: &str = "AI_Tool";

fn marker_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*===[ \t]*([^=\r\n]+?)[ \t]*===[ \t]*\r?$")
            .expect("valid marker pattern")
    })
}

fn fence_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+-]*[ \t]*\r?$\n?").expect("valid fence pattern"))
}

/// One resolved section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub name: String,
    pub content: String,
}

/// Per-name outcome of [`extract`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFileSet {
    /// Found sections, in the order the names were asked for
    pub files: Vec<ExtractedFile>,
    /// Expected names with no (non-empty) section
    pub missing: Vec<String>,
    /// At least one expected file, other than the project name, was found
    pub format_detected: bool,
}

impl ExtractedFileSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.content.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The sanitised project name, if one was declared
    pub fn project_name(&self) -> Option<String> {
        self.get(PROJECT_NAME).map(sanitize_project_name)
    }

    /// Updates for [`buildora_core::ProjectGraph::apply_updates`]
    ///
    /// The project-name pseudo-file is never turned into a file.
    pub fn updates(&self) -> Vec<FileUpdate> {
        self.files
            .iter()
            .filter(|f| !f.name.eq_ignore_ascii_case(PROJECT_NAME))
            .map(|f| FileUpdate::new(f.name.clone(), f.content.clone()))
            .collect()
    }

    /// `Err(FormatMismatch)` when nothing recognizable was found
    pub fn require_format(self) -> Result<Self> {
        if self.format_detected {
            Ok(self)
        } else {
            Err(BuildoraError::FormatMismatch)
        }
    }
}

/// Split `text` into sections for each of `expected`
pub fn extract(text: &str, expected: &[&str]) -> ExtractedFileSet {
    let markers: Vec<(String, usize, usize)> = marker_line()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().trim().to_string();
            Some((name, whole.start(), whole.end()))
        })
        .collect();

    let mut set = ExtractedFileSet::default();
    for name in expected {
        let found = markers
            .iter()
            .position(|(marker, _, _)| marker.eq_ignore_ascii_case(name))
            .map(|i| {
                let body_start = markers[i].2;
                let body_end = markers.get(i + 1).map_or(text.len(), |next| next.1);
                clean_section(&text[body_start..body_end])
            })
            .filter(|content| !content.is_empty());

        match found {
            Some(content) => {
                if !name.eq_ignore_ascii_case(PROJECT_NAME) {
                    set.format_detected = true;
                }
                set.files.push(ExtractedFile {
                    name: name.to_string(),
                    content,
                });
            }
            None => set.missing.push(name.to_string()),
        }
    }
    set
}

fn clean_section(section: &str) -> String {
    fence_line().replace_all(section.trim(), "").trim().to_string()
}

/// Whole-text fallback when no expected marker was found
///
/// Marker lines and code fences are removed; what remains is the content of
/// the file under edit.
pub fn fallback_text(text: &str) -> String {
    let without_markers = marker_line().replace_all(text, "");
    clean_section(&without_markers)
}

/// Keep `[A-Za-z0-9_-]`, falling back to a fixed default
pub fn sanitize_project_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        DEFAULT_PROJECT_NAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_sections() {
        let set = extract("=== index.html ===\nA\n\n=== style.css ===\nB", &["index.html", "style.css"]);
        assert!(set.format_detected);
        assert_eq!(set.get("index.html"), Some("A"));
        assert_eq!(set.get("style.css"), Some("B"));
        assert!(set.missing.is_empty());
    }

    #[test]
    fn test_no_markers() {
        let set = extract("no markers here", &PROJECT_FILES);
        assert!(!set.format_detected);
        assert!(set.is_empty());
        assert_eq!(set.missing.len(), 3);
        assert!(matches!(set.require_format(), Err(BuildoraError::FormatMismatch)));
    }

    #[test]
    fn test_first_marker_wins() {
        let set = extract("=== index.html ===\nA\n=== index.html ===\nC", &["index.html"]);
        assert_eq!(set.get("index.html"), Some("A"));
    }

    #[test]
    fn test_partial_success_reported_per_file() {
        let set = extract("=== STYLE.CSS ===\nbody{}\n", &PROJECT_FILES);
        assert!(set.format_detected);
        assert_eq!(set.get("style.css"), Some("body{}"));
        assert_eq!(set.missing, vec!["index.html", "script.js"]);
    }

    #[test]
    fn test_marker_must_be_its_own_line() {
        let set = extract("text === index.html === inline\n", &["index.html"]);
        assert!(!set.format_detected);
    }

    #[test]
    fn test_fences_inside_section_removed() {
        let text = "=== script.js ===\n```javascript\nrun();\n```\n=== index.html ===\n<p></p>";
        let set = extract(text, &PROJECT_FILES);
        assert_eq!(set.get("script.js"), Some("run();"));
        assert_eq!(set.get("index.html"), Some("<p></p>"));
    }

    #[test]
    fn test_empty_section_counts_as_missing() {
        let set = extract("=== index.html ===\n\n=== style.css ===\nb", &["index.html", "style.css"]);
        assert_eq!(set.missing, vec!["index.html"]);
    }

    #[test]
    fn test_project_name_not_an_update() {
        let text = "=== project_name ===\nMy Cool Tool!\n=== index.html ===\n<h1/>";
        let mut names = vec![PROJECT_NAME];
        names.extend(PROJECT_FILES);
        let set = extract(text, &names);
        assert_eq!(set.project_name().as_deref(), Some("MyCoolTool"));
        let updates = set.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, "index.html");
    }

    #[test]
    fn test_project_name_alone_is_not_format() {
        let set = extract("=== project_name ===\nX", &[PROJECT_NAME, "index.html"]);
        assert!(!set.format_detected);
        assert!(set.contains(PROJECT_NAME));
    }

    #[test]
    fn test_fallback_text() {
        assert_eq!(fallback_text("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(fallback_text("=== other.txt ===\nbody\n"), "body");
        assert_eq!(fallback_text("  plain  "), "plain");
    }

    #[test]
    fn test_sanitize_project_name() {
        assert_eq!(sanitize_project_name("Todo App_v2-beta"), "TodoApp_v2-beta");
        assert_eq!(sanitize_project_name("!!!"), "AI_Tool");
        assert_eq!(sanitize_project_name(""), "AI_Tool");
    }
}

//! Reference rewriting between the entry document and sibling files
//!
//! A reference may carry a directory prefix (`href="css/style.css"`); only the
//! final path segment has to match the file name. Tag and attribute names match
//! case-insensitively, file names match exactly.

use regex::{Captures, NoExpand, Regex};
use tracing::warn;

const STYLESHEET_REF: &str = r#"(?i:<link\b)[^>]*\b(?i:href)\s*=\s*["'](?:[^"'>]*/)?{NAME}["'][^>]*>"#;
const SCRIPT_REF: &str =
    r#"(?i:<script\b)[^>]*\b(?i:src)\s*=\s*["'](?:[^"'>]*/)?{NAME}["'][^>]*>\s*(?i:</script\s*>)"#;
const ASSET_ATTR_REF: &str = r#"\b((?i:src|href))\s*=\s*["'](?:[^"'>]*/)?{NAME}["']"#;
const ASSET_URL_REF: &str = r#"(?i:url)\(\s*["']?(?:[^"')]*/)?{NAME}["']?\s*\)"#;

fn pattern_for(template: &str, name: &str) -> Option<Regex> {
    let source = template.replace("{NAME}", &regex::escape(name));
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(file = name, "Skipping reference rewrite: {}", e);
            None
        }
    }
}

/// Replace the first `<link href>` naming `name` with an inline `<style>` block
///
/// Returns `None` when the document holds no such reference.
pub fn inline_stylesheet(document: &str, name: &str, content: &str) -> Option<String> {
    let pattern = pattern_for(STYLESHEET_REF, name)?;
    if !pattern.is_match(document) {
        return None;
    }
    let block = format!("<style>{}</style>", content);
    Some(pattern.replacen(document, 1, NoExpand(&block)).into_owned())
}

/// Replace the first `<script src>` naming `name` with an inline `<script>` block
///
/// Returns `None` when the document holds no such reference.
pub fn inline_script(document: &str, name: &str, content: &str) -> Option<String> {
    let pattern = pattern_for(SCRIPT_REF, name)?;
    if !pattern.is_match(document) {
        return None;
    }
    let block = format!("<script>{}</script>", content);
    Some(pattern.replacen(document, 1, NoExpand(&block)).into_owned())
}

/// Remove every `<link href>` tag naming `name`
pub fn strip_stylesheet_references(document: &str, name: &str) -> String {
    match pattern_for(STYLESHEET_REF, name) {
        Some(pattern) => pattern.replace_all(document, "").into_owned(),
        None => document.to_string(),
    }
}

/// Remove every `<script src>` element naming `name`
pub fn strip_script_references(document: &str, name: &str) -> String {
    match pattern_for(SCRIPT_REF, name) {
        Some(pattern) => pattern.replace_all(document, "").into_owned(),
        None => document.to_string(),
    }
}

/// Point every `src`/`href` attribute and CSS `url()` naming `name` at `data_url`
pub fn rewrite_asset_references(document: &str, name: &str, data_url: &str) -> String {
    let mut out = document.to_string();

    if let Some(pattern) = pattern_for(ASSET_ATTR_REF, name) {
        out = pattern
            .replace_all(&out, |caps: &Captures| format!("{}=\"{}\"", &caps[1], data_url))
            .into_owned();
    }

    if let Some(pattern) = pattern_for(ASSET_URL_REF, name) {
        let replacement = format!("url(\"{}\")", data_url);
        out = pattern
            .replace_all(&out, NoExpand(&replacement))
            .into_owned();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_stylesheet_first_reference_only() {
        let doc = r#"<link rel="stylesheet" href="style.css"><link href='style.css' rel="stylesheet">"#;
        let out = inline_stylesheet(doc, "style.css", "body{}").unwrap();
        assert_eq!(out, r#"<style>body{}</style><link href='style.css' rel="stylesheet">"#);
    }

    #[test]
    fn test_inline_stylesheet_with_directory_prefix() {
        let doc = r#"<LINK rel="stylesheet" HREF="./css/style.css" />"#;
        let out = inline_stylesheet(doc, "style.css", "a{}").unwrap();
        assert_eq!(out, "<style>a{}</style>");
    }

    #[test]
    fn test_inline_stylesheet_requires_whole_name() {
        let doc = r#"<link rel="stylesheet" href="mystyle.css">"#;
        assert!(inline_stylesheet(doc, "style.css", "a{}").is_none());
    }

    #[test]
    fn test_inline_script_keeps_dollar_signs_literal() {
        let doc = r#"<body><script src="script.js"></script></body>"#;
        let out = inline_script(doc, "script.js", "const $el = $('#x'); // $1").unwrap();
        assert_eq!(
            out,
            "<body><script>const $el = $('#x'); // $1</script></body>"
        );
    }

    #[test]
    fn test_name_is_escaped() {
        let doc = r#"<script src="mainXjs"></script>"#;
        assert!(inline_script(doc, "main.js", "x").is_none());
    }

    #[test]
    fn test_strip_removes_all_references() {
        let doc = r#"<script src="a.js"></script><p>hi</p><script defer src="lib/a.js" ></script>"#;
        assert_eq!(strip_script_references(doc, "a.js"), "<p>hi</p>");

        let doc = r#"<link href="s.css" rel="stylesheet"><link rel="stylesheet" href="s.css">"#;
        assert_eq!(strip_stylesheet_references(doc, "s.css"), "");
    }

    #[test]
    fn test_rewrite_asset_attributes_and_urls() {
        let doc = r#"<img src="img/logo.png"><img src='logo.png'><style>.a{background:url(logo.png)}</style>"#;
        let out = rewrite_asset_references(doc, "logo.png", "data:image/png;base64,AA==");
        assert_eq!(
            out,
            r#"<img src="data:image/png;base64,AA=="><img src="data:image/png;base64,AA=="><style>.a{background:url("data:image/png;base64,AA==")}</style>"#
        );
    }
}

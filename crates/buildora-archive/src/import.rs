//! Import from a zip archive or a flat JSON project record

use buildora_core::{
    BuildoraError, FileKind, FileNode, Project, ProjectGraph, ProjectKind, Result, ROOT_ID,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

struct Entry {
    segments: Vec<String>,
    is_dir: bool,
    bytes: Vec<u8>,
}

/// Archiver metadata: a top-level `__MACOSX` tree, Finder `.DS_Store` files
/// and AppleDouble `._*` companions
fn is_metadata(segments: &[String]) -> bool {
    if segments.first().is_some_and(|s| s == "__MACOSX") {
        return true;
    }
    segments
        .last()
        .is_some_and(|leaf| leaf == ".DS_Store" || leaf.starts_with("._"))
}

fn read_entries(bytes: &[u8]) -> Result<Vec<Entry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BuildoraError::Import(format!("Not a readable zip archive: {}", e)))?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| BuildoraError::Import(format!("Unreadable archive entry {}: {}", i, e)))?;
        let raw_name = file.name().replace('\\', "/");
        let segments: Vec<String> = raw_name
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() || segments.iter().any(|s| s == "..") {
            warn!(entry = %raw_name, "Skipping unsafe archive path");
            continue;
        }
        if is_metadata(&segments) {
            debug!(entry = %raw_name, "Skipping archiver metadata");
            continue;
        }

        let is_dir = file.is_dir();
        let mut content = Vec::new();
        if !is_dir {
            file.read_to_end(&mut content)?;
        }
        entries.push(Entry {
            segments,
            is_dir,
            bytes: content,
        });
    }
    Ok(entries)
}

/// A single folder shared by every entry is the project root
fn common_root(entries: &[Entry]) -> Option<String> {
    let first = entries.first()?.segments.first()?.clone();
    let shared = entries.iter().all(|e| {
        e.segments[0] == first && (e.is_dir || e.segments.len() > 1)
    });
    shared.then_some(first)
}

/// Build a project from zip bytes
///
/// Folders become containers, image and font entries become data-URL
/// payloads, everything else is read as text. `fallback_name` names the
/// project unless the archive has a single top-level folder.
pub fn import_zip(bytes: &[u8], fallback_name: &str) -> Result<Project> {
    let mut entries = read_entries(bytes)?;

    let name = match common_root(&entries) {
        Some(root) => {
            for entry in &mut entries {
                entry.segments.remove(0);
            }
            entries.retain(|e| !e.segments.is_empty());
            root
        }
        None => fallback_name.to_string(),
    };

    let mut graph = ProjectGraph::new(ProjectKind::Static);
    let mut folders: HashMap<Vec<String>, String> = HashMap::new();

    for entry in entries {
        let (leaf, parents) = match entry.segments.split_last() {
            Some(split) => split,
            None => continue,
        };
        let parent_id = ensure_folders(&mut graph, &mut folders, parents);

        if entry.is_dir {
            ensure_folders(&mut graph, &mut folders, &entry.segments);
            continue;
        }

        let kind = FileKind::from_name(leaf);
        let node = if kind.is_binary() {
            FileNode::binary(leaf.clone(), &entry.bytes)
        } else {
            let text = match String::from_utf8(entry.bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %leaf, "Entry is not valid UTF-8, decoding lossily");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            FileNode::file(leaf.clone(), text)
        };
        if kind == FileKind::LegacyTemplate {
            graph.kind = ProjectKind::LegacyTemplate;
        }
        graph.add(node.with_parent(parent_id));
    }

    info!(project = %name, files = graph.len(), kind = %graph.kind, "Imported archive");
    Ok(Project::new(name, graph))
}

/// Id of the container for `path`, creating any missing level
fn ensure_folders(
    graph: &mut ProjectGraph,
    folders: &mut HashMap<Vec<String>, String>,
    path: &[String],
) -> String {
    let mut parent_id = ROOT_ID.to_string();
    for depth in 1..=path.len() {
        let key = path[..depth].to_vec();
        parent_id = match folders.get(&key) {
            Some(id) => id.clone(),
            None => {
                let node = FileNode::container(path[depth - 1].clone()).with_parent(parent_id);
                let id = graph.add(node);
                folders.insert(key, id.clone());
                id
            }
        };
    }
    parent_id
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFile {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "language")]
    kind: Option<FileKind>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default, alias = "isDirectory")]
    is_container: bool,
}

#[derive(Debug, Deserialize)]
struct ProjectRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", alias = "kind", default)]
    kind: ProjectKind,
    files: Vec<RecordFile>,
}

/// Build a project from a flat JSON record holding a `files` list
///
/// The project gets a fresh id and timestamp; file ids are kept so parent
/// references stay valid, and missing ids or kinds are filled in.
pub fn import_json(text: &str, fallback_name: &str) -> Result<Project> {
    let record: ProjectRecord = serde_json::from_str(text)
        .map_err(|e| BuildoraError::Import(format!("Invalid project JSON: {}", e)))?;

    let files = record
        .files
        .into_iter()
        .map(|f| {
            let kind = f.kind.unwrap_or_else(|| FileKind::from_name(&f.name));
            let mut node = if f.is_container {
                FileNode::container(f.name)
            } else {
                FileNode::file(f.name, f.content).with_kind(kind)
            };
            if let Some(id) = f.id {
                node = node.with_id(id);
            }
            if let Some(parent) = f.parent_id {
                node = node.with_parent(parent);
            }
            node
        })
        .collect();

    let name = record
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| fallback_name.to_string());
    let project = Project::new(name, ProjectGraph::new(record.kind).with_files(files));
    info!(project = %project.name, files = project.graph.len(), "Imported project record");
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(bytes.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_flat_archive_uses_fallback_name() {
        let bytes = zip_of(&[("index.html", "<p>x</p>"), ("style.css", "p{}")]);
        let project = import_zip(&bytes, "upload").unwrap();
        assert_eq!(project.name, "upload");
        assert_eq!(project.graph.len(), 2);
        assert_eq!(project.graph.find_by_name("style.css").unwrap().kind, FileKind::Stylesheet);
    }

    #[test]
    fn test_single_top_folder_is_root() {
        let bytes = zip_of(&[
            ("site/", ""),
            ("site/index.php", "<?php echo 'x'; ?>"),
            ("site/img/logo.png", "\u{1}\u{2}\u{3}"),
            ("__MACOSX/site/._index.php", "junk"),
            ("site/.DS_Store", "junk"),
        ]);
        let project = import_zip(&bytes, "upload").unwrap();
        assert_eq!(project.name, "site");
        assert_eq!(project.graph.kind, ProjectKind::LegacyTemplate);

        let img = project.graph.files.iter().find(|f| f.is_container).unwrap();
        assert_eq!(img.name, "img");
        assert_eq!(img.parent_id, ROOT_ID);
        let logo = project.graph.find_by_name("logo.png").unwrap();
        assert_eq!(logo.parent_id, img.id);
        assert_eq!(logo.content, "data:image/png;base64,AQID");
        assert_eq!(project.graph.len(), 3);
    }

    #[test]
    fn test_keeps_hidden_and_underscored_files() {
        let bytes = zip_of(&[
            ("site/.htaccess", "Options -Indexes"),
            ("site/__tests__/", ""),
            ("site/__tests__/app.test.js", "test()"),
            ("site/._index.html", "junk"),
            ("site/index.html", "<p>x</p>"),
        ]);
        let project = import_zip(&bytes, "upload").unwrap();
        assert_eq!(project.name, "site");
        assert!(project.graph.find_by_name(".htaccess").is_some());
        assert!(project.graph.find_by_name("app.test.js").is_some());
        assert!(project.graph.find_by_name("._index.html").is_none());
        assert_eq!(project.graph.len(), 4);
    }

    #[test]
    fn test_rejects_non_zip() {
        assert!(matches!(import_zip(b"nope", "x"), Err(BuildoraError::Import(_))));
    }

    #[test]
    fn test_json_record_with_legacy_tags() {
        let text = r#"{
            "name": "Old",
            "type": "php",
            "files": [
                {"id": "1", "name": "index.php", "content": "<?php ?>", "language": "php", "parentId": "root"},
                {"id": "2", "name": "assets", "isDirectory": true, "language": "html"},
                {"name": "app.js", "content": "x()", "parentId": "2"}
            ]
        }"#;
        let project = import_json(text, "fallback").unwrap();
        assert_eq!(project.name, "Old");
        assert_eq!(project.graph.kind, ProjectKind::LegacyTemplate);
        assert_eq!(project.graph.get("1").unwrap().kind, FileKind::LegacyTemplate);
        assert!(project.graph.get("2").unwrap().is_container);
        let app = project.graph.find_by_name("app.js").unwrap();
        assert_eq!(app.kind, FileKind::Script);
        assert_eq!(app.parent_id, "2");
    }

    #[test]
    fn test_json_binary_text_becomes_payload() {
        let text = r#"{"files": [
            {"name": "logo.svg", "content": "<svg/>"},
            {"name": "mark", "content": "<svg/>", "kind": "image"},
            {"name": "icon.png", "content": "data:image/png;base64,AQID"}
        ]}"#;
        let project = import_json(text, "fallback").unwrap();
        for name in ["logo.svg", "mark"] {
            let node = project.graph.find_by_name(name).unwrap();
            assert_eq!(node.kind, FileKind::Image);
            assert_eq!(node.content_bytes().unwrap(), b"<svg/>");
        }
        let icon = project.graph.find_by_name("icon.png").unwrap();
        assert_eq!(icon.content, "data:image/png;base64,AQID");
    }

    #[test]
    fn test_json_without_files_is_rejected() {
        assert!(matches!(
            import_json(r#"{"name":"x"}"#, "f"),
            Err(BuildoraError::Import(_))
        ));
        let project = import_json(r#"{"files":[]}"#, "fallback").unwrap();
        assert_eq!(project.name, "fallback");
    }
}

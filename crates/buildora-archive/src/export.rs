//! Archive export: structured folders or one merged document

use buildora_compose::{rewrite_asset_references, strip_script_references, strip_stylesheet_references};
use buildora_core::payload::DataUrl;
use buildora_core::{ArchiveConfig, BuildoraError, FileKind, FileNode, ProjectGraph, Result, ROOT_ID};
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const DEFAULT_ARCHIVE_NAME: &str = "Project";

/// Export flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportMode {
    /// One archive folder per container, files verbatim
    #[default]
    Structured,
    /// A single self-contained document
    Merged,
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

impl std::str::FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "structured" | "zip" => Ok(Self::Structured),
            "merged" | "single" | "single-file" => Ok(Self::Merged),
            _ => Err(format!("Invalid export mode: {}. Use structured or merged.", s)),
        }
    }
}

/// A finished archive, ready to be handed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Keep `[A-Za-z0-9-_ ]`, trimmed, falling back to `Project`
pub fn safe_archive_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_ARCHIVE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn zip_error(e: impl std::fmt::Display) -> BuildoraError {
    BuildoraError::ArchiveEngine(e.to_string())
}

/// Serialises project graphs into zip archives
#[derive(Debug, Clone)]
pub struct ArchiveComposer {
    options: SimpleFileOptions,
}

impl Default for ArchiveComposer {
    fn default() -> Self {
        Self::new(&ArchiveConfig::default())
    }
}

impl ArchiveComposer {
    pub fn new(config: &ArchiveConfig) -> Self {
        // Fixed timestamps keep repeated exports byte-identical
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(config.compression_level))
            .last_modified_time(zip::DateTime::default());
        Self { options }
    }

    pub fn export(&self, mode: ExportMode, project_name: &str, graph: &ProjectGraph) -> Result<Archive> {
        match mode {
            ExportMode::Structured => self.structured(project_name, graph),
            ExportMode::Merged => self.merged(project_name, graph),
        }
    }

    /// Export on the blocking pool so the caller's task is never stalled
    pub async fn export_async(
        &self,
        mode: ExportMode,
        project_name: String,
        graph: ProjectGraph,
    ) -> Result<Archive> {
        let composer = self.clone();
        tokio::task::spawn_blocking(move || composer.export(mode, &project_name, &graph))
            .await
            .map_err(|e| BuildoraError::ArchiveEngine(format!("Export task failed: {}", e)))?
    }

    /// Mirror the container tree under a folder named after the project
    ///
    /// Never fails on graph shape: unreachable nodes are skipped, a repeated
    /// name within one folder keeps its first occurrence.
    pub fn structured(&self, project_name: &str, graph: &ProjectGraph) -> Result<Archive> {
        let safe_name = safe_archive_name(project_name);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory(format!("{}/", safe_name), self.options)
            .map_err(zip_error)?;

        let mut visited = HashSet::new();
        let mut written = 0usize;
        self.write_folder(&mut writer, graph, ROOT_ID, &safe_name, &mut visited, &mut written)?;

        let bytes = writer.finish().map_err(zip_error)?.into_inner();
        info!(project = %safe_name, files = written, size = bytes.len(), "Structured archive ready");
        Ok(Archive {
            file_name: format!("{}.zip", safe_name),
            bytes,
        })
    }

    fn write_folder(
        &self,
        writer: &mut ZipWriter<Cursor<Vec<u8>>>,
        graph: &ProjectGraph,
        parent_id: &str,
        prefix: &str,
        visited: &mut HashSet<String>,
        written: &mut usize,
    ) -> Result<()> {
        let mut names = HashSet::new();

        for node in graph.children(parent_id) {
            if !visited.insert(node.id.clone()) {
                warn!(id = %node.id, "Container cycle, skipping node");
                continue;
            }
            if !names.insert(node.name.as_str()) {
                warn!(file = %node.name, folder = prefix, "Duplicate name in folder, keeping the first");
                continue;
            }

            let path = format!("{}/{}", prefix, node.name);
            if node.is_container {
                writer
                    .add_directory(format!("{}/", path), self.options)
                    .map_err(zip_error)?;
                self.write_folder(writer, graph, &node.id, &path, visited, written)?;
            } else {
                let bytes = file_bytes(node);
                writer.start_file(path.as_str(), self.options).map_err(zip_error)?;
                writer.write_all(&bytes).map_err(zip_error)?;
                *written += 1;
            }
        }
        Ok(())
    }

    /// Inline the designated stylesheet and script into the entry markup
    ///
    /// Fails with `MissingEntry` when the project has no `index*` markup file.
    pub fn merged(&self, project_name: &str, graph: &ProjectGraph) -> Result<Archive> {
        let html = merge_document(graph)?;
        let safe_name = safe_archive_name(project_name);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(format!("{}.html", safe_name), self.options)
            .map_err(zip_error)?;
        writer.write_all(html.as_bytes()).map_err(zip_error)?;
        let bytes = writer.finish().map_err(zip_error)?.into_inner();

        info!(project = %safe_name, size = bytes.len(), "Merged archive ready");
        Ok(Archive {
            file_name: format!("{}.zip", safe_name),
            bytes,
        })
    }
}

fn file_bytes(node: &FileNode) -> Vec<u8> {
    match node.content_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %node.name, "Storing payload as text: {}", e);
            node.content.as_bytes().to_vec()
        }
    }
}

fn head_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</head\s*>").expect("valid head pattern"))
}

fn body_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<body\b").expect("valid body pattern"))
}

fn body_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("valid body pattern"))
}

fn insert_before(document: &str, at: usize, block: &str) -> String {
    let mut out = String::with_capacity(document.len() + block.len());
    out.push_str(&document[..at]);
    out.push_str(block);
    out.push_str(&document[at..]);
    out
}

/// The merged document itself, without the archive around it
pub fn merge_document(graph: &ProjectGraph) -> Result<String> {
    let entry = graph
        .files
        .iter()
        .find(|f| !f.is_container && f.kind == FileKind::Markup && f.name.starts_with("index"))
        .ok_or_else(|| {
            BuildoraError::MissingEntry("merged export needs an index markup file".to_string())
        })?;

    let mut html = entry.content.clone();

    if let Some(css) = designated(graph, FileKind::Stylesheet, &["style.css"]) {
        html = strip_stylesheet_references(&html, &css.name);
        let block = format!("<style>\n{}\n</style>\n", css.content);
        html = match head_close().find(&html).or_else(|| body_open().find(&html)) {
            Some(m) => insert_before(&html, m.start(), &block),
            None => format!("{}{}", block, html),
        };
        debug!(file = %css.name, "Merged stylesheet");
    }

    if let Some(js) = designated(graph, FileKind::Script, &["script.js", "main.js"]) {
        html = strip_script_references(&html, &js.name);
        let block = format!("<script>\n{}\n</script>\n", js.content);
        html = match body_close().find(&html) {
            Some(m) => insert_before(&html, m.start(), &block),
            None => format!("{}{}", html, block),
        };
        debug!(file = %js.name, "Merged script");
    }

    for asset in graph.files.iter().filter(|f| !f.is_container && f.kind.is_binary()) {
        if DataUrl::parse(&asset.content).is_some() {
            html = rewrite_asset_references(&html, &asset.name, &asset.content);
        }
    }

    Ok(html)
}

/// The preferred file of `kind` by name, else the first of that kind
fn designated<'a>(graph: &'a ProjectGraph, kind: FileKind, preferred: &[&str]) -> Option<&'a FileNode> {
    preferred
        .iter()
        .find_map(|name| graph.files_of_kind(kind).find(|f| f.name == *name))
        .or_else(|| graph.files_of_kind(kind).next())
}

//! Core type definitions for the Buildora project model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload;
use crate::{BuildoraError, Result};

/// Parent id used by files that live directly in the project root
pub const ROOT_ID: &str = "root";

/// File kinds understood by the composer and the archiver
///
/// The legacy editor tags (`html`, `css`, `javascript`, `php`, ...) are accepted
/// on input so older project records still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    #[serde(alias = "html")]
    Markup,
    #[serde(alias = "css")]
    Stylesheet,
    #[serde(alias = "javascript", alias = "js")]
    Script,
    #[serde(alias = "php")]
    LegacyTemplate,
    Json,
    Image,
    Font,
}

impl FileKind {
    /// Infer the kind from a file name's extension
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "css" => Self::Stylesheet,
            "js" | "mjs" => Self::Script,
            "php" => Self::LegacyTemplate,
            "json" => Self::Json,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => Self::Image,
            "ttf" | "otf" | "woff" | "woff2" => Self::Font,
            _ => Self::Markup,
        }
    }

    /// Binary kinds carry their content as an encoded data-URL payload
    pub fn is_binary(&self) -> bool {
        match self {
            Self::Image | Self::Font => true,
            Self::Markup | Self::Stylesheet | Self::Script | Self::LegacyTemplate | Self::Json => {
                false
            }
        }
    }

    /// Kinds that can serve as the entry document
    pub fn is_document(&self) -> bool {
        match self {
            Self::Markup | Self::LegacyTemplate => true,
            Self::Stylesheet | Self::Script | Self::Json | Self::Image | Self::Font => false,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markup => write!(f, "markup"),
            Self::Stylesheet => write!(f, "stylesheet"),
            Self::Script => write!(f, "script"),
            Self::LegacyTemplate => write!(f, "legacy_template"),
            Self::Json => write!(f, "json"),
            Self::Image => write!(f, "image"),
            Self::Font => write!(f, "font"),
        }
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markup" | "html" => Ok(Self::Markup),
            "stylesheet" | "css" => Ok(Self::Stylesheet),
            "script" | "javascript" | "js" => Ok(Self::Script),
            "legacy_template" | "php" => Ok(Self::LegacyTemplate),
            "json" => Ok(Self::Json),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            _ => Err(format!("Invalid file kind: {}", s)),
        }
    }
}

/// Project flavour; legacy-template projects get the simulated server pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    #[default]
    #[serde(alias = "html")]
    Static,
    #[serde(alias = "php")]
    LegacyTemplate,
}

impl std::fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::LegacyTemplate => write!(f, "legacy_template"),
        }
    }
}

/// A single file or container in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(alias = "language")]
    pub kind: FileKind,
    #[serde(default = "default_parent")]
    pub parent_id: String,
    #[serde(default, alias = "isDirectory")]
    pub is_container: bool,
}

fn default_parent() -> String {
    ROOT_ID.to_string()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl FileNode {
    /// Create a file in the root scope, kind inferred from the name
    ///
    /// Raw text given for an image or font name is stored as its data-URL payload.
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        let mut node = Self {
            id: new_id(),
            kind: FileKind::from_name(&name),
            name,
            content: String::new(),
            parent_id: default_parent(),
            is_container: false,
        };
        node.set_content(content);
        node
    }

    /// Create a binary file; the bytes are stored as a data-URL payload
    pub fn binary(name: impl Into<String>, bytes: &[u8]) -> Self {
        let name = name.into();
        let content = payload::encode(&payload::mime_for_name(&name), bytes);
        let mut node = Self::file(name, content);
        if !node.kind.is_binary() {
            node.kind = FileKind::Image;
        }
        node
    }

    /// Create an empty container in the root scope
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            content: String::new(),
            kind: FileKind::Markup,
            parent_id: default_parent(),
            is_container: true,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = kind;
        let content = std::mem::take(&mut self.content);
        self.set_content(content);
        self
    }

    /// Replace the content, keeping binary kinds in payload form
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.content = if self.kind.is_binary() && !self.is_container {
            payload::ensure_encoded(&self.name, content)
        } else {
            content
        };
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Decode this file's content into raw bytes
    ///
    /// Binary kinds decode their data-URL payload, text kinds are returned verbatim.
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        if self.kind.is_binary() {
            payload::decode(&self.content)
        } else {
            Ok(self.content.as_bytes().to_vec())
        }
    }
}

/// A file update produced outside the graph, e.g. by generation extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub name: String,
    pub content: String,
}

impl FileUpdate {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Outcome of applying a batch of updates
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

impl ApplySummary {
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Ordered collection of a project's files and their container relationships
///
/// Name uniqueness within a container is not enforced. Lookups by name return
/// the first match in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGraph {
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: ProjectKind,
    #[serde(default)]
    pub files: Vec<FileNode>,
}

impl ProjectGraph {
    pub fn new(kind: ProjectKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<FileNode>) -> Self {
        self.files = files;
        self
    }

    /// Append a node and return its id
    pub fn add(&mut self, node: FileNode) -> String {
        let id = node.id.clone();
        self.files.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FileNode> {
        self.files.iter().find(|f| f.id == id)
    }

    /// First non-container file with exactly this name, anywhere in the graph
    pub fn find_by_name(&self, name: &str) -> Option<&FileNode> {
        self.files
            .iter()
            .find(|f| !f.is_container && f.name == name)
    }

    /// Direct children of a container (or of the root when `parent_id` is [`ROOT_ID`])
    pub fn children<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a FileNode> + 'a {
        self.files.iter().filter(move |f| f.parent_id == parent_id)
    }

    /// Non-container files of one kind, in graph order
    pub fn files_of_kind(&self, kind: FileKind) -> impl Iterator<Item = &FileNode> + '_ {
        self.files
            .iter()
            .filter(move |f| !f.is_container && f.kind == kind)
    }

    /// Entry document: the first document file whose name begins with "index"
    pub fn entry(&self) -> Option<&FileNode> {
        self.files
            .iter()
            .find(|f| !f.is_container && f.kind.is_document() && f.name.starts_with("index"))
    }

    /// Replace the content of one file by id
    pub fn replace_content(&mut self, id: &str, content: impl Into<String>) -> Result<()> {
        let node = self
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| BuildoraError::Other(format!("File not found: {}", id)))?;
        node.set_content(content);
        Ok(())
    }

    /// Merge externally produced files into the graph
    ///
    /// Each update replaces the content of the first root-level file with the same
    /// name, or creates a new root-level file with a fresh id and inferred kind.
    pub fn apply_updates(&mut self, updates: &[FileUpdate]) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for update in updates {
            let existing = self
                .files
                .iter_mut()
                .find(|f| !f.is_container && f.parent_id == ROOT_ID && f.name == update.name);

            match existing {
                Some(node) => {
                    node.set_content(update.content.clone());
                    summary.updated.push(update.name.clone());
                }
                None => {
                    self.files
                        .push(FileNode::file(update.name.clone(), update.content.clone()));
                    summary.created.push(update.name.clone());
                }
            }
        }

        tracing::info!(
            created = summary.created.len(),
            updated = summary.updated.len(),
            "Applied file updates"
        );

        summary
    }
}

/// A persisted project: identity plus its file graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds", default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub graph: ProjectGraph,
}

impl Project {
    pub fn new(name: impl Into<String>, graph: ProjectGraph) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            last_modified: Utc::now(),
            graph,
        }
    }

    /// Mark the project as modified now
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// Deep copy with fresh project and file ids; parent references are remapped
    pub fn duplicate(&self) -> Self {
        let remap: std::collections::HashMap<&str, String> = self
            .graph
            .files
            .iter()
            .map(|f| (f.id.as_str(), new_id()))
            .collect();

        let files = self
            .graph
            .files
            .iter()
            .map(|f| {
                let mut copy = f.clone();
                copy.id = remap[f.id.as_str()].clone();
                if let Some(parent) = remap.get(f.parent_id.as_str()) {
                    copy.parent_id = parent.clone();
                }
                copy
            })
            .collect();

        Self {
            id: new_id(),
            name: format!("{} Copy", self.name),
            last_modified: Utc::now(),
            graph: ProjectGraph {
                kind: self.graph.kind,
                files,
            },
        }
    }
}

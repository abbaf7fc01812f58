//! Entry-document composition

use buildora_core::payload::DataUrl;
use buildora_core::{FileKind, ProjectGraph, ProjectKind};
use tracing::debug;

use crate::legacy;
use crate::references::{inline_script, inline_stylesheet, rewrite_asset_references};
use crate::shim::{self, RelayTransport};

/// Served when the requested entry document does not exist
pub const MISSING_ENTRY_DOCUMENT: &str = r#"<html><body><h1 style="font-family:sans-serif;text-align:center;margin-top:20px;">No index file found</h1></body></html>"#;

/// Served while the preview is stopped
pub const STOPPED_DOCUMENT: &str = r#"<body style="background:#f3f4f6;display:flex;align-items:center;justify-content:center;height:100vh;margin:0;font-family:sans-serif;color:#6b7280;">Server Stopped</body>"#;

/// Resolves a project graph into one executable document
#[derive(Debug, Clone, Default)]
pub struct Composer {
    transport: RelayTransport,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose how the injected shim reaches the event relay
    pub fn with_transport(mut self, transport: RelayTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn transport(&self) -> &RelayTransport {
        &self.transport
    }

    /// Compose the document named `entry_name`
    ///
    /// Never fails: a missing entry yields [`MISSING_ENTRY_DOCUMENT`].
    pub fn compose(&self, graph: &ProjectGraph, entry_name: &str) -> String {
        let Some(entry) = graph.find_by_name(entry_name) else {
            debug!(entry = entry_name, "Entry document missing, serving placeholder");
            return MISSING_ENTRY_DOCUMENT.to_string();
        };

        let mut document = entry.content.clone();
        let mut inlined = 0usize;

        for css in graph.files_of_kind(FileKind::Stylesheet) {
            if let Some(next) = inline_stylesheet(&document, &css.name, &css.content) {
                document = next;
                inlined += 1;
            }
        }

        for js in graph.files_of_kind(FileKind::Script) {
            if let Some(next) = inline_script(&document, &js.name, &js.content) {
                document = next;
                inlined += 1;
            }
        }

        for asset in graph
            .files
            .iter()
            .filter(|f| !f.is_container && f.kind.is_binary())
        {
            if DataUrl::parse(&asset.content).is_some() {
                document = rewrite_asset_references(&document, &asset.name, &asset.content);
            } else {
                debug!(file = %asset.name, "Binary file has no data-URL payload, leaving references");
            }
        }

        match graph.kind {
            ProjectKind::LegacyTemplate => {
                document = format!("{}{}", legacy::SIMULATION_BANNER, legacy::simulate(&document));
            }
            ProjectKind::Static => {}
        }

        debug!(entry = entry_name, inlined, "Composed document");
        shim::inject(&document, &self.transport)
    }
}

/// Compose `entry_name` with the default (post-message) relay transport
pub fn compose(graph: &ProjectGraph, entry_name: &str) -> String {
    Composer::default().compose(graph, entry_name)
}

/// Compose whatever [`ProjectGraph::entry`] designates
pub fn compose_entry(graph: &ProjectGraph) -> String {
    match graph.entry() {
        Some(entry) => compose(graph, &entry.name),
        None => MISSING_ENTRY_DOCUMENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildora_core::FileNode;

    fn static_graph() -> ProjectGraph {
        ProjectGraph::new(ProjectKind::Static).with_files(vec![
            FileNode::file(
                "index.html",
                r#"<html><head><link rel="stylesheet" href="style.css"></head><body><img src="logo.png"><script src="script.js"></script></body></html>"#,
            ),
            FileNode::file("style.css", "body { color: red; }"),
            FileNode::file("script.js", "console.log('hi');"),
            FileNode::binary("logo.png", &[1, 2, 3]),
        ])
    }

    #[test]
    fn test_inlines_stylesheet_and_script() {
        let out = compose(&static_graph(), "index.html");
        assert!(out.contains("<style>body { color: red; }</style>"));
        assert!(out.contains("<script>console.log('hi');</script>"));
        assert!(!out.contains(r#"href="style.css""#));
        assert!(!out.contains(r#"src="script.js""#));
        assert!(out.contains(r#"<img src="data:image/png;base64,AQID">"#));
    }

    #[test]
    fn test_missing_entry_is_placeholder() {
        assert_eq!(compose(&static_graph(), "index.php"), MISSING_ENTRY_DOCUMENT);
        assert_eq!(
            compose(&ProjectGraph::default(), "index.html"),
            MISSING_ENTRY_DOCUMENT
        );
    }

    #[test]
    fn test_compose_is_referentially_transparent() {
        let graph = static_graph();
        assert_eq!(compose(&graph, "index.html"), compose(&graph, "index.html"));
    }

    #[test]
    fn test_duplicate_reference_left_unresolved() {
        let graph = ProjectGraph::new(ProjectKind::Static).with_files(vec![
            FileNode::file(
                "index.html",
                r#"<script src="a.js"></script><script src="a.js"></script>"#,
            ),
            FileNode::file("a.js", "run()"),
        ]);
        let out = compose(&graph, "index.html");
        assert_eq!(out.matches("<script>run()</script>").count(), 1);
        assert_eq!(out.matches(r#"<script src="a.js"></script>"#).count(), 1);
    }

    #[test]
    fn test_shim_injected_after_head() {
        let out = compose(&static_graph(), "index.html");
        let head = out.find("<head>").unwrap();
        let shim = out.find(shim::SHIM_MARKER).unwrap();
        let style = out.find("<style>").unwrap();
        assert!(head < shim && shim < style);
    }

    #[test]
    fn test_legacy_project_gets_banner_and_simulation() {
        let graph = ProjectGraph::new(ProjectKind::LegacyTemplate).with_files(vec![
            FileNode::file(
                "index.php",
                r#"<h1><?php echo "Shop"; ?></h1><p><?php echo $user; ?></p><?php $x = 1; ?>"#,
            ),
        ]);
        let out = compose(&graph, "index.php");
        assert!(out.contains(legacy::SIMULATION_BANNER));
        assert!(out.contains("<h1>Shop</h1>"));
        assert!(out.contains("<p>{{Variable: user}}</p>"));
        assert!(!out.contains("<?php"));
    }

    #[test]
    fn test_compose_entry_uses_index_convention() {
        let out = compose_entry(&static_graph());
        assert!(out.contains("<style>"));
        assert_eq!(compose_entry(&ProjectGraph::default()), MISSING_ENTRY_DOCUMENT);
    }
}

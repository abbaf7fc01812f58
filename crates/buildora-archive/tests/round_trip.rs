//! Export then import must reproduce the project graph

use buildora_archive::{import_zip, ArchiveComposer, ExportMode};
use buildora_core::{FileNode, ProjectGraph, ProjectKind, ROOT_ID};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

/// Path of every node, with content bytes for files and `None` for containers
fn shape(graph: &ProjectGraph) -> BTreeMap<String, Option<Vec<u8>>> {
    fn walk(
        graph: &ProjectGraph,
        parent: &str,
        prefix: &str,
        out: &mut BTreeMap<String, Option<Vec<u8>>>,
    ) {
        for node in graph.children(parent) {
            let path = format!("{}{}", prefix, node.name);
            if node.is_container {
                out.insert(path.clone(), None);
                walk(graph, &node.id, &format!("{}/", path), out);
            } else {
                out.insert(path, Some(node.content_bytes().unwrap()));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(graph, ROOT_ID, "", &mut out);
    out
}

fn sample() -> ProjectGraph {
    let assets = FileNode::container("assets");
    let fonts = FileNode::container("fonts").with_parent(assets.id.clone());
    let empty = FileNode::container("empty");
    ProjectGraph::new(ProjectKind::Static).with_files(vec![
        FileNode::file(
            "index.html",
            r#"<html><head><link rel="stylesheet" href="assets/style.css"></head><body><img src="assets/logo.png"><script src="script.js"></script></body></html>"#,
        ),
        FileNode::file("script.js", "console.log('ready');"),
        FileNode::file("style.css", "body { margin: 0; }").with_parent(assets.id.clone()),
        FileNode::binary("logo.png", &[0x89, b'P', b'N', b'G', 0, 255]).with_parent(assets.id.clone()),
        FileNode::binary("brand.woff2", &[7, 7, 7]).with_parent(fonts.id.clone()),
        assets,
        fonts,
        empty,
    ])
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

#[test]
fn test_structured_round_trip_is_isomorphic() {
    let graph = sample();
    let archive = ArchiveComposer::default()
        .export(ExportMode::Structured, "Round Trip!", &graph)
        .unwrap();
    assert_eq!(archive.file_name, "Round Trip.zip");

    let project = import_zip(&archive.bytes, "fallback").unwrap();
    assert_eq!(project.name, "Round Trip");
    assert_eq!(shape(&project.graph), shape(&graph));
}

#[test]
fn test_hidden_and_underscored_names_survive_round_trip() {
    let tests = FileNode::container("__tests__");
    let graph = ProjectGraph::new(ProjectKind::Static).with_files(vec![
        FileNode::file("index.html", "<p>hi</p>"),
        FileNode::file(".htaccess", "Options -Indexes"),
        FileNode::file("__init__.js", "boot();"),
        FileNode::file("app.test.js", "check();").with_parent(tests.id.clone()),
        FileNode::file(".gitignore", "dist/").with_parent(tests.id.clone()),
        tests,
    ]);
    let archive = ArchiveComposer::default()
        .export(ExportMode::Structured, "Dotted", &graph)
        .unwrap();

    let project = import_zip(&archive.bytes, "fallback").unwrap();
    assert_eq!(project.graph.len(), graph.len());
    assert_eq!(shape(&project.graph), shape(&graph));
}

#[test]
fn test_structured_layout() {
    let archive = ArchiveComposer::default().structured("Site", &sample()).unwrap();
    let mut names = entry_names(&archive.bytes);
    names.sort();
    assert!(names.contains(&"Site/".to_string()));
    assert!(names.contains(&"Site/assets/fonts/brand.woff2".to_string()));
    assert!(names.contains(&"Site/empty/".to_string()));

    let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes.as_slice())).unwrap();
    let mut logo = Vec::new();
    zip.by_name("Site/assets/logo.png")
        .unwrap()
        .read_to_end(&mut logo)
        .unwrap();
    assert_eq!(logo, vec![0x89, b'P', b'N', b'G', 0, 255]);
}

#[test]
fn test_empty_graph_yields_empty_folder() {
    let archive = ArchiveComposer::default()
        .structured("Nothing", &ProjectGraph::default())
        .unwrap();
    assert_eq!(entry_names(&archive.bytes), vec!["Nothing/"]);

    let project = import_zip(&archive.bytes, "x").unwrap();
    assert_eq!(project.name, "Nothing");
    assert!(project.graph.is_empty());
}

#[test]
fn test_merged_single_entry_without_reference_tags() {
    let graph = ProjectGraph::new(ProjectKind::Static).with_files(vec![
        FileNode::file(
            "index.html",
            r#"<html><head><link rel="stylesheet" href="css/style.css"></head><body><img src="logo.png"><script src="script.js"></script></body></html>"#,
        ),
        FileNode::file("style.css", "h1 { color: teal; }"),
        FileNode::file("script.js", "init();"),
        FileNode::binary("logo.png", &[1, 2, 3]),
    ]);
    let archive = ArchiveComposer::default()
        .export(ExportMode::Merged, "One Page", &graph)
        .unwrap();
    assert_eq!(entry_names(&archive.bytes), vec!["One Page.html"]);

    let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes.as_slice())).unwrap();
    let mut html = String::new();
    zip.by_index(0).unwrap().read_to_string(&mut html).unwrap();

    assert!(!html.contains("style.css"));
    assert!(!html.contains(r#"src="script.js""#));
    assert!(html.contains("<style>\nh1 { color: teal; }\n</style>\n</head>"));
    assert!(html.contains("<script>\ninit();\n</script>\n</body>"));
    assert!(html.contains(r#"<img src="data:image/png;base64,AQID">"#));
}

#[test]
fn test_merged_without_entry_fails() {
    let graph = ProjectGraph::new(ProjectKind::Static)
        .with_files(vec![FileNode::file("style.css", "a{}")]);
    let err = ArchiveComposer::default()
        .export(ExportMode::Merged, "X", &graph)
        .unwrap_err();
    assert!(matches!(err, buildora_core::BuildoraError::MissingEntry(_)));
}

#[test]
fn test_repeated_exports_are_identical() {
    let graph = sample();
    let composer = ArchiveComposer::default();
    for mode in [ExportMode::Structured, ExportMode::Merged] {
        let a = composer.export(mode, "Same", &graph).unwrap();
        let b = composer.export(mode, "Same", &graph).unwrap();
        assert_eq!(a, b, "{} export changed between runs", mode);
    }
}

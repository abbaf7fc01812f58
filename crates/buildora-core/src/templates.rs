//! Starter templates for new projects

use crate::{FileNode, Project, ProjectGraph, ProjectKind};

/// Built-in starter templates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Template {
    /// index.html + style.css + script.js
    #[default]
    StaticLanding,
    /// index.php rendered through the simulated legacy server
    LegacyBasic,
}

impl Template {
    pub fn id(&self) -> &'static str {
        match self {
            Self::StaticLanding => "static-landing",
            Self::LegacyBasic => "legacy-basic",
        }
    }

    pub fn project_kind(&self) -> ProjectKind {
        match self {
            Self::StaticLanding => ProjectKind::Static,
            Self::LegacyBasic => ProjectKind::LegacyTemplate,
        }
    }

    /// Build the starter graph for a project name
    pub fn graph(&self, project_name: &str) -> ProjectGraph {
        let files = match self {
            Self::StaticLanding => vec![
                FileNode::file("index.html", landing_html(project_name)),
                FileNode::file("style.css", LANDING_CSS),
                FileNode::file("script.js", LANDING_JS),
            ],
            Self::LegacyBasic => vec![
                FileNode::file("index.php", legacy_php(project_name)),
                FileNode::file("style.css", LANDING_CSS),
            ],
        };

        ProjectGraph::new(self.project_kind()).with_files(files)
    }

    /// Create a named project from this template
    pub fn instantiate(&self, project_name: &str) -> Project {
        Project::new(project_name, self.graph(project_name))
    }
}

impl std::str::FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static-landing" | "static" | "html" => Ok(Self::StaticLanding),
            "legacy-basic" | "legacy" | "php" => Ok(Self::LegacyBasic),
            _ => Err(format!(
                "Invalid template: {}. Use static-landing or legacy-basic.",
                s
            )),
        }
    }
}

fn landing_html(name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{name}</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <main class="card">
        <h1>{name}</h1>
        <p>Edit index.html, style.css and script.js to get started.</p>
        <button id="actionBtn">Say hello</button>
    </main>
    <script src="script.js"></script>
</body>
</html>
"#
    )
}

fn legacy_php(name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title><?php echo "{name}"; ?></title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <main class="card">
        <h1><?php echo "{name}"; ?></h1>
        <p>Hello, <?php echo $visitor; ?>.</p>
        <?php
            $visits = 1;
        ?>
    </main>
</body>
</html>
"#
    )
}

const LANDING_CSS: &str = r#"body {
    font-family: Inter, system-ui, sans-serif;
    min-height: 100vh;
    display: grid;
    place-items: center;
    margin: 0;
    background: linear-gradient(135deg, #6366f1, #ec4899);
}

.card {
    padding: 2rem 3rem;
    border-radius: 1.5rem;
    background: rgba(255, 255, 255, 0.7);
    backdrop-filter: blur(12px);
}
"#;

const LANDING_JS: &str = r#"document.getElementById('actionBtn').addEventListener('click', () => {
    console.log('Hello from your new project');
});
"#;

//! Where a project named on the command line lives

use buildora_core::store::{JsonDirStore, ProjectStore};
use buildora_core::{BuildoraError, Project, Result};
use std::path::{Path, PathBuf};

/// A project is either a standalone JSON file or an id in the project store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Stored(String),
}

impl Location {
    /// Anything that looks like a path is a file; everything else is a store id
    pub fn parse(arg: &str) -> Self {
        let path = Path::new(arg);
        let looks_like_file = path.extension().is_some_and(|e| e == "json")
            || arg.contains(['/', '\\'])
            || path.exists();
        if looks_like_file {
            Self::File(path.to_path_buf())
        } else {
            Self::Stored(arg.to_string())
        }
    }

    pub async fn load(&self, store: &JsonDirStore) -> Result<Project> {
        match self {
            Self::File(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&content)?)
            }
            Self::Stored(id) => store
                .get(id)
                .await?
                .ok_or_else(|| BuildoraError::Store(format!("No project with id {}", id))),
        }
    }

    pub async fn save(&self, store: &JsonDirStore, project: &Project) -> Result<()> {
        match self {
            Self::File(path) => write_project_file(path, project).await,
            Self::Stored(_) => store.put(project).await,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stored(id) => write!(f, "store:{}", id),
        }
    }
}

/// Write a project as pretty JSON, creating parent directories
pub async fn write_project_file(path: &Path, project: &Project) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_string_pretty(project)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildora_core::templates::Template;
    use tempfile::TempDir;

    #[test]
    fn test_parse() {
        assert_eq!(
            Location::parse("site.json"),
            Location::File(PathBuf::from("site.json"))
        );
        assert_eq!(
            Location::parse("out/site"),
            Location::File(PathBuf::from("out/site"))
        );
        assert_eq!(
            Location::parse("3f2a9c1e"),
            Location::Stored("3f2a9c1e".to_string())
        );
    }

    #[tokio::test]
    async fn test_file_and_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path().join("projects"));
        let project = Template::StaticLanding.instantiate("Demo");

        let file = Location::File(dir.path().join("nested/demo.json"));
        file.save(&store, &project).await.unwrap();
        let loaded = file.load(&store).await.unwrap();
        assert_eq!(loaded.id, project.id);
        assert_eq!(loaded.graph, project.graph);

        let stored = Location::Stored(project.id.clone());
        stored.save(&store, &project).await.unwrap();
        assert_eq!(stored.load(&store).await.unwrap().name, "Demo");

        let missing = Location::Stored("nope".to_string());
        assert!(matches!(
            missing.load(&store).await,
            Err(BuildoraError::Store(_))
        ));
    }
}
